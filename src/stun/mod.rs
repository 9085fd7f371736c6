//! STUN (RFC 5389) message codec: header, attributes, XOR-MAPPED-ADDRESS,
//! MESSAGE-INTEGRITY, and FINGERPRINT.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crc::{Crc, CRC_32_ISO_HDLC};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::{Result, VdkError};

/// Fixed STUN magic cookie (RFC 5389 section 6).
pub const MAGIC_COOKIE: u32 = 0x2112_A442;
const HEADER_SIZE: usize = 20;
const ATTR_HEADER_SIZE: usize = 4;
const FINGERPRINT_XOR: u32 = 0x5354_554E;
const FAMILY_IPV4: u16 = 0x01;
const FAMILY_IPV6: u16 = 0x02;

/// STUN message class (the 2-bit C0/C1 field, RFC 5389 figure 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    /// Request.
    Request,
    /// Indication (no response expected).
    Indication,
    /// Success response.
    SuccessResponse,
    /// Error response.
    ErrorResponse,
}

impl Class {
    fn bits(self) -> u16 {
        match self {
            Class::Request => 0b00,
            Class::Indication => 0b01,
            Class::SuccessResponse => 0b10,
            Class::ErrorResponse => 0b11,
        }
    }

    fn from_bits(bits: u16) -> Self {
        match bits {
            0b00 => Class::Request,
            0b01 => Class::Indication,
            0b10 => Class::SuccessResponse,
            _ => Class::ErrorResponse,
        }
    }
}

/// STUN method (the 12-bit method field). `Binding` (0x0001) is the only
/// method this toolkit needs to originate or parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Method(pub u16);

/// The `Binding` method.
pub const METHOD_BINDING: Method = Method(0x001);

/// Known STUN attribute types relevant to this toolkit.
pub mod attr_type {
    /// `XOR-MAPPED-ADDRESS`.
    pub const XOR_MAPPED_ADDRESS: u16 = 0x0020;
    /// `USERNAME`.
    pub const USERNAME: u16 = 0x0006;
    /// `MESSAGE-INTEGRITY`.
    pub const MESSAGE_INTEGRITY: u16 = 0x0008;
    /// `ERROR-CODE`.
    pub const ERROR_CODE: u16 = 0x0009;
    /// `FINGERPRINT`.
    pub const FINGERPRINT: u16 = 0x8028;
}

/// Splits a STUN message type field into (method, class) per the
/// bit-interleaved RFC 5389 figure 3 layout.
fn type_value(method: Method, class: Class) -> u16 {
    let m = method.0;
    let a = m & 0x000F;
    let b = m & 0x0070;
    let d = m & 0x0F80;
    let method_bits = a + (b << 1) + (d << 2);

    let c = class.bits();
    let c0 = (c & 0b01) << 4;
    let c1 = (c & 0b10) << 7;
    method_bits + c0 + c1
}

fn read_type_value(value: u16) -> (Method, Class) {
    let c0 = (value >> 4) & 0b01;
    let c1 = (value >> 7) & 0b01;
    let class = Class::from_bits(c0 + (c1 << 1));

    let a = value & 0x000F;
    let b = (value >> 1) & 0x0070;
    let d = (value >> 2) & 0x0F80;
    (Method(a + b + d), class)
}

/// One raw, undecoded STUN attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute type.
    pub typ: u16,
    /// Raw, unpadded attribute value.
    pub value: Vec<u8>,
}

/// A STUN message: header fields plus an ordered attribute list.
///
/// Invariant enforced on encode: if both `MESSAGE-INTEGRITY` and
/// `FINGERPRINT` are present, `MESSAGE-INTEGRITY` must precede
/// `FINGERPRINT`, and `FINGERPRINT` must be the last attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message class.
    pub class: Class,
    /// Message method.
    pub method: Method,
    /// 12-byte transaction id.
    pub transaction_id: [u8; 12],
    /// Attributes in wire order.
    pub attributes: Vec<Attribute>,
}

impl Message {
    /// Builds a new, attribute-less message.
    pub fn new(class: Class, method: Method, transaction_id: [u8; 12]) -> Self {
        Self {
            class,
            method,
            transaction_id,
            attributes: Vec::new(),
        }
    }

    /// Appends a raw attribute.
    pub fn add_attribute(&mut self, typ: u16, value: Vec<u8>) {
        self.attributes.push(Attribute { typ, value });
    }

    /// Appends an `XOR-MAPPED-ADDRESS` attribute for `addr`.
    pub fn add_xor_mapped_address(&mut self, addr: SocketAddr) {
        let value = encode_xor_mapped_address(addr, &self.transaction_id);
        self.add_attribute(attr_type::XOR_MAPPED_ADDRESS, value);
    }

    /// Decodes the first `XOR-MAPPED-ADDRESS` attribute, if present.
    pub fn xor_mapped_address(&self) -> Option<SocketAddr> {
        let attr = self
            .attributes
            .iter()
            .find(|a| a.typ == attr_type::XOR_MAPPED_ADDRESS)?;
        decode_xor_mapped_address(&attr.value, &self.transaction_id).ok()
    }

    /// Computes and appends `MESSAGE-INTEGRITY` (HMAC-SHA1 over the message
    /// up to this attribute). Must be called before
    /// [`Message::add_fingerprint`].
    pub fn add_message_integrity(&mut self, key: &[u8]) -> Result<()> {
        if self.attributes.iter().any(|a| a.typ == attr_type::FINGERPRINT) {
            return Err(VdkError::ProtocolViolation(
                "FINGERPRINT must not precede MESSAGE-INTEGRITY".into(),
            ));
        }

        // Encode as if the integrity attribute (20-byte HMAC + header) were
        // already appended, so the length field covers it, then compute the
        // HMAC over everything before it.
        let provisional_len = self.body_len() + ATTR_HEADER_SIZE + 20;
        let header = self.encode_header(provisional_len as u16);
        let body = self.encode_attributes();
        let mut signed = header;
        signed.extend_from_slice(&body);

        let mac = hmac_sha1(key, &signed)?;
        self.add_attribute(attr_type::MESSAGE_INTEGRITY, mac);
        Ok(())
    }

    /// Verifies a previously appended `MESSAGE-INTEGRITY` attribute against
    /// `key`. Fails if the attribute isn't present, or if any attribute
    /// other than `FINGERPRINT` follows it.
    pub fn verify_message_integrity(&self, key: &[u8]) -> Result<()> {
        let idx = self
            .attributes
            .iter()
            .position(|a| a.typ == attr_type::MESSAGE_INTEGRITY)
            .ok_or_else(|| VdkError::MalformedInput("missing MESSAGE-INTEGRITY".into()))?;

        for attr in &self.attributes[idx + 1..] {
            if attr.typ != attr_type::FINGERPRINT {
                return Err(VdkError::ProtocolViolation(
                    "attribute follows MESSAGE-INTEGRITY other than FINGERPRINT".into(),
                ));
            }
        }

        let prefix_len: usize = self.attributes[..idx]
            .iter()
            .map(|a| ATTR_HEADER_SIZE + padded_len(a.value.len()))
            .sum();
        let signed_len = prefix_len + ATTR_HEADER_SIZE + 20;
        let header = self.encode_header(signed_len as u16);
        let mut signed = header;
        signed.extend_from_slice(&self.encode_attributes()[..prefix_len]);

        let expected = hmac_sha1(key, &signed)?;
        if expected != self.attributes[idx].value {
            return Err(VdkError::MalformedInput(
                "MESSAGE-INTEGRITY mismatch".into(),
            ));
        }
        Ok(())
    }

    /// Computes and appends `FINGERPRINT`, enforcing that it becomes the
    /// last attribute in the message.
    pub fn add_fingerprint(&mut self) {
        let provisional_len = self.body_len() + ATTR_HEADER_SIZE + 4;
        let header = self.encode_header(provisional_len as u16);
        let body = self.encode_attributes();
        let mut signed = header;
        signed.extend_from_slice(&body);

        let checksum = Crc::<u32>::new(&CRC_32_ISO_HDLC).checksum(&signed);
        let value = (checksum ^ FINGERPRINT_XOR).to_be_bytes().to_vec();
        self.add_attribute(attr_type::FINGERPRINT, value);
    }

    /// Verifies a trailing `FINGERPRINT` attribute, requiring it to be the
    /// last attribute in the message.
    pub fn verify_fingerprint(&self) -> Result<()> {
        let last = self
            .attributes
            .last()
            .ok_or_else(|| VdkError::MalformedInput("empty attribute list".into()))?;
        if last.typ != attr_type::FINGERPRINT {
            return Err(VdkError::ProtocolViolation(
                "FINGERPRINT must be the last attribute".into(),
            ));
        }
        if last.value.len() != 4 {
            return Err(VdkError::MalformedInput("malformed FINGERPRINT length".into()));
        }

        let prefix_len: usize = self.attributes[..self.attributes.len() - 1]
            .iter()
            .map(|a| ATTR_HEADER_SIZE + padded_len(a.value.len()))
            .sum();
        let header = self.encode_header((prefix_len + ATTR_HEADER_SIZE + 4) as u16);
        let mut signed = header;
        signed.extend_from_slice(&self.encode_attributes()[..prefix_len]);

        let checksum = Crc::<u32>::new(&CRC_32_ISO_HDLC).checksum(&signed);
        let expected = (checksum ^ FINGERPRINT_XOR).to_be_bytes();
        if expected != last.value[..] {
            return Err(VdkError::MalformedInput("FINGERPRINT mismatch".into()));
        }
        Ok(())
    }

    fn body_len(&self) -> usize {
        self.attributes
            .iter()
            .map(|a| ATTR_HEADER_SIZE + padded_len(a.value.len()))
            .sum()
    }

    fn encode_header(&self, length: u16) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE);
        out.extend_from_slice(&type_value(self.method, self.class).to_be_bytes());
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
        out.extend_from_slice(&self.transaction_id);
        out
    }

    fn encode_attributes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body_len());
        for attr in &self.attributes {
            out.extend_from_slice(&attr.typ.to_be_bytes());
            out.extend_from_slice(&(attr.value.len() as u16).to_be_bytes());
            out.extend_from_slice(&attr.value);
            let pad = padded_len(attr.value.len()) - attr.value.len();
            out.extend(std::iter::repeat(0u8).take(pad));
        }
        out
    }

    /// Encodes the full message to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.encode_header(self.body_len() as u16);
        out.extend_from_slice(&self.encode_attributes());
        out
    }

    /// Decodes a message from wire bytes, validating the magic cookie and
    /// FINGERPRINT/MESSAGE-INTEGRITY ordering invariant if those attributes
    /// are present.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(VdkError::MalformedInput("stun header too short".into()));
        }
        let type_field = u16::from_be_bytes([data[0], data[1]]);
        let length = u16::from_be_bytes([data[2], data[3]]) as usize;
        let cookie = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if cookie != MAGIC_COOKIE {
            return Err(VdkError::MalformedInput(format!(
                "bad stun magic cookie 0x{cookie:08x}"
            )));
        }
        if data.len() < HEADER_SIZE + length {
            return Err(VdkError::MalformedInput("truncated stun message".into()));
        }

        let mut transaction_id = [0u8; 12];
        transaction_id.copy_from_slice(&data[8..20]);
        let (method, class) = read_type_value(type_field);

        let mut attributes = Vec::new();
        let mut pos = HEADER_SIZE;
        let end = HEADER_SIZE + length;
        let mut seen_fingerprint = false;
        let mut seen_integrity = false;
        while pos + ATTR_HEADER_SIZE <= end {
            let typ = u16::from_be_bytes([data[pos], data[pos + 1]]);
            let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
            pos += ATTR_HEADER_SIZE;
            if pos + len > end {
                return Err(VdkError::MalformedInput("attribute overruns message".into()));
            }
            let value = data[pos..pos + len].to_vec();
            pos += padded_len(len);

            if seen_fingerprint {
                return Err(VdkError::ProtocolViolation(
                    "attribute follows FINGERPRINT".into(),
                ));
            }
            if typ == attr_type::FINGERPRINT {
                seen_fingerprint = true;
            }
            if typ == attr_type::MESSAGE_INTEGRITY {
                if seen_integrity {
                    return Err(VdkError::ProtocolViolation(
                        "duplicate MESSAGE-INTEGRITY".into(),
                    ));
                }
                seen_integrity = true;
            }

            attributes.push(Attribute { typ, value });
        }

        Ok(Self {
            class,
            method,
            transaction_id,
            attributes,
        })
    }
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(4) * 4
}

fn hmac_sha1(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key)
        .map_err(|e| VdkError::Codec(format!("invalid hmac key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn encode_xor_mapped_address(addr: SocketAddr, transaction_id: &[u8; 12]) -> Vec<u8> {
    let port = addr.port() ^ (MAGIC_COOKIE >> 16) as u16;
    let mut out = Vec::new();
    out.push(0);
    match addr.ip() {
        IpAddr::V4(ip) => {
            out.extend_from_slice(&FAMILY_IPV4.to_be_bytes()[1..]);
            out.extend_from_slice(&port.to_be_bytes());
            let octets = ip.octets();
            let cookie_bytes = MAGIC_COOKIE.to_be_bytes();
            for i in 0..4 {
                out.push(octets[i] ^ cookie_bytes[i]);
            }
        }
        IpAddr::V6(ip) => {
            out.extend_from_slice(&FAMILY_IPV6.to_be_bytes()[1..]);
            out.extend_from_slice(&port.to_be_bytes());
            let mut xor_key = [0u8; 16];
            xor_key[0..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
            xor_key[4..16].copy_from_slice(transaction_id);
            let octets = ip.octets();
            for i in 0..16 {
                out.push(octets[i] ^ xor_key[i]);
            }
        }
    }
    out
}

fn decode_xor_mapped_address(value: &[u8], transaction_id: &[u8; 12]) -> Result<SocketAddr> {
    if value.len() < 4 {
        return Err(VdkError::MalformedInput("truncated xor-mapped-address".into()));
    }
    let family = value[1];
    let port = u16::from_be_bytes([value[2], value[3]]) ^ (MAGIC_COOKIE >> 16) as u16;
    match family as u16 {
        FAMILY_IPV4 => {
            if value.len() < 8 {
                return Err(VdkError::MalformedInput("truncated ipv4 xor-address".into()));
            }
            let cookie_bytes = MAGIC_COOKIE.to_be_bytes();
            let mut octets = [0u8; 4];
            for i in 0..4 {
                octets[i] = value[4 + i] ^ cookie_bytes[i];
            }
            Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), port))
        }
        FAMILY_IPV6 => {
            if value.len() < 20 {
                return Err(VdkError::MalformedInput("truncated ipv6 xor-address".into()));
            }
            let mut xor_key = [0u8; 16];
            xor_key[0..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
            xor_key[4..16].copy_from_slice(transaction_id);
            let mut octets = [0u8; 16];
            for i in 0..16 {
                octets[i] = value[4 + i] ^ xor_key[i];
            }
            Ok(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
        }
        other => Err(VdkError::MalformedInput(format!(
            "unknown xor-address family {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn txn_id() -> [u8; 12] {
        let mut id = [0u8; 12];
        for (i, b) in id.iter_mut().enumerate() {
            *b = i as u8;
        }
        id
    }

    #[test]
    fn binding_request_roundtrips() {
        let msg = Message::new(Class::Request, METHOD_BINDING, txn_id());
        let bytes = msg.encode();
        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(decoded.class, Class::Request);
        assert_eq!(decoded.method, METHOD_BINDING);
        assert_eq!(decoded.transaction_id, txn_id());
    }

    #[test]
    fn xor_mapped_address_roundtrips_ipv4() {
        let mut msg = Message::new(Class::SuccessResponse, METHOD_BINDING, txn_id());
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 54321);
        msg.add_xor_mapped_address(addr);

        let bytes = msg.encode();
        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(decoded.xor_mapped_address(), Some(addr));
    }

    #[test]
    fn message_integrity_verifies_with_correct_key() {
        let mut msg = Message::new(Class::Request, METHOD_BINDING, txn_id());
        msg.add_attribute(attr_type::USERNAME, b"alice".to_vec());
        msg.add_message_integrity(b"secret").unwrap();

        let bytes = msg.encode();
        let decoded = Message::decode(&bytes).unwrap();
        decoded.verify_message_integrity(b"secret").unwrap();
        assert!(decoded.verify_message_integrity(b"wrong").is_err());
    }

    #[test]
    fn fingerprint_must_be_last_and_verifies() {
        let mut msg = Message::new(Class::Request, METHOD_BINDING, txn_id());
        msg.add_attribute(attr_type::USERNAME, b"alice".to_vec());
        msg.add_fingerprint();

        let bytes = msg.encode();
        let decoded = Message::decode(&bytes).unwrap();
        decoded.verify_fingerprint().unwrap();
    }

    #[test]
    fn integrity_then_fingerprint_ordering_enforced() {
        let mut msg = Message::new(Class::Request, METHOD_BINDING, txn_id());
        msg.add_message_integrity(b"secret").unwrap();
        msg.add_fingerprint();

        let bytes = msg.encode();
        let decoded = Message::decode(&bytes).unwrap();
        decoded.verify_message_integrity(b"secret").unwrap();
        decoded.verify_fingerprint().unwrap();
    }

    #[test]
    fn fingerprint_before_integrity_is_rejected() {
        let mut msg = Message::new(Class::Request, METHOD_BINDING, txn_id());
        msg.add_fingerprint();
        assert!(msg.add_message_integrity(b"secret").is_err());
    }

    #[test]
    fn bad_magic_cookie_is_rejected() {
        let mut msg = Message::new(Class::Request, METHOD_BINDING, txn_id());
        let mut bytes = msg_with_header(&mut msg);
        bytes[4] = 0;
        assert!(Message::decode(&bytes).is_err());
    }

    fn msg_with_header(msg: &mut Message) -> Vec<u8> {
        msg.encode()
    }
}
