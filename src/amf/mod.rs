//! AMF0 value codec.
//!
//! AMF0 is the value-encoding scheme RTMP uses for command messages
//! (`connect`, `createStream`, `publish`, `play`, `onStatus`, ...) and for
//! the FLV `onMetaData` script tag. See RTMP spec appendix 1 / `amf0.hpp`
//! grounding: objects and ECMA arrays are ordered key→value maps (last
//! write wins on duplicate keys), `reference` is rejected on encode, and
//! the `unsupported` marker is kept distinct rather than folded into
//! `long_string`.

use crate::error::{Result, VdkError};
use crate::utils::byte_stream::{read_f64_be, read_u16_be, read_u32_be};

const MARKER_NUMBER: u8 = 0x00;
const MARKER_BOOLEAN: u8 = 0x01;
const MARKER_STRING: u8 = 0x02;
const MARKER_OBJECT: u8 = 0x03;
const MARKER_NULL: u8 = 0x05;
const MARKER_UNDEFINED: u8 = 0x06;
const MARKER_REFERENCE: u8 = 0x07;
const MARKER_ECMA_ARRAY: u8 = 0x08;
const MARKER_OBJECT_END: u8 = 0x09;
const MARKER_STRICT_ARRAY: u8 = 0x0A;
const MARKER_DATE: u8 = 0x0B;
const MARKER_LONG_STRING: u8 = 0x0C;
const MARKER_UNSUPPORTED: u8 = 0x0D;

/// A decoded or to-be-encoded AMF0 value.
///
/// Open question resolved (see `DESIGN.md`): `EcmaArray` preserves its
/// declared element count rather than discarding it, and `Unsupported` is
/// its own variant rather than being aliased onto `LongString`.
#[derive(Debug, Clone, PartialEq)]
pub enum Amf0Value {
    /// AMF0 `number` (f64).
    Number(f64),
    /// AMF0 `boolean`.
    Boolean(bool),
    /// AMF0 `string` or `long string`, stored uniformly.
    String(String),
    /// AMF0 `object`: an ordered key→value map, duplicate keys collapse to
    /// last-wins during decode.
    Object(Vec<(String, Amf0Value)>),
    /// AMF0 `null`.
    Null,
    /// AMF0 `undefined`.
    Undefined,
    /// AMF0 `ecma-array`: an object with a declared element count.
    EcmaArray(Vec<(String, Amf0Value)>, u32),
    /// AMF0 `strict-array`: a plain sequence of values.
    StrictArray(Vec<Amf0Value>),
    /// AMF0 `date`: milliseconds since epoch plus the reserved timezone
    /// field (always 0 on the wire in practice, but preserved verbatim).
    Date(f64, u16),
    /// AMF0 `unsupported` marker (kept distinct, see module docs).
    Unsupported,
}

impl Amf0Value {
    /// Encodes this value, appending its AMF0 bytes to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Amf0Value::Number(n) => {
                out.push(MARKER_NUMBER);
                out.extend_from_slice(&n.to_bits().to_be_bytes());
            }
            Amf0Value::Boolean(b) => {
                out.push(MARKER_BOOLEAN);
                out.push(if *b { 1 } else { 0 });
            }
            Amf0Value::String(s) => encode_string(out, s),
            Amf0Value::Object(entries) => {
                out.push(MARKER_OBJECT);
                for (k, v) in entries {
                    encode_key(out, k);
                    v.encode(out)?;
                }
                encode_key(out, "");
                out.push(MARKER_OBJECT_END);
            }
            Amf0Value::Null => out.push(MARKER_NULL),
            Amf0Value::Undefined => out.push(MARKER_UNDEFINED),
            Amf0Value::EcmaArray(entries, count) => {
                out.push(MARKER_ECMA_ARRAY);
                out.extend_from_slice(&count.to_be_bytes());
                for (k, v) in entries {
                    encode_key(out, k);
                    v.encode(out)?;
                }
                encode_key(out, "");
                out.push(MARKER_OBJECT_END);
            }
            Amf0Value::StrictArray(items) => {
                out.push(MARKER_STRICT_ARRAY);
                out.extend_from_slice(&(items.len() as u32).to_be_bytes());
                for item in items {
                    item.encode(out)?;
                }
            }
            Amf0Value::Date(ms, reserved) => {
                out.push(MARKER_DATE);
                out.extend_from_slice(&ms.to_bits().to_be_bytes());
                out.extend_from_slice(&reserved.to_be_bytes());
            }
            Amf0Value::Unsupported => out.push(MARKER_UNSUPPORTED),
        }
        Ok(())
    }

    /// Decodes a single AMF0 value from the front of `data`, returning the
    /// value and the number of bytes consumed.
    pub fn decode(data: &[u8]) -> Result<(Amf0Value, usize)> {
        if data.is_empty() {
            return Err(VdkError::MalformedInput("empty AMF0 buffer".into()));
        }
        let marker = data[0];
        let rest = &data[1..];
        match marker {
            MARKER_NUMBER => {
                let n = read_f64_be(rest)?;
                Ok((Amf0Value::Number(n), 9))
            }
            MARKER_BOOLEAN => {
                if rest.is_empty() {
                    return Err(VdkError::MalformedInput("truncated AMF0 boolean".into()));
                }
                Ok((Amf0Value::Boolean(rest[0] != 0), 2))
            }
            MARKER_STRING => {
                let len = read_u16_be(rest)? as usize;
                let s = decode_utf8(&rest[2..], len)?;
                Ok((Amf0Value::String(s), 3 + len))
            }
            MARKER_LONG_STRING => {
                let len = read_u32_be(rest)? as usize;
                let s = decode_utf8(&rest[4..], len)?;
                Ok((Amf0Value::String(s), 5 + len))
            }
            MARKER_OBJECT => {
                let (entries, consumed) = decode_entries(rest)?;
                Ok((Amf0Value::Object(entries), 1 + consumed))
            }
            MARKER_NULL => Ok((Amf0Value::Null, 1)),
            MARKER_UNDEFINED => Ok((Amf0Value::Undefined, 1)),
            MARKER_REFERENCE => Err(VdkError::MalformedInput(
                "AMF0 reference values are not supported".into(),
            )),
            MARKER_ECMA_ARRAY => {
                let count = read_u32_be(rest)?;
                let (entries, consumed) = decode_entries(&rest[4..])?;
                Ok((Amf0Value::EcmaArray(entries, count), 5 + consumed))
            }
            MARKER_STRICT_ARRAY => {
                let count = read_u32_be(rest)? as usize;
                let mut pos = 4;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    let (v, used) = Amf0Value::decode(&rest[pos..])?;
                    items.push(v);
                    pos += used;
                }
                Ok((Amf0Value::StrictArray(items), 1 + pos))
            }
            MARKER_DATE => {
                let ms = read_f64_be(rest)?;
                let reserved = read_u16_be(&rest[8..])?;
                Ok((Amf0Value::Date(ms, reserved), 11))
            }
            MARKER_UNSUPPORTED => Ok((Amf0Value::Unsupported, 1)),
            MARKER_OBJECT_END => Err(VdkError::MalformedInput(
                "unexpected bare AMF0 object-end marker".into(),
            )),
            other => Err(VdkError::MalformedInput(format!(
                "unknown AMF0 marker 0x{:02x}",
                other
            ))),
        }
    }

    /// Decodes as many values as fit in `data`, in order (used for RTMP
    /// command messages, which are a bare sequence of AMF0 values).
    pub fn decode_all(mut data: &[u8]) -> Result<Vec<Amf0Value>> {
        let mut values = Vec::new();
        while !data.is_empty() {
            let (v, used) = Amf0Value::decode(data)?;
            values.push(v);
            data = &data[used..];
        }
        Ok(values)
    }

    /// Convenience accessor for the common case of reading a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Amf0Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convenience accessor for the common case of reading a number value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Amf0Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Looks up a key in an `Object`/`EcmaArray` value.
    pub fn get(&self, key: &str) -> Option<&Amf0Value> {
        let entries = match self {
            Amf0Value::Object(e) => e,
            Amf0Value::EcmaArray(e, _) => e,
            _ => return None,
        };
        entries.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

fn encode_string(out: &mut Vec<u8>, s: &str) {
    if s.len() > u16::MAX as usize {
        out.push(MARKER_LONG_STRING);
        out.extend_from_slice(&(s.len() as u32).to_be_bytes());
    } else {
        out.push(MARKER_STRING);
        out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    }
    out.extend_from_slice(s.as_bytes());
}

fn encode_key(out: &mut Vec<u8>, key: &str) {
    out.extend_from_slice(&(key.len() as u16).to_be_bytes());
    out.extend_from_slice(key.as_bytes());
}

fn decode_utf8(data: &[u8], len: usize) -> Result<String> {
    if data.len() < len {
        return Err(VdkError::MalformedInput("truncated AMF0 string".into()));
    }
    String::from_utf8(data[..len].to_vec())
        .map_err(|e| VdkError::MalformedInput(format!("invalid UTF-8 in AMF0 string: {e}")))
}

/// Decodes the `<u16 key-len><key><value>*` sequence shared by `object` and
/// `ecma-array`, terminated by `<u16 0><object-end marker>`. Duplicate keys
/// collapse to last-wins, matching the distilled spec's object invariant.
fn decode_entries(data: &[u8]) -> Result<(Vec<(String, Amf0Value)>, usize)> {
    let mut pos = 0;
    let mut entries: Vec<(String, Amf0Value)> = Vec::new();
    loop {
        let key_len = read_u16_be(&data[pos..])? as usize;
        pos += 2;
        if key_len == 0 {
            if data.get(pos) != Some(&MARKER_OBJECT_END) {
                return Err(VdkError::MalformedInput(
                    "AMF0 object missing terminating object-end marker".into(),
                ));
            }
            pos += 1;
            break;
        }
        let key = decode_utf8(&data[pos..], key_len)?;
        pos += key_len;
        let (value, used) = Amf0Value::decode(&data[pos..])?;
        pos += used;
        if let Some(existing) = entries.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value;
        } else {
            entries.push((key, value));
        }
    }
    Ok((entries, pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: Amf0Value) {
        let mut buf = Vec::new();
        v.encode(&mut buf).unwrap();
        let (decoded, used) = Amf0Value::decode(&buf).unwrap();
        assert_eq!(used, buf.len());
        assert_eq!(decoded, v);
    }

    #[test]
    fn scalars_roundtrip() {
        roundtrip(Amf0Value::Number(1.0));
        roundtrip(Amf0Value::Boolean(true));
        roundtrip(Amf0Value::Boolean(false));
        roundtrip(Amf0Value::String("connect".into()));
        roundtrip(Amf0Value::Null);
        roundtrip(Amf0Value::Undefined);
        roundtrip(Amf0Value::Unsupported);
    }

    #[test]
    fn object_roundtrips() {
        roundtrip(Amf0Value::Object(vec![
            ("app".into(), Amf0Value::String("live".into())),
            ("flashVer".into(), Amf0Value::String("FMLE/3.0".into())),
        ]));
    }

    #[test]
    fn object_duplicate_keys_last_wins() {
        // <obj> "a" -> 1.0, "a" -> 2.0, end
        let mut buf = vec![MARKER_OBJECT];
        encode_key(&mut buf, "a");
        Amf0Value::Number(1.0).encode(&mut buf).unwrap();
        encode_key(&mut buf, "a");
        Amf0Value::Number(2.0).encode(&mut buf).unwrap();
        encode_key(&mut buf, "");
        buf.push(MARKER_OBJECT_END);

        let (decoded, _) = Amf0Value::decode(&buf).unwrap();
        assert_eq!(
            decoded,
            Amf0Value::Object(vec![("a".into(), Amf0Value::Number(2.0))])
        );
    }

    #[test]
    fn ecma_array_preserves_declared_count() {
        roundtrip(Amf0Value::EcmaArray(
            vec![("width".into(), Amf0Value::Number(1920.0))],
            1,
        ));
    }

    #[test]
    fn strict_array_roundtrips() {
        roundtrip(Amf0Value::StrictArray(vec![
            Amf0Value::Number(1.0),
            Amf0Value::String("x".into()),
        ]));
    }

    #[test]
    fn reference_marker_is_rejected_on_decode() {
        let buf = [MARKER_REFERENCE, 0x00, 0x01];
        assert!(Amf0Value::decode(&buf).is_err());
    }

    #[test]
    fn decode_connect_command_scenario() {
        // "connect" (string), 1.0 (number), {} (empty object)
        let mut buf = Vec::new();
        buf.extend_from_slice(&[
            0x02, 0x00, 0x07, b'c', b'o', b'n', b'n', b'e', b'c', b't',
        ]);
        buf.extend_from_slice(&[0x00, 0x3F, 0xF0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        buf.extend_from_slice(&[0x03, 0x00, 0x00, 0x09]);

        let values = Amf0Value::decode_all(&buf).unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0], Amf0Value::String("connect".into()));
        assert_eq!(values[1], Amf0Value::Number(1.0));
        assert_eq!(values[2], Amf0Value::Object(vec![]));
    }
}
