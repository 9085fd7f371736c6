//! RTMP protocol control messages (type ids 1-6) sent on chunk stream 2,
//! message stream 0.

use crate::error::{Result, VdkError};

/// Control message type ids, RTMP spec section 5.4.
pub mod type_id {
    /// `SET_CHUNK_SIZE`.
    pub const SET_CHUNK_SIZE: u8 = 1;
    /// `ABORT`.
    pub const ABORT: u8 = 2;
    /// `ACKNOWLEDGEMENT`.
    pub const ACK: u8 = 3;
    /// `USER_CONTROL`.
    pub const USER_CONTROL: u8 = 4;
    /// `WINDOW_ACK_SIZE`.
    pub const WINDOW_ACK_SIZE: u8 = 5;
    /// `SET_PEER_BANDWIDTH`.
    pub const SET_PEER_BANDWIDTH: u8 = 6;
}

/// `USER_CONTROL` event types relevant to publish/play handshaking.
pub mod user_control_event {
    /// `StreamBegin`.
    pub const STREAM_BEGIN: u16 = 0;
    /// `StreamIsRecorded`.
    pub const STREAM_IS_RECORDED: u16 = 4;
}

/// `SET_PEER_BANDWIDTH` limit types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitType {
    /// Hard limit.
    Hard,
    /// Soft limit.
    Soft,
    /// Dynamic limit.
    Dynamic,
}

impl LimitType {
    fn to_byte(self) -> u8 {
        match self {
            LimitType::Hard => 0,
            LimitType::Soft => 1,
            LimitType::Dynamic => 2,
        }
    }
}

/// A decoded protocol control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// New chunk size to apply to subsequently received chunks.
    SetChunkSize(u32),
    /// Aborts reassembly of the given chunk stream id.
    Abort(u32),
    /// Bytes received acknowledgement, echoing total bytes read so far.
    Ack(u32),
    /// A user control event (`StreamBegin`, `StreamIsRecorded`, ...) and its
    /// event data.
    UserControl(u16, Vec<u8>),
    /// Window acknowledgement size the peer should honor.
    WindowAckSize(u32),
    /// Peer bandwidth limit and its kind.
    SetPeerBandwidth(u32, LimitType),
}

impl ControlMessage {
    /// Decodes a control message body given its RTMP message type id.
    pub fn decode(type_id: u8, body: &[u8]) -> Result<Self> {
        match type_id {
            type_id::SET_CHUNK_SIZE => Ok(Self::SetChunkSize(read_u32(body)?)),
            type_id::ABORT => Ok(Self::Abort(read_u32(body)?)),
            type_id::ACK => Ok(Self::Ack(read_u32(body)?)),
            type_id::USER_CONTROL => {
                if body.len() < 2 {
                    return Err(VdkError::MalformedInput("truncated user control event".into()));
                }
                let event = u16::from_be_bytes([body[0], body[1]]);
                Ok(Self::UserControl(event, body[2..].to_vec()))
            }
            type_id::WINDOW_ACK_SIZE => Ok(Self::WindowAckSize(read_u32(body)?)),
            type_id::SET_PEER_BANDWIDTH => {
                if body.len() < 5 {
                    return Err(VdkError::MalformedInput(
                        "truncated set peer bandwidth".into(),
                    ));
                }
                let size = read_u32(body)?;
                let limit = match body[4] {
                    0 => LimitType::Hard,
                    1 => LimitType::Soft,
                    2 => LimitType::Dynamic,
                    other => {
                        return Err(VdkError::MalformedInput(format!(
                            "unknown bandwidth limit type {other}"
                        )))
                    }
                };
                Ok(Self::SetPeerBandwidth(size, limit))
            }
            other => Err(VdkError::MalformedInput(format!(
                "not a control message type id: {other}"
            ))),
        }
    }

    /// Encodes this control message's RTMP type id and body.
    pub fn encode(&self) -> (u8, Vec<u8>) {
        match self {
            Self::SetChunkSize(size) => (type_id::SET_CHUNK_SIZE, size.to_be_bytes().to_vec()),
            Self::Abort(csid) => (type_id::ABORT, csid.to_be_bytes().to_vec()),
            Self::Ack(bytes) => (type_id::ACK, bytes.to_be_bytes().to_vec()),
            Self::UserControl(event, data) => {
                let mut body = event.to_be_bytes().to_vec();
                body.extend_from_slice(data);
                (type_id::USER_CONTROL, body)
            }
            Self::WindowAckSize(size) => (type_id::WINDOW_ACK_SIZE, size.to_be_bytes().to_vec()),
            Self::SetPeerBandwidth(size, limit) => {
                let mut body = size.to_be_bytes().to_vec();
                body.push(limit.to_byte());
                (type_id::SET_PEER_BANDWIDTH, body)
            }
        }
    }
}

fn read_u32(body: &[u8]) -> Result<u32> {
    if body.len() < 4 {
        return Err(VdkError::MalformedInput("truncated control message".into()));
    }
    Ok(u32::from_be_bytes([body[0], body[1], body[2], body[3]]))
}

/// Tracks acknowledgement bookkeeping: when cumulative bytes received
/// crosses the negotiated window, an `ACK` must be sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct AckTracker {
    window_ack_size: Option<u32>,
    bytes_received: u32,
    bytes_at_last_ack: u32,
}

impl AckTracker {
    /// Creates a tracker with no window negotiated yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the window acknowledgement size (from a received or locally
    /// issued `WINDOW_ACK_SIZE`).
    pub fn set_window(&mut self, size: u32) {
        self.window_ack_size = Some(size);
    }

    /// Records `n` newly received bytes and returns `Some(total)` if an
    /// `ACK` should now be sent.
    pub fn record_received(&mut self, n: u32) -> Option<u32> {
        self.bytes_received = self.bytes_received.wrapping_add(n);
        let window = self.window_ack_size?;
        if self.bytes_received.wrapping_sub(self.bytes_at_last_ack) >= window {
            self.bytes_at_last_ack = self.bytes_received;
            Some(self.bytes_received)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_chunk_size_roundtrips() {
        let msg = ControlMessage::SetChunkSize(4096);
        let (type_id, body) = msg.encode();
        assert_eq!(ControlMessage::decode(type_id, &body).unwrap(), msg);
    }

    #[test]
    fn set_peer_bandwidth_roundtrips() {
        let msg = ControlMessage::SetPeerBandwidth(2_500_000, LimitType::Dynamic);
        let (type_id, body) = msg.encode();
        assert_eq!(ControlMessage::decode(type_id, &body).unwrap(), msg);
    }

    #[test]
    fn ack_tracker_fires_after_window() {
        let mut tracker = AckTracker::new();
        tracker.set_window(1000);
        assert!(tracker.record_received(500).is_none());
        assert_eq!(tracker.record_received(600), Some(1100));
    }

    #[test]
    fn ack_tracker_silent_without_window() {
        let mut tracker = AckTracker::new();
        assert!(tracker.record_received(10_000).is_none());
    }
}
