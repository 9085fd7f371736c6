//! FLV tag parsing and the `FlvDemuxer` state machine.

use bytes::{Bytes, BytesMut};

use crate::amf::Amf0Value;
use crate::av::{CodecType, ContainerFormat, MediaPacket, MediaType};
use crate::buf::DataBuffer;
use crate::error::{Result, VdkError};
use crate::streamer::Reporter;

const FLV_HEADER_SIZE: usize = 9;
const PREV_TAG_SIZE_LEN: usize = 4;
const TAG_HEADER_SIZE: usize = 11;

/// FLV tag type as carried in the 11-byte tag header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlvTagType {
    /// Audio tag (type 8).
    Audio,
    /// Video tag (type 9).
    Video,
    /// Script data tag (type 18), e.g. `onMetaData`.
    Script,
}

impl FlvTagType {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            8 => Some(Self::Audio),
            9 => Some(Self::Video),
            18 => Some(Self::Script),
            _ => None,
        }
    }
}

/// One decoded FLV tag, before its body has been turned into a
/// [`MediaPacket`] (script tags never produce one).
#[derive(Debug, Clone)]
pub struct FlvTag {
    /// The tag's type.
    pub tag_type: FlvTagType,
    /// Timestamp in milliseconds, reconstructed from the 3-byte field plus
    /// its extended high byte.
    pub timestamp_ms: i64,
    /// Raw tag body (everything after the 11-byte tag header).
    pub body: Bytes,
}

#[derive(Debug, PartialEq, Eq)]
enum State {
    AwaitingHeader,
    AwaitingTag,
}

/// Demultiplexes an FLV byte stream into audio/video [`MediaPacket`]s,
/// reporting `onMetaData` script tags through a [`Reporter`].
pub struct FlvDemuxer {
    state: State,
    buf: DataBuffer,
    audio_extra_data: Option<Vec<u8>>,
    video_extra_data: Option<Vec<u8>>,
}

impl FlvDemuxer {
    /// Creates a new, empty demuxer.
    pub fn new() -> Self {
        Self {
            state: State::AwaitingHeader,
            buf: DataBuffer::new(),
            audio_extra_data: None,
            video_extra_data: None,
        }
    }

    /// Appends newly received bytes to the internal buffer.
    pub fn push(&mut self, data: &[u8]) -> Result<()> {
        self.buf.append(data)
    }

    /// Attempts to parse and return the next available `MediaPacket`.
    /// Returns `Ok(None)` when the buffered bytes don't yet contain a
    /// complete unit; call [`FlvDemuxer::push`] and retry.
    pub fn next_packet(&mut self, reporter: &dyn Reporter) -> Result<Option<MediaPacket>> {
        loop {
            match self.state {
                State::AwaitingHeader => {
                    if self.buf.len() < FLV_HEADER_SIZE {
                        return Ok(None);
                    }
                    let header = self.buf.data();
                    if &header[0..3] != b"FLV" {
                        return Err(VdkError::MalformedInput("bad flv signature".into()));
                    }
                    let data_offset = u32::from_be_bytes([
                        header[5], header[6], header[7], header[8],
                    ]) as isize;
                    self.buf.consume(data_offset)?;
                    self.state = State::AwaitingTag;
                }
                State::AwaitingTag => {
                    if self.buf.len() < PREV_TAG_SIZE_LEN + TAG_HEADER_SIZE {
                        return Ok(None);
                    }
                    let data = self.buf.data();
                    let tag_header = &data[PREV_TAG_SIZE_LEN..PREV_TAG_SIZE_LEN + TAG_HEADER_SIZE];

                    let tag_type = match FlvTagType::from_byte(tag_header[0]) {
                        Some(t) => t,
                        None => {
                            reporter.on_report(
                                "flvdemux",
                                "error",
                                &format!("unknown flv tag type {}", tag_header[0]),
                            );
                            return Err(VdkError::MalformedInput(format!(
                                "unknown flv tag type {}",
                                tag_header[0]
                            )));
                        }
                    };

                    let data_size = ((tag_header[1] as usize) << 16)
                        | ((tag_header[2] as usize) << 8)
                        | tag_header[3] as usize;
                    let ts24 =
                        ((tag_header[4] as u32) << 16) | ((tag_header[5] as u32) << 8) | tag_header[6] as u32;
                    let ts_ext = tag_header[7] as u32;
                    let timestamp_ms = (((ts_ext << 24) | ts24) as i64) & 0xFFFF_FFFF;

                    let total_len = PREV_TAG_SIZE_LEN + TAG_HEADER_SIZE + data_size;
                    if self.buf.len() < total_len {
                        return Ok(None);
                    }

                    let body = Bytes::copy_from_slice(
                        &data[PREV_TAG_SIZE_LEN + TAG_HEADER_SIZE..total_len],
                    );
                    self.buf.consume(total_len as isize)?;

                    let tag = FlvTag {
                        tag_type,
                        timestamp_ms,
                        body,
                    };

                    if let Some(packet) = self.decode_tag(tag, reporter)? {
                        return Ok(Some(packet));
                    }
                    // Script tags (metadata) produce no packet; loop for the
                    // next tag.
                }
            }
        }
    }

    fn decode_tag(&mut self, tag: FlvTag, reporter: &dyn Reporter) -> Result<Option<MediaPacket>> {
        match tag.tag_type {
            FlvTagType::Script => {
                self.decode_script_tag(&tag.body, reporter)?;
                Ok(None)
            }
            FlvTagType::Audio => Ok(Some(self.decode_audio_tag(tag)?)),
            FlvTagType::Video => Ok(Some(self.decode_video_tag(tag)?)),
        }
    }

    fn decode_script_tag(&mut self, body: &[u8], reporter: &dyn Reporter) -> Result<()> {
        let items = Amf0Value::decode_all(body)?;
        if let Some(Amf0Value::String(name)) = items.first() {
            if name == "onMetaData" {
                reporter.on_report("flvdemux", "metadata", &format!("{:?}", items.get(1)));
            }
        }
        Ok(())
    }

    fn decode_audio_tag(&mut self, tag: FlvTag) -> Result<MediaPacket> {
        if tag.body.is_empty() {
            return Err(VdkError::MalformedInput("empty flv audio tag".into()));
        }
        let flags = tag.body[0];
        let sound_format = flags >> 4;
        let is_aac = sound_format == 10;

        let (payload, is_seq_hdr) = if is_aac {
            if tag.body.len() < 2 {
                return Err(VdkError::MalformedInput("truncated aac audio tag".into()));
            }
            let packet_type = tag.body[1];
            (tag.body.slice(2..), packet_type == 0)
        } else {
            (tag.body.slice(1..), false)
        };

        if is_seq_hdr {
            self.audio_extra_data = Some(payload.to_vec());
        }

        let codec = if is_aac { CodecType::AAC } else { CodecType::OPUS };
        Ok(MediaPacket::new(MediaType::Audio, codec, payload)
            .with_container(ContainerFormat::Flv)
            .with_dts_ms(tag.timestamp_ms)
            .with_pts_ms(tag.timestamp_ms)
            .with_seq_hdr(is_seq_hdr))
    }

    fn decode_video_tag(&mut self, tag: FlvTag) -> Result<MediaPacket> {
        if tag.body.is_empty() {
            return Err(VdkError::MalformedInput("empty flv video tag".into()));
        }
        let flags = tag.body[0];
        let frame_type = flags >> 4;
        let codec_id = flags & 0x0F;
        let is_key_frame = frame_type == 1;
        let codec = if codec_id == 12 {
            CodecType::H265
        } else {
            CodecType::H264
        };

        if tag.body.len() < 5 {
            return Err(VdkError::MalformedInput("truncated avc video tag".into()));
        }
        let avc_packet_type = tag.body[1];
        let composition_time = ((tag.body[2] as i32) << 16
            | (tag.body[3] as i32) << 8
            | tag.body[4] as i32)
            << 8
            >> 8; // sign-extend the 24-bit composition time offset

        let payload = tag.body.slice(5..);
        let is_seq_hdr = avc_packet_type == 0;

        if is_seq_hdr {
            self.video_extra_data = Some(payload.to_vec());
        }

        let annexb = if is_seq_hdr {
            payload
        } else {
            avcc_to_annexb(&payload)
        };

        let dts = tag.timestamp_ms;
        let pts = dts + composition_time as i64;

        Ok(MediaPacket::new(MediaType::Video, codec, annexb)
            .with_container(ContainerFormat::AnnexB)
            .with_dts_ms(dts)
            .with_pts_ms(pts)
            .with_key_frame(is_key_frame)
            .with_seq_hdr(is_seq_hdr))
    }
}

impl Default for FlvDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

/// Rewrites AVCC length-prefixed NALUs (4-byte big-endian length + NALU) as
/// Annex-B start-code-delimited NALUs.
fn avcc_to_annexb(data: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(data.len() + 16);
    let mut pos = 0;
    while pos + 4 <= data.len() {
        let len = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        pos += 4;
        if pos + len > data.len() {
            break;
        }
        out.extend_from_slice(&[0, 0, 0, 1]);
        out.extend_from_slice(&data[pos..pos + len]);
        pos += len;
    }
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streamer::NullReporter;

    fn flv_header() -> Vec<u8> {
        vec![b'F', b'L', b'V', 0x01, 0x05, 0, 0, 0, 9]
    }

    fn audio_tag(pcm: &[u8], ts: u32) -> Vec<u8> {
        let mut tag = Vec::new();
        tag.extend_from_slice(&0u32.to_be_bytes()); // previous tag size
        tag.push(8); // audio
        let data_size = 1 + pcm.len();
        tag.extend_from_slice(&(data_size as u32).to_be_bytes()[1..]);
        tag.extend_from_slice(&ts.to_be_bytes()[1..]);
        tag.push((ts >> 24) as u8);
        tag.extend_from_slice(&[0, 0, 0]); // stream id
        tag.push(0x0F); // linear PCM hi, 44kHz, 16-bit, stereo (not AAC)
        tag.extend_from_slice(pcm);
        tag
    }

    #[test]
    fn parses_header_then_audio_tag() {
        let mut demuxer = FlvDemuxer::new();
        demuxer.push(&flv_header()).unwrap();
        demuxer.push(&audio_tag(&[1, 2, 3, 4], 42)).unwrap();

        let reporter = NullReporter;
        let packet = demuxer.next_packet(&reporter).unwrap().unwrap();
        assert_eq!(packet.media_type, MediaType::Audio);
        assert_eq!(packet.dts_ms, Some(42));
        assert_eq!(&packet.payload[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn incomplete_tag_returns_none() {
        let mut demuxer = FlvDemuxer::new();
        demuxer.push(&flv_header()).unwrap();
        demuxer.push(&[0, 0, 0, 0, 9]).unwrap(); // partial tag header
        let reporter = NullReporter;
        assert!(demuxer.next_packet(&reporter).unwrap().is_none());
    }

    #[test]
    fn avcc_to_annexb_rewrites_length_prefix() {
        let avcc = [0, 0, 0, 2, 0xAA, 0xBB, 0, 0, 0, 1, 0xCC];
        let annexb = avcc_to_annexb(&avcc);
        assert_eq!(&annexb[..], &[0, 0, 0, 1, 0xAA, 0xBB, 0, 0, 0, 1, 0xCC][..]);
    }
}
