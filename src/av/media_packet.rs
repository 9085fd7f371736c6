//! `MediaPacket`: the tagged media unit exchanged across `Streamer`
//! boundaries (see [`crate::streamer`]).

use bytes::Bytes;

use super::{CodecType, Packet};

/// Coarse media kind carried alongside a codec tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// Video elementary stream data.
    Video,
    /// Audio elementary stream data.
    Audio,
    /// Metadata / control units (e.g. FLV onMetaData, RTMP commands).
    Unknown,
}

/// The wire container the payload bytes are currently shaped for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// No container framing; raw elementary-stream bytes.
    Raw,
    /// FLV tag payload framing.
    Flv,
    /// RTMP message payload framing.
    Rtmp,
    /// RTP payload framing.
    Rtp,
    /// Annex-B NALU framing (start codes).
    AnnexB,
    /// AVCC length-prefixed NALU framing.
    Avcc,
}

/// A tagged, owned media unit flowing through a pipeline.
///
/// Produced by a source `Streamer`, passed by shared ownership through
/// downstream sinkers, and released once the last sinker returns.
#[derive(Debug, Clone)]
pub struct MediaPacket {
    /// Coarse stream kind.
    pub media_type: MediaType,
    /// Codec carried by `payload`.
    pub codec: CodecType,
    /// Current framing of `payload`.
    pub container: ContainerFormat,
    /// Decode timestamp in milliseconds, if known.
    pub dts_ms: Option<i64>,
    /// Presentation timestamp in milliseconds, if known.
    pub pts_ms: Option<i64>,
    /// True for a sync-sample / IDR / keyframe.
    pub is_key_frame: bool,
    /// True for a codec sequence header (SPS/PPS, AudioSpecificConfig, ...).
    pub is_seq_hdr: bool,
    /// The media payload.
    pub payload: Bytes,
}

impl MediaPacket {
    /// Builds a new packet with default timing/flags.
    pub fn new(media_type: MediaType, codec: CodecType, payload: impl Into<Bytes>) -> Self {
        Self {
            media_type,
            codec,
            container: ContainerFormat::Raw,
            dts_ms: None,
            pts_ms: None,
            is_key_frame: false,
            is_seq_hdr: false,
            payload: payload.into(),
        }
    }

    /// Sets the container format, builder-style.
    pub fn with_container(mut self, container: ContainerFormat) -> Self {
        self.container = container;
        self
    }

    /// Sets the DTS in milliseconds, builder-style.
    pub fn with_dts_ms(mut self, dts_ms: i64) -> Self {
        self.dts_ms = Some(dts_ms);
        self
    }

    /// Sets the PTS in milliseconds, builder-style.
    pub fn with_pts_ms(mut self, pts_ms: i64) -> Self {
        self.pts_ms = Some(pts_ms);
        self
    }

    /// Marks this packet as a keyframe, builder-style.
    pub fn with_key_frame(mut self, is_key_frame: bool) -> Self {
        self.is_key_frame = is_key_frame;
        self
    }

    /// Marks this packet as a sequence header, builder-style.
    pub fn with_seq_hdr(mut self, is_seq_hdr: bool) -> Self {
        self.is_seq_hdr = is_seq_hdr;
        self
    }

    /// Copies every scalar field from `src` but leaves `payload` untouched.
    pub fn copy_properties(&mut self, src: &MediaPacket) {
        self.media_type = src.media_type;
        self.codec = src.codec;
        self.container = src.container;
        self.dts_ms = src.dts_ms;
        self.pts_ms = src.pts_ms;
        self.is_key_frame = src.is_key_frame;
        self.is_seq_hdr = src.is_seq_hdr;
    }
}

impl From<Packet> for MediaPacket {
    fn from(p: Packet) -> Self {
        // Packet carries no media-type or codec tag of its own; callers that
        // know the stream's codec should set `.codec`/`.media_type` after
        // conversion.
        Self {
            media_type: MediaType::Unknown,
            codec: CodecType::H264,
            container: ContainerFormat::Raw,
            dts_ms: p.dts,
            pts_ms: p.pts,
            is_key_frame: p.is_key,
            is_seq_hdr: false,
            payload: p.data,
        }
    }
}

impl From<MediaPacket> for Packet {
    fn from(m: MediaPacket) -> Self {
        Packet::new(m.payload)
            .with_key_flag(m.is_key_frame)
            .with_pts(m.pts_ms.unwrap_or(0))
            .with_dts(m.dts_ms.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_properties_leaves_payload() {
        let mut dst = MediaPacket::new(MediaType::Audio, CodecType::AAC, Bytes::from_static(b"dst"));
        let src = MediaPacket::new(MediaType::Video, CodecType::H264, Bytes::from_static(b"src"))
            .with_dts_ms(10)
            .with_pts_ms(20)
            .with_key_frame(true);

        dst.copy_properties(&src);

        assert_eq!(dst.media_type, MediaType::Video);
        assert_eq!(dst.codec, CodecType::H264);
        assert_eq!(dst.dts_ms, Some(10));
        assert_eq!(dst.pts_ms, Some(20));
        assert!(dst.is_key_frame);
        assert_eq!(&dst.payload[..], b"dst");
    }
}
