#![doc(html_root_url = "https://docs.rs/streamkit/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # streamkit
//!
//! A streaming-media protocol toolkit: RTMP chunk stream and session
//! negotiation, MPEG-TS mux/demux (including Opus-over-TS), FLV tag
//! demuxing, AMF0, and a STUN codec, built around a uniform
//! `Streamer`/`MediaPacket` pipeline.
//!
//! ## Module overview
//!
//! - [`av`]: `MediaPacket`, `Packet`, and the codec-data/demuxer/muxer
//!   traits shared across container formats.
//! - [`amf`]: AMF0 value codec used by RTMP commands and FLV metadata.
//! - [`opus`]: Opus access-unit framing, used when Opus rides inside TS.
//! - [`format`]: Container-level demuxing/muxing (`ts`, `flv`) and the
//!   RTMP wire protocol (`rtmp`).
//! - [`stun`]: STUN message codec (XOR-MAPPED-ADDRESS, MESSAGE-INTEGRITY,
//!   FINGERPRINT).
//! - [`streamer`]: The `Streamer`/`MediaSink`/`Reporter` pipeline
//!   abstraction.
//! - [`pacer`]: Real-time DTS-driven pacing for a packet source.
//! - [`session_aliver`]: Idle-session keepalive tracking.
//! - [`buf`]: The headroom-reserving byte buffer shared by the wire
//!   codecs.
//! - [`config`]: Toolkit-wide defaults, overridable via environment or
//!   `streamkit.toml`.
//! - [`error`]: The shared `VdkError`/`Result` types.
//!
//! ## Example: demuxing an MPEG-TS file
//!
//! ```rust,no_run
//! use streamkit::format::Demuxer;
//! use streamkit::format::ts::TSDemuxer;
//! use tokio::fs::File;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let input = File::open("input.ts").await?;
//! let mut demuxer = TSDemuxer::new(input);
//!
//! let streams = demuxer.streams().await?;
//! println!("found {} elementary streams", streams.len());
//!
//! let packet = demuxer.read_packet().await?;
//! println!("read packet with {} bytes", packet.data.len());
//! # Ok(())
//! # }
//! ```

/// Audio/video core types: `Packet`, `MediaPacket`, and the codec-data,
/// demuxer, and muxer traits.
pub mod av;

/// AMF0 value codec shared by RTMP commands and FLV `onMetaData`.
pub mod amf;

/// Headroom-reserving byte buffer used by the wire-level codecs.
pub mod buf;

/// Codec implementations for video and audio formats (H.264, H.265, AAC).
pub mod codec;

/// Configuration module.
pub mod config;

/// Error types and utilities.
pub mod error;

/// Media container formats (FLV, MPEG-TS) and the RTMP wire protocol.
pub mod format;

/// Opus access-unit parsing.
pub mod opus;

/// Real-time pacing of a paced packet source against wall-clock time.
pub mod pacer;

/// Idle-session keepalive tracking.
pub mod session_aliver;

/// The `Streamer`/`MediaSink`/`Reporter` pipeline abstraction.
pub mod streamer;

/// STUN message codec.
pub mod stun;

/// Common utilities and helper functions (bitstream reading, CRC).
pub mod utils;

pub use error::{Result, VdkError};
