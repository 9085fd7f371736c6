//! # MPEG Transport Stream (TS) Implementation
//!
//! This module provides an implementation of MPEG Transport Stream (TS)
//! format, including support for:
//!
//! - TS packet parsing and generation
//! - Program Specific Information (PSI) tables (PAT/PMT)
//! - Packetized Elementary Stream (PES) handling
//! - H.264/H.265/AAC/Opus elementary streams (Opus identified via a
//!   registration descriptor rather than a dedicated stream type)
//!
//! ## Core Features
//!
//! - **Demuxing**: Extract elementary streams from TS
//! - **Muxing**: Create TS packets from elementary streams, re-emitting
//!   PAT/PMT on an interval and ahead of every video keyframe
//! - **PES Handling**: Process PES packets for video/audio
//! - **PCR Management**: Timing and synchronization
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use streamkit::av::CodecDataExt;
//! use streamkit::format::Muxer;
//! use streamkit::format::ts::TSMuxer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let output: Vec<u8> = Vec::new();
//! let mut muxer = TSMuxer::new(output);
//! let streams: Vec<Box<dyn CodecDataExt>> = Vec::new();
//! muxer.write_header(&streams).await?;
//! muxer.write_trailer().await?;
//! # Ok(())
//! # }
//! ```

/// TS demuxer implementation for extracting elementary streams
pub mod demuxer;

/// TS muxer implementation for creating MPEG-TS packets
pub mod muxer;

/// Low-level TS packet parsing utilities
pub mod parser;

/// PES packet handling and management
pub mod pes;

/// Core TS types and constants
pub mod types;

// Re-export commonly used types and constants
pub use demuxer::TSDemuxer;
pub use muxer::TSMuxer;
pub use pes::{PESHeader, PESPacket};
pub use types::{
    TSHeader,
    PID_PAT,
    PID_PMT,
    STREAM_TYPE_AAC,
    STREAM_TYPE_H264,
    STREAM_TYPE_H265,
    STREAM_TYPE_PRIVATE_DATA,
    DESCRIPTOR_TAG_REGISTRATION,
    OPUS_REGISTRATION_DATA,
    STREAM_ID_OPUS,
    TS_PACKET_SIZE,
};
