//! # Media Container Formats
//!
//! Container-level demuxing and muxing, distinct from the wire protocols in
//! [`crate::format::rtmp`] and [`crate::stun`]. Currently covers:
//!
//! - **FLV**: Flash Video tag demuxing
//! - **TS**: MPEG Transport Stream muxing/demuxing, including Opus-over-TS
//! - **AAC**: ADTS framing helpers shared by the TS and FLV codepaths
//!
//! ## Example: muxing to TS
//!
//! ```rust,no_run
//! use streamkit::format::ts::TSMuxer;
//! use streamkit::format::Muxer;
//! use streamkit::av::CodecDataExt;
//! use tokio::fs::File;
//!
//! # async fn example(streams: &[Box<dyn CodecDataExt>]) -> Result<(), Box<dyn std::error::Error>> {
//! let output = File::create("output.ts").await?;
//! let mut muxer = TSMuxer::new(output);
//!
//! muxer.write_header(streams).await?;
//! muxer.write_trailer().await?;
//! # Ok(())
//! # }
//! ```

use crate::av::{CodecDataExt, Packet};
use crate::Result;

/// AAC audio format implementation for handling ADTS framing and streaming
pub mod aac;
/// FLV (Flash Video) tag demuxing
pub mod flv;
/// RTMP chunk stream, handshake, control, and command messages
pub mod rtmp;
/// MPEG Transport Stream (TS) format implementation with muxing/demuxing
pub mod ts;

/// Common trait for format demuxers that extract elementary streams from container formats
#[async_trait::async_trait]
pub trait Demuxer: Send {
    /// Read the next packet from the stream. Returns None when the stream is finished.
    /// 
    /// # Errors
    /// 
    /// Returns an error if:
    /// - The stream has an invalid format
    /// - There is an I/O error
    /// - The stream is corrupted
    async fn read_packet(&mut self) -> Result<Packet>;

    /// Get information about all streams in the container
    /// 
    /// # Returns
    /// 
    /// A vector of codec data descriptors, one for each elementary stream
    /// 
    /// # Errors
    /// 
    /// Returns an error if stream information cannot be retrieved
    async fn streams(&mut self) -> Result<Vec<Box<dyn CodecDataExt>>>;
}

/// Common trait for format muxers that package elementary streams into container formats
#[async_trait::async_trait]
pub trait Muxer: Send {
    /// Write container format header with stream information
    /// 
    /// # Arguments
    /// 
    /// * `streams` - Descriptors for all streams to be included
    /// 
    /// # Errors
    /// 
    /// Returns an error if the header cannot be written
    async fn write_header(&mut self, streams: &[Box<dyn CodecDataExt>]) -> Result<()>;

    /// Write a media packet to the container
    /// 
    /// # Arguments
    /// 
    /// * `packet` - The packet containing audio/video frame data
    /// 
    /// # Errors
    /// 
    /// Returns an error if the packet cannot be written
    async fn write_packet(&mut self, packet: &Packet) -> Result<()>;

    /// Write container format trailer and finalize the output
    /// 
    /// # Errors
    /// 
    /// Returns an error if the trailer cannot be written
    async fn write_trailer(&mut self) -> Result<()>;

    /// Flush any buffered packets to ensure they are written
    /// 
    /// # Errors
    /// 
    /// Returns an error if the flush operation fails
    async fn flush(&mut self) -> Result<()>;
}

/// Test utilities for format implementations
pub mod tests {
    use super::*;

    /// A test muxer implementation that collects packets for verification
    #[derive(Debug)]
    pub struct TestMuxer {
        /// Collected packets for testing
        pub packets: Vec<Packet>,
    }

    impl TestMuxer {
        /// Creates a new test muxer
        pub fn new() -> Self {
            Self {
                packets: Vec::new(),
            }
        }
    }

    #[async_trait::async_trait]
    impl Muxer for TestMuxer {
        async fn write_header(&mut self, _streams: &[Box<dyn CodecDataExt>]) -> Result<()> {
            Ok(())
        }

        async fn write_packet(&mut self, packet: &Packet) -> Result<()> {
            self.packets.push(packet.clone());
            Ok(())
        }

        async fn write_trailer(&mut self) -> Result<()> {
            Ok(())
        }

        async fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }
}

// Re-export commonly used types
pub use self::aac::{AACDemuxer, AACMuxer};
pub use self::flv::{FlvDemuxer, FlvTag, FlvTagType};
pub use self::ts::{TSDemuxer, TSMuxer};
