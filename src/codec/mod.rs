//! # Video and Audio Codec Bitstream Parsing
//!
//! Parsing helpers for the elementary-stream codecs carried by the
//! container formats in [`crate::format`]: NAL unit extraction for
//! H.264/H.265 and ADTS framing for AAC.
//!
//! ## Supported Codecs
//!
//! ### H.264/AVC
//! - NAL unit parsing and extraction
//! - Parameter sets (SPS/PPS) handling
//! - Frame type detection
//!
//! ```rust,no_run
//! use streamkit::codec::h264::H264Parser;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut parser = H264Parser::new();
//! let nalu = parser.parse_nalu(&[0x00, 0x00, 0x00, 0x01, 0x67])?;
//! println!("nal_type = {}", nalu.nal_type);
//! # Ok(())
//! # }
//! ```
//!
//! ### H.265/HEVC
//! Basic implementation supporting:
//! - NAL unit parsing
//! - Parameter sets handling
//! - Frame extraction
//!
//! ### AAC Audio
//! Implementation supporting:
//! - ADTS frame parsing
//! - Audio frame extraction
//! - Basic stream configuration

#[doc = "AAC (Advanced Audio Coding) codec implementation

Provides ADTS frame parsing and audio extraction capabilities"]
pub mod aac;

#[doc = "H.264/AVC (Advanced Video Coding) bitstream parsing

NAL unit extraction, parameter sets, and frame type detection"]
pub mod h264;

#[doc = "H.265/HEVC (High Efficiency Video Coding) codec implementation

Basic implementation supporting NAL parsing, parameter sets handling,
and frame extraction"]
pub mod h265;

// Re-export common types and functions
#[doc(inline)]
pub use h264::parser::NALUnit;
