//! # H.264/AVC Bitstream Parsing
//!
//! NAL unit extraction and SPS/PPS parsing for H.264/AVC streams, as used
//! by the FLV and MPEG-TS codepaths to detect keyframes and extract
//! `extra_data`.
//!
//! ## Example
//!
//! ```rust
//! use streamkit::codec::h264::H264Parser;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut parser = H264Parser::new();
//! let nalu = parser.parse_nalu(&[0x00, 0x00, 0x00, 0x01, 0x65])?;
//! match nalu.nal_type {
//!     5 => println!("Found IDR frame"),
//!     7 => println!("Found SPS"),
//!     8 => println!("Found PPS"),
//!     other => println!("Found NAL type {}", other),
//! }
//! # Ok(())
//! # }
//! ```

/// Parser for H.264 bitstreams, implementing NAL unit extraction and parsing
pub mod parser;

// Re-export commonly used types from submodules for easier access
#[doc(inline)]
pub use parser::*;
