//! # Error Types
//!
//! This module provides the error types used throughout the streamkit library.
//! It defines a central error type `VdkError` that encapsulates all possible
//! errors that can occur during video processing operations.
//!
//! ## Example Usage
//!
//! ```rust
//! use streamkit::error::{Result, VdkError};
//!
//! fn process_video_data(data: &[u8]) -> Result<()> {
//!     if data.is_empty() {
//!         return Err(VdkError::InvalidData("Empty video data".to_string()));
//!     }
//!     
//!     // Process video data...
//!     Ok(())
//! }
//! ```

use std::num::ParseIntError;
use thiserror::Error;

/// Primary error type for the streamkit library
#[derive(Error, Debug)]
pub enum VdkError {
    /// I/O errors that occur during file or network operations
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors related to video/audio codec operations
    #[error("codec error: {0}")]
    Codec(String),

    /// Errors related to streaming protocols (RTMP, STUN, etc.)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Errors that occur during parsing of various formats
    #[error("parser error: {0}")]
    Parser(String),

    /// Errors for invalid or malformed input data
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Errors that occur during integer parsing
    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),

    /// A parser rejected the input bytes (AMF, PES, chunk header, STUN
    /// attribute length, ...). Recoverable locally where the format allows
    /// resyncing past the faulty unit.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A state machine transition was not permitted (a command arrived in
    /// the wrong RTMP session phase, FINGERPRINT was not the last STUN
    /// attribute, ...). The owning session must be closed.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// An allocation failed or a bounded queue overflowed. The owning
    /// session must be closed.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The remote peer rejected the request (a negative `onStatus`, an
    /// HTTP 4xx/5xx, a STUN ERROR-CODE attribute).
    #[error("peer rejected: {0}")]
    PeerRejected(String),

    /// A session aliver exceeded its configured maximum idle ticks.
    #[error("timeout: {0}")]
    Timeout(String),
}

/// A specialized Result type for streamkit operations.
///
/// This type is used throughout the streamkit library to handle operations
/// that can produce a `VdkError`.
///
/// ## Example
///
/// ```rust
/// use streamkit::error::{Result, VdkError};
///
/// fn validate_stream_id(id: &str) -> Result<i32> {
///     id.parse::<i32>().map_err(VdkError::from)
/// }
/// ```
pub type Result<T> = std::result::Result<T, VdkError>;
