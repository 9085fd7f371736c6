//! FLV (Flash Video) container demuxing.
//!
//! Parses the 9-byte file header, the 4-byte previous-tag-size field that
//! precedes every tag, and the 11-byte tag header, then decodes audio,
//! video, and script (`onMetaData`) tag bodies.

/// FLV tag/header parsing and the `FlvDemuxer` state machine
pub mod demuxer;

pub use demuxer::{FlvDemuxer, FlvTag, FlvTagType};
