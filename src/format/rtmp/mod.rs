//! RTMP: handshake, chunk stream framing, protocol control messages, and
//! the AMF0 command exchange that negotiates publish/play sessions.

/// Chunk stream basic/message headers, extended timestamps, and
/// reassembly (`ChunkReader`/`ChunkWriter`).
pub mod chunk;
/// Server- and client-side `connect`/`createStream`/`publish`/`play`
/// state machines.
pub mod command;
/// Protocol control messages (`SET_CHUNK_SIZE`, `WINDOW_ACK_SIZE`, ...).
pub mod control;
/// The plain C0/C1/C2, S0/S1/S2 handshake.
pub mod handshake;
/// `Streamer` wrapper publishing `MediaPacket`s into a negotiated session.
pub mod session;

pub use chunk::{ChunkMessage, ChunkReader, ChunkWriter};
pub use command::{accept_session, advance_session, stream_key, AcceptedSession, Command, Role};
pub use control::{AckTracker, ControlMessage, LimitType};
pub use handshake::{client_handshake, server_handshake};
pub use session::RtmpPublishStreamer;
