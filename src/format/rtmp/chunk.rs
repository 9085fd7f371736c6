//! RTMP chunk stream: basic header, message header, extended timestamp,
//! and the per-chunk-stream-id reassembly context.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, VdkError};

const EXTENDED_TIMESTAMP_MARKER: u32 = 0xFF_FFFF;
const DEFAULT_CHUNK_SIZE: usize = 128;

/// One reassembled RTMP message: a type id, a target message stream id, an
/// absolute timestamp, and a complete payload.
#[derive(Debug, Clone)]
pub struct ChunkMessage {
    /// RTMP message type id (control: 1-6, command: 20, video: 9, audio: 8, ...).
    pub type_id: u8,
    /// Message stream id this message targets (0 for the control stream).
    pub msg_stream_id: u32,
    /// Absolute timestamp in milliseconds (wraps per the 32-bit field).
    pub timestamp: u32,
    /// Reassembled message payload.
    pub payload: Bytes,
}

struct ChunkContext {
    fmt: u8,
    timestamp: u32,
    timestamp_delta: u32,
    msg_len: usize,
    type_id: u8,
    msg_stream_id: u32,
    ext_ts: bool,
    buf: BytesMut,
    remaining: usize,
}

impl ChunkContext {
    fn new() -> Self {
        Self {
            fmt: 0,
            timestamp: 0,
            timestamp_delta: 0,
            msg_len: 0,
            type_id: 0,
            msg_stream_id: 0,
            ext_ts: false,
            buf: BytesMut::new(),
            remaining: 0,
        }
    }
}

/// Reads RTMP chunks off an async stream, reassembling chunk-stream payload
/// into complete [`ChunkMessage`]s.
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    contexts: HashMap<u32, ChunkContext>,
}

impl<R: AsyncRead + Unpin + Send> ChunkReader<R> {
    /// Creates a reader with the default (pre-negotiation) chunk size.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            chunk_size: DEFAULT_CHUNK_SIZE,
            contexts: HashMap::new(),
        }
    }

    /// Applies a `SET_CHUNK_SIZE` control message's effect to this reader.
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size = size;
    }

    /// Reads and reassembles the next complete message, draining as many
    /// chunks as required across possibly-interleaved chunk stream ids.
    pub async fn read_message(&mut self) -> Result<ChunkMessage> {
        loop {
            let (fmt, csid) = self.read_basic_header().await?;
            self.read_message_header(fmt, csid).await?;

            let ctx = self
                .contexts
                .get_mut(&csid)
                .expect("context inserted by read_message_header");

            let take = ctx.remaining.min(self.chunk_size);
            let mut chunk = vec![0u8; take];
            self.reader.read_exact(&mut chunk).await?;
            ctx.buf.extend_from_slice(&chunk);
            ctx.remaining -= take;

            if ctx.remaining == 0 {
                let payload = ctx.buf.split().freeze();
                let message = ChunkMessage {
                    type_id: ctx.type_id,
                    msg_stream_id: ctx.msg_stream_id,
                    timestamp: ctx.timestamp,
                    payload,
                };
                return Ok(message);
            }
        }
    }

    async fn read_basic_header(&mut self) -> Result<(u8, u32)> {
        let mut first = [0u8; 1];
        self.reader.read_exact(&mut first).await?;
        let fmt = first[0] >> 6;
        let csid_low = first[0] & 0x3F;

        let csid = match csid_low {
            0 => {
                let mut b = [0u8; 1];
                self.reader.read_exact(&mut b).await?;
                64 + b[0] as u32
            }
            1 => {
                let mut b = [0u8; 2];
                self.reader.read_exact(&mut b).await?;
                64 + b[0] as u32 + (b[1] as u32) * 256
            }
            n => n as u32,
        };
        Ok((fmt, csid))
    }

    async fn read_message_header(&mut self, fmt: u8, csid: u32) -> Result<()> {
        if !self.contexts.contains_key(&csid) {
            self.contexts.insert(csid, ChunkContext::new());
        }

        match fmt {
            0 => {
                let mut hdr = [0u8; 11];
                self.reader.read_exact(&mut hdr).await?;
                let ts24 = u24_be(&hdr[0..3]);
                let msg_len = u24_be(&hdr[3..6]) as usize;
                let type_id = hdr[6];
                let msg_stream_id = u32::from_le_bytes([hdr[7], hdr[8], hdr[9], hdr[10]]);

                let ext_ts = ts24 == EXTENDED_TIMESTAMP_MARKER;
                let timestamp = if ext_ts {
                    self.read_extended_timestamp().await?
                } else {
                    ts24
                };

                let ctx = self.contexts.get_mut(&csid).unwrap();
                ctx.fmt = fmt;
                ctx.timestamp = timestamp;
                ctx.timestamp_delta = 0;
                ctx.msg_len = msg_len;
                ctx.type_id = type_id;
                ctx.msg_stream_id = msg_stream_id;
                ctx.ext_ts = ext_ts;
                ctx.remaining = msg_len;
                ctx.buf = BytesMut::with_capacity(msg_len);
            }
            1 => {
                let mut hdr = [0u8; 7];
                self.reader.read_exact(&mut hdr).await?;
                let ts24 = u24_be(&hdr[0..3]);
                let msg_len = u24_be(&hdr[3..6]) as usize;
                let type_id = hdr[6];

                let ext_ts = ts24 == EXTENDED_TIMESTAMP_MARKER;
                let delta = if ext_ts {
                    self.read_extended_timestamp().await?
                } else {
                    ts24
                };

                let ctx = self.contexts.get_mut(&csid).unwrap();
                ctx.fmt = fmt;
                ctx.timestamp_delta = delta;
                ctx.timestamp = ctx.timestamp.wrapping_add(delta);
                ctx.msg_len = msg_len;
                ctx.type_id = type_id;
                ctx.ext_ts = ext_ts;
                ctx.remaining = msg_len;
                ctx.buf = BytesMut::with_capacity(msg_len);
            }
            2 => {
                let mut hdr = [0u8; 3];
                self.reader.read_exact(&mut hdr).await?;
                let ts24 = u24_be(&hdr[0..3]);

                let ext_ts = ts24 == EXTENDED_TIMESTAMP_MARKER;
                let delta = if ext_ts {
                    self.read_extended_timestamp().await?
                } else {
                    ts24
                };

                let ctx = self.contexts.get_mut(&csid).unwrap();
                ctx.fmt = fmt;
                ctx.timestamp_delta = delta;
                ctx.timestamp = ctx.timestamp.wrapping_add(delta);
                ctx.ext_ts = ext_ts;
                ctx.remaining = ctx.msg_len;
                ctx.buf = BytesMut::with_capacity(ctx.msg_len);
            }
            3 => {
                let ext_ts = self.contexts.get(&csid).unwrap().ext_ts;
                if ext_ts {
                    // A repeated fmt-3 extended timestamp carries the same
                    // value as the header it continues; nothing new to fold in.
                    self.read_extended_timestamp().await?;
                }
                let ctx = self.contexts.get_mut(&csid).unwrap();
                if ctx.remaining == 0 {
                    ctx.remaining = ctx.msg_len;
                    ctx.buf = BytesMut::with_capacity(ctx.msg_len);
                    if ctx.fmt != 0 {
                        ctx.timestamp = ctx.timestamp.wrapping_add(ctx.timestamp_delta);
                    }
                }
            }
            _ => unreachable!("fmt is masked to 2 bits"),
        }
        Ok(())
    }

    async fn read_extended_timestamp(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.reader.read_exact(&mut b).await?;
        Ok(u32::from_be_bytes(b))
    }
}

fn u24_be(b: &[u8]) -> u32 {
    ((b[0] as u32) << 16) | ((b[1] as u32) << 8) | b[2] as u32
}

/// Writes RTMP messages as fmt-0 chunks followed by fmt-3 continuations.
pub struct ChunkWriter<W> {
    writer: W,
    chunk_size: usize,
}

impl<W: AsyncWrite + Unpin + Send> ChunkWriter<W> {
    /// Creates a writer with the default (pre-negotiation) chunk size.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Applies a locally issued `SET_CHUNK_SIZE`'s effect to this writer.
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size = size;
    }

    /// Writes `payload` as one message on `csid`, splitting across fmt-0 and
    /// fmt-3 chunks per the negotiated chunk size.
    pub async fn write(
        &mut self,
        csid: u32,
        timestamp: u32,
        type_id: u8,
        msg_stream_id: u32,
        payload: &[u8],
    ) -> Result<()> {
        if csid < 2 {
            return Err(VdkError::ProtocolViolation(format!(
                "chunk stream id {csid} is reserved"
            )));
        }

        let mut header = Vec::with_capacity(12);
        self.write_basic_header(&mut header, 0, csid);
        let ext_ts = timestamp >= EXTENDED_TIMESTAMP_MARKER;
        header.extend_from_slice(&(if ext_ts { EXTENDED_TIMESTAMP_MARKER } else { timestamp }).to_be_bytes()[1..]);
        header.extend_from_slice(&(payload.len() as u32).to_be_bytes()[1..]);
        header.push(type_id);
        header.extend_from_slice(&msg_stream_id.to_le_bytes());
        if ext_ts {
            header.extend_from_slice(&timestamp.to_be_bytes());
        }

        self.writer.write_all(&header).await?;

        let mut offset = 0;
        let mut first = true;
        while offset < payload.len() {
            let take = (payload.len() - offset).min(self.chunk_size);
            if !first {
                let mut cont = Vec::with_capacity(5);
                self.write_basic_header(&mut cont, 3, csid);
                if ext_ts {
                    cont.extend_from_slice(&timestamp.to_be_bytes());
                }
                self.writer.write_all(&cont).await?;
            }
            self.writer.write_all(&payload[offset..offset + take]).await?;
            offset += take;
            first = false;
        }
        self.writer.flush().await?;
        Ok(())
    }

    fn write_basic_header(&self, out: &mut Vec<u8>, fmt: u8, csid: u32) {
        if csid < 64 {
            out.push((fmt << 6) | csid as u8);
        } else if csid < 320 {
            out.push(fmt << 6);
            out.push((csid - 64) as u8);
        } else {
            out.push((fmt << 6) | 1);
            let rel = csid - 64;
            out.push((rel & 0xFF) as u8);
            out.push((rel >> 8) as u8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn write_then_read_single_chunk_message() {
        let (client, server) = duplex(1 << 16);
        let mut writer = ChunkWriter::new(client);
        let mut reader = ChunkReader::new(server);

        let payload = vec![1u8, 2, 3, 4, 5];
        writer.write(5, 1000, 20, 0, &payload).await.unwrap();

        let message = reader.read_message().await.unwrap();
        assert_eq!(message.type_id, 20);
        assert_eq!(message.timestamp, 1000);
        assert_eq!(&message.payload[..], &payload[..]);
    }

    #[tokio::test]
    async fn splits_across_fmt3_continuation_chunks() {
        let (client, server) = duplex(1 << 16);
        let mut writer = ChunkWriter::new(client);
        writer.set_chunk_size(4);
        let mut reader = ChunkReader::new(server);
        reader.set_chunk_size(4);

        let payload: Vec<u8> = (0..20).collect();
        writer.write(3, 0, 9, 1, &payload).await.unwrap();

        let message = reader.read_message().await.unwrap();
        assert_eq!(&message.payload[..], &payload[..]);
    }

    #[tokio::test]
    async fn large_csid_encodes_and_decodes() {
        let (client, server) = duplex(1 << 16);
        let mut writer = ChunkWriter::new(client);
        let mut reader = ChunkReader::new(server);

        writer.write(500, 0, 8, 0, &[9, 9]).await.unwrap();
        let message = reader.read_message().await.unwrap();
        assert_eq!(message.type_id, 8);
    }
}
