//! Wires an accepted/advanced RTMP session into the `Streamer` pipeline
//! abstraction: writes incoming `MediaPacket`s out as audio/video RTMP
//! message chunks on the message stream id the command handshake assigned.

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::av::{MediaPacket, MediaType};
use crate::error::{Result, VdkError};
use crate::streamer::{Reporter, Streamer, StreamerBase};

use super::chunk::ChunkWriter;

/// Chunk stream id RTMP audio messages are sent on.
const AUDIO_CSID: u32 = 4;
/// Chunk stream id RTMP video messages are sent on.
const VIDEO_CSID: u32 = 6;
/// RTMP/FLV tag type id for audio messages.
const AUDIO_MESSAGE_TYPE_ID: u8 = 8;
/// RTMP/FLV tag type id for video messages.
const VIDEO_MESSAGE_TYPE_ID: u8 = 9;

/// A `Streamer` that publishes media into an already-negotiated RTMP
/// session: each `source()` call writes the packet out as an audio or
/// video chunk message on `msg_stream_id`, then fans it out to any
/// attached sinkers (e.g. a recorder watching the published stream).
pub struct RtmpPublishStreamer<W: AsyncWrite + Unpin + Send> {
    base: StreamerBase,
    writer: ChunkWriter<W>,
    msg_stream_id: u32,
}

impl<W: AsyncWrite + Unpin + Send> RtmpPublishStreamer<W> {
    /// Wraps a `ChunkWriter` already advanced past `connect`/`createStream`/
    /// `publish`, as produced by [`super::accept_session`]/
    /// [`super::advance_session`].
    pub fn new(name: impl Into<String>, writer: ChunkWriter<W>, msg_stream_id: u32) -> Self {
        Self {
            base: StreamerBase::new(name),
            writer,
            msg_stream_id,
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Streamer for RtmpPublishStreamer<W> {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn set_reporter(&mut self, reporter: Box<dyn Reporter>) {
        self.base.set_reporter(reporter);
    }

    fn add_sinker(&mut self, sinker: Box<dyn crate::streamer::MediaSink>) -> usize {
        self.base.add_sinker(sinker)
    }

    fn remove_sinker(&mut self, name: &str) -> usize {
        self.base.remove_sinker(name)
    }

    async fn source(&mut self, packet: MediaPacket) -> Result<()> {
        let (csid, type_id) = match packet.media_type {
            MediaType::Audio => (AUDIO_CSID, AUDIO_MESSAGE_TYPE_ID),
            MediaType::Video => (VIDEO_CSID, VIDEO_MESSAGE_TYPE_ID),
            MediaType::Unknown => {
                return Err(VdkError::MalformedInput(
                    "RtmpPublishStreamer cannot publish a packet with unknown media type".into(),
                ))
            }
        };
        let timestamp = packet.dts_ms.or(packet.pts_ms).unwrap_or(0).max(0) as u32;
        self.writer
            .write(csid, timestamp, type_id, self.msg_stream_id, &packet.payload)
            .await?;
        self.base.fan_out(packet).await
    }

    fn add_option(&mut self, key: &str, value: &str) -> Result<()> {
        self.base.set_option(key, value);
        Ok(())
    }

    async fn start_network(&mut self, _url: &str) -> Result<()> {
        // The session is already connected by the time this streamer
        // exists; `accept_session`/`advance_session` own the handshake.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::av::CodecType;
    use crate::format::rtmp::chunk::{ChunkMessage, ChunkReader};
    use bytes::Bytes;

    #[tokio::test]
    async fn source_writes_video_then_fans_out_to_sinkers() {
        let (client_stream, server_stream) = tokio::io::duplex(1 << 16);
        let (_client_read, client_write) = tokio::io::split(client_stream);
        let (server_read, _server_write) = tokio::io::split(server_stream);

        let mut streamer = RtmpPublishStreamer::new(
            "publish_test",
            ChunkWriter::new(client_write),
            1,
        );

        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        struct CountingSink {
            count: std::sync::Arc<std::sync::atomic::AtomicUsize>,
        }
        #[async_trait]
        impl crate::streamer::MediaSink for CountingSink {
            fn name(&self) -> &str {
                "counter"
            }
            async fn source(&mut self, _packet: MediaPacket) -> Result<()> {
                self.count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
        }
        streamer.add_sinker(Box::new(CountingSink {
            count: count.clone(),
        }));

        let packet = MediaPacket::new(MediaType::Video, CodecType::H264, Bytes::from_static(b"nalu"))
            .with_dts_ms(42);
        streamer.source(packet).await.unwrap();

        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);

        let mut reader = ChunkReader::new(server_read);
        let message: ChunkMessage = reader.read_message().await.unwrap();
        assert_eq!(message.type_id, VIDEO_MESSAGE_TYPE_ID);
        assert_eq!(message.msg_stream_id, 1);
        assert_eq!(message.timestamp, 42);
        assert_eq!(&message.payload[..], b"nalu");
    }

    #[tokio::test]
    async fn source_rejects_unknown_media_type() {
        let (client_stream, _server_stream) = tokio::io::duplex(1 << 16);
        let (_client_read, client_write) = tokio::io::split(client_stream);
        let mut streamer = RtmpPublishStreamer::new("publish_test", ChunkWriter::new(client_write), 1);

        let packet = MediaPacket::new(MediaType::Unknown, CodecType::H264, Bytes::from_static(b"x"));
        assert!(streamer.source(packet).await.is_err());
    }
}
