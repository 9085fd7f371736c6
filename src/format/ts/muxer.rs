use super::parser::TSPacketParser;
use super::types::*;
use crate::av::{self, Packet};
use crate::config::Config;
use crate::error::Result;
use crate::format::Muxer as FormatMuxer;
use crate::utils::crc::Crc32Mpeg2;
use bytes::{BufMut, BytesMut};
use std::time::Duration;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};

const PCR_INTERVAL: Duration = Duration::from_millis(40); // ~25 PCR updates per second

#[derive(Clone)]
struct TSCodecData {
    codec_type: av::CodecType,
    width: Option<u32>,
    height: Option<u32>,
    extra_data: Option<Vec<u8>>,
}

impl av::CodecData for TSCodecData {
    fn codec_type(&self) -> av::CodecType {
        self.codec_type
    }
    fn width(&self) -> Option<u32> {
        self.width
    }
    fn height(&self) -> Option<u32> {
        self.height
    }
    fn extra_data(&self) -> Option<&[u8]> {
        self.extra_data.as_deref()
    }
}

/// Muxes elementary streams (H.264/H.265/AAC/Opus) into an MPEG Transport
/// Stream.
///
/// PAT/PMT are re-emitted at startup and then again every
/// `patpmt_interval_ms` (a player that joins mid-stream needs a PAT/PMT
/// before it can lock onto any PES), as well as immediately ahead of every
/// video keyframe so a late-joining player can start decoding right away.
pub struct TSMuxer<W: AsyncWrite + Unpin + Send> {
    parser: TSPacketParser,
    stream_writer: io::BufWriter<W>,
    streams: Vec<Box<dyn av::CodecData>>,
    continuity_counters: Vec<u8>,
    psi_continuity: u8,
    current_pcr: Duration,
    last_pcr: Option<Duration>,
    last_pcr_write: Duration,
    pat: PAT,
    pmt: PMT,
    crc: Crc32Mpeg2,
    stream_discontinuity: bool,
    patpmt_interval: Duration,
    last_patpmt_write: Option<Duration>,
}

impl<W: AsyncWrite + Unpin + Send> TSMuxer<W> {
    pub fn new(writer: W) -> Self {
        let config = Config::get();
        Self {
            parser: TSPacketParser::new(),
            stream_writer: io::BufWriter::new(writer),
            streams: Vec::new(),
            continuity_counters: Vec::new(),
            psi_continuity: 0,
            current_pcr: Duration::ZERO,
            last_pcr: None,
            last_pcr_write: Duration::ZERO,
            pat: PAT::new(),
            pmt: PMT::new(),
            crc: Crc32Mpeg2::new(),
            stream_discontinuity: false,
            patpmt_interval: Duration::from_millis(config.patpmt_interval_ms),
            last_patpmt_write: None,
        }
    }

    pub fn mark_discontinuity(&mut self) {
        self.stream_discontinuity = true;
    }

    pub fn reset_pcr(&mut self) {
        self.current_pcr = Duration::ZERO;
        self.last_pcr = None;
        self.last_pcr_write = Duration::ZERO;
    }

    pub(crate) fn get_stream_pid(&self, index: usize) -> u16 {
        0x100 + (index as u16)
    }

    pub(crate) fn get_next_continuity_counter(&mut self, stream_index: usize) -> u8 {
        let counter = &mut self.continuity_counters[stream_index];
        *counter = (*counter + 1) & 0x0F;
        *counter
    }

    fn update_pcr(&mut self, packet_time: Option<Duration>) {
        if let Some(time) = packet_time {
            if let Some(last_pcr) = self.last_pcr {
                if time < last_pcr {
                    self.mark_discontinuity();
                }
            }
            self.current_pcr = time;
        }
    }

    fn needs_pcr(&self) -> bool {
        self.current_pcr >= self.last_pcr_write + PCR_INTERVAL
    }

    /// Whether PAT/PMT should be (re-)written: never written yet, the
    /// configured interval elapsed, or the caller is about to send a video
    /// keyframe.
    fn needs_patpmt(&self, is_video_keyframe: bool) -> bool {
        is_video_keyframe
            || match self.last_patpmt_write {
                None => true,
                Some(last) => self.current_pcr >= last + self.patpmt_interval,
            }
    }

    fn next_psi_continuity(&mut self) -> u8 {
        let c = self.psi_continuity;
        self.psi_continuity = (self.psi_continuity + 1) & 0x0F;
        c
    }

    async fn write_pat(&mut self) -> Result<()> {
        let mut buf = BytesMut::with_capacity(TS_PACKET_SIZE);

        let header = TSHeader {
            sync_byte: 0x47,
            transport_error: false,
            payload_unit_start: true,
            transport_priority: false,
            pid: PID_PAT,
            scrambling_control: 0,
            adaptation_field_exists: false,
            contains_payload: true,
            continuity_counter: self.next_psi_continuity(),
        };
        header.write_to(&mut buf)?;

        buf.put_u8(0); // Pointer field
        buf.put_u8(TABLE_ID_PAT);

        let mut section = BytesMut::new();
        self.pat.write_to(&mut section)?;

        let section_length = section.len() + 5 + 4;
        buf.put_u16((0xB000 | section_length as u16) & 0x3FF);
        buf.put_u16(1); // Transport stream ID
        buf.put_u8(0xC1); // Version 0, current

        buf.put_u8(0); // Section number
        buf.put_u8(0); // Last section number

        buf.extend_from_slice(&section);

        let crc = self.crc.calculate(&buf[5..5 + section_length - 4].to_vec());
        buf.put_u32(crc);

        while buf.len() < TS_PACKET_SIZE {
            buf.put_u8(0xFF);
        }

        self.stream_writer.write_all(&buf).await?;
        Ok(())
    }

    async fn write_pmt(&mut self) -> Result<()> {
        let mut buf = BytesMut::with_capacity(TS_PACKET_SIZE);

        let header = TSHeader {
            sync_byte: 0x47,
            transport_error: false,
            payload_unit_start: true,
            transport_priority: false,
            pid: PID_PMT,
            scrambling_control: 0,
            adaptation_field_exists: false,
            contains_payload: true,
            continuity_counter: self.next_psi_continuity(),
        };
        header.write_to(&mut buf)?;

        buf.put_u8(0); // Pointer field
        buf.put_u8(TABLE_ID_PMT);

        let mut section = BytesMut::new();
        self.pmt.write_to(&mut section)?;

        let section_length = section.len() + 5 + 4;
        buf.put_u16((0xB000 | section_length as u16) & 0x3FF);
        buf.put_u16(1); // Program number
        buf.put_u8(0xC1); // Version 0, current

        buf.put_u8(0); // Section number
        buf.put_u8(0); // Last section number

        buf.extend_from_slice(&section);

        let crc = self.crc.calculate(&buf[5..5 + section_length - 4].to_vec());
        buf.put_u32(crc);

        while buf.len() < TS_PACKET_SIZE {
            buf.put_u8(0xFF);
        }

        self.stream_writer.write_all(&buf).await?;
        Ok(())
    }

    async fn write_patpmt(&mut self) -> Result<()> {
        self.write_pat().await?;
        self.write_pmt().await?;
        self.last_patpmt_write = Some(self.current_pcr);
        Ok(())
    }
}

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send> FormatMuxer for TSMuxer<W> {
    async fn write_header(&mut self, streams: &[Box<dyn av::CodecDataExt>]) -> Result<()> {
        self.pat.entries.clear();
        self.pat.entries.push(PATEntry {
            program_number: 1,
            network_pid: 0,
            program_map_pid: PID_PMT,
        });

        if !streams.is_empty() {
            self.pmt.pcr_pid = self.get_stream_pid(0);
        }

        for codec in streams {
            let (stream_type, descriptors) = match codec.codec_type() {
                av::CodecType::H264 => (STREAM_TYPE_H264, Vec::new()),
                av::CodecType::H265 => (STREAM_TYPE_H265, Vec::new()),
                av::CodecType::AAC => (STREAM_TYPE_AAC, Vec::new()),
                av::CodecType::OPUS => (
                    STREAM_TYPE_PRIVATE_DATA,
                    vec![Descriptor {
                        tag: DESCRIPTOR_TAG_REGISTRATION,
                        data: OPUS_REGISTRATION_DATA.to_vec(),
                    }],
                ),
            };

            let elementary_pid = 0x100 + (self.streams.len() as u16);
            self.pmt.elementary_stream_infos.push(ElementaryStreamInfo {
                stream_type,
                elementary_pid,
                descriptors,
            });

            self.continuity_counters.push(0);
            self.streams.push(Box::new(TSCodecData {
                codec_type: codec.codec_type(),
                width: codec.width(),
                height: codec.height(),
                extra_data: codec.extra_data().map(|d| d.to_vec()),
            }));
        }

        self.write_patpmt().await?;
        self.stream_writer.flush().await?;
        Ok(())
    }

    async fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        if let Some(pts) = packet.pts {
            self.update_pcr(Some(Duration::from_millis(pts as u64)));
        }

        if self.needs_patpmt(packet.is_key) {
            self.write_patpmt().await?;
        }

        let mut buf = BytesMut::with_capacity(TS_PACKET_SIZE);

        let need_pcr = self.needs_pcr() && packet.stream_index == 0;
        let is_pcr_pid = self.get_stream_pid(packet.stream_index) == self.pmt.pcr_pid;

        let mut adaptation_size = if need_pcr && is_pcr_pid { 8 } else { 0 };
        if self.stream_discontinuity {
            adaptation_size += 1;
        }

        let payload_size = packet.data.len();
        let header_size = 4;
        let stuffing_needed = if payload_size + header_size + adaptation_size < TS_PACKET_SIZE {
            TS_PACKET_SIZE - (payload_size + header_size + adaptation_size)
        } else {
            0
        };

        let header = TSHeader {
            sync_byte: 0x47,
            transport_error: false,
            payload_unit_start: true,
            transport_priority: false,
            pid: self.get_stream_pid(packet.stream_index),
            scrambling_control: 0,
            adaptation_field_exists: need_pcr || stuffing_needed > 0 || self.stream_discontinuity,
            contains_payload: true,
            continuity_counter: self.get_next_continuity_counter(packet.stream_index),
        };
        header.write_to(&mut buf)?;

        if header.adaptation_field_exists {
            let mut adaptation_length = stuffing_needed;
            if need_pcr {
                adaptation_length += 7;
            }
            if self.stream_discontinuity {
                adaptation_length += 1;
            }

            buf.put_u8(adaptation_length as u8);

            let mut flags = 0u8;
            if need_pcr {
                flags |= 0x10; // PCR flag
            }
            if self.stream_discontinuity {
                flags |= 0x80; // Discontinuity indicator
            }
            if stuffing_needed > 0 {
                flags |= 0x20; // Random access indicator
            }
            buf.put_u8(flags);

            if need_pcr {
                let pcr = time_to_pcr(self.current_pcr);
                buf.extend_from_slice(&((pcr >> 16) as u32).to_be_bytes());
                buf.extend_from_slice(&((pcr & 0xFFFF) as u16).to_be_bytes());
                self.last_pcr = Some(self.current_pcr);
                self.last_pcr_write = self.current_pcr;
            }

            for _ in 0..stuffing_needed {
                buf.put_u8(0xFF);
            }
        }

        buf.extend_from_slice(&packet.data);

        self.stream_writer.write_all(&buf).await?;
        Ok(())
    }

    async fn write_trailer(&mut self) -> Result<()> {
        self.stream_writer.flush().await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.stream_writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::runtime::Runtime;

    #[derive(Clone)]
    struct TestCodec;

    impl av::CodecData for TestCodec {
        fn codec_type(&self) -> av::CodecType {
            av::CodecType::H264
        }

        fn width(&self) -> Option<u32> {
            None
        }

        fn height(&self) -> Option<u32> {
            None
        }

        fn extra_data(&self) -> Option<&[u8]> {
            None
        }
    }

    #[derive(Clone)]
    struct OpusTestCodec;

    impl av::CodecData for OpusTestCodec {
        fn codec_type(&self) -> av::CodecType {
            av::CodecType::OPUS
        }

        fn width(&self) -> Option<u32> {
            None
        }

        fn height(&self) -> Option<u32> {
            None
        }

        fn extra_data(&self) -> Option<&[u8]> {
            None
        }
    }

    #[test]
    fn test_ts_muxer_basic() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let buf = Vec::new();
            let mut muxer = TSMuxer::new(Cursor::new(buf));

            let streams = vec![Box::new(TestCodec) as Box<dyn av::CodecDataExt>];
            muxer.write_header(&streams).await.unwrap();

            let packet = Packet::new(bytes::Bytes::from(vec![0; 184]))
                .with_stream_index(0)
                .with_pts(0);
            muxer.write_packet(&packet).await.unwrap();
        });
    }

    #[test]
    fn opus_stream_gets_registration_descriptor() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let buf = Vec::new();
            let mut muxer = TSMuxer::new(Cursor::new(buf));
            let streams = vec![Box::new(OpusTestCodec) as Box<dyn av::CodecDataExt>];
            muxer.write_header(&streams).await.unwrap();

            let info = &muxer.pmt.elementary_stream_infos[0];
            assert_eq!(info.stream_type, STREAM_TYPE_PRIVATE_DATA);
            assert_eq!(info.descriptors[0].tag, DESCRIPTOR_TAG_REGISTRATION);
            assert_eq!(info.descriptors[0].data, OPUS_REGISTRATION_DATA);
        });
    }

    #[test]
    fn patpmt_reemitted_ahead_of_keyframe() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let buf = Vec::new();
            let mut muxer = TSMuxer::new(Cursor::new(buf));
            let streams = vec![Box::new(TestCodec) as Box<dyn av::CodecDataExt>];
            muxer.write_header(&streams).await.unwrap();
            let written_after_header = muxer.last_patpmt_write;

            let packet = Packet::new(bytes::Bytes::from(vec![0; 10]))
                .with_stream_index(0)
                .with_pts(1000)
                .with_key_flag(true);
            muxer.write_packet(&packet).await.unwrap();

            assert!(muxer.last_patpmt_write >= written_after_header);
        });
    }
}
