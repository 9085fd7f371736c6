//! Opus access-unit parser.
//!
//! Splits a concatenated stream of RFC 6716 Opus packets — each optionally
//! preceded by an "opus control header" (ISO/IEC 14496-3 table 6-1/6-2
//! framing, identified by the top 11 bits of a 2-byte prefix equal to
//! `0x3FF`) — into individual frame spans. Each returned span starts at its
//! packet's TOC byte so a downstream consumer can treat it as a standalone
//! Opus packet.

use std::ops::Range;

use crate::error::{Result, VdkError};

/// Parses every access unit in `data` and returns the frame spans found, in
/// order, as byte ranges into `data`.
pub fn parse_access_units(data: &[u8]) -> Result<Vec<Range<usize>>> {
    let mut spans = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let (header_len, payload_len) = split_access_unit(&data[pos..])?;
        let payload_start = pos + header_len;
        let payload_end = payload_start
            .checked_add(payload_len)
            .filter(|&e| e <= data.len())
            .ok_or_else(|| VdkError::MalformedInput("opus access unit exceeds buffer".into()))?;

        for span in parse_toc_frames(&data[payload_start..payload_end])? {
            spans.push((payload_start + span.start)..(payload_start + span.end));
        }
        pos = payload_end;
    }
    Ok(spans)
}

/// Builds the 19-byte Ogg "OpusHead" identification header used as codec
/// extradata (MPEG-TS descriptor / FLV AudioSpecificConfig-equivalent).
pub fn opus_extra_data(clock_rate: u32, channels: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(19);
    out.extend_from_slice(b"OpusHead");
    out.push(1); // version
    out.push(channels);
    out.extend_from_slice(&0u16.to_le_bytes()); // pre-skip
    out.extend_from_slice(&clock_rate.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // output gain
    out.push(0); // mapping family
    out
}

/// Splits off one opus control header (if present) from the front of
/// `data`, returning `(header_len, payload_len)`. When no control header is
/// present the entire slice is one undelimited Opus packet
/// (`header_len == 0`).
fn split_access_unit(data: &[u8]) -> Result<(usize, usize)> {
    if data.len() < 3 {
        return Err(VdkError::MalformedInput(
            "opus access unit shorter than a control header prefix".into(),
        ));
    }

    let prefix = ((data[0] as u16) << 8) | data[1] as u16;
    if (prefix & 0xffe0) != 0x7fe0 {
        return Ok((0, data.len()));
    }

    let start_trim = (prefix >> 4) & 1;
    let end_trim = (prefix >> 3) & 1;
    let ctrl_ext = (prefix >> 2) & 1;

    let mut unit_size: usize = data[2] as usize;
    let mut i = 3usize;
    while i < data.len() && data[i - 1] == 0xFF {
        unit_size += data[i] as usize;
        i += 1;
    }

    if start_trim == 1 {
        i += 2;
    }
    if end_trim == 1 {
        i += 2;
    }
    if ctrl_ext == 1 {
        let ext_len = *data
            .get(i)
            .ok_or_else(|| VdkError::MalformedInput("opus control extension truncated".into()))?;
        i += 1 + ext_len as usize;
    }

    if i + unit_size > data.len() {
        return Err(VdkError::MalformedInput(
            "opus control header declares a unit past the end of the buffer".into(),
        ));
    }

    Ok((i, unit_size))
}

/// Reads a 1- or 2-byte Xiph lacing length (codes 2/3 per-frame lengths).
fn xiph_lacing_16bit(data: &[u8], pos: usize) -> Result<(i64, usize)> {
    if pos >= data.len() {
        return Err(VdkError::MalformedInput("opus lacing length truncated".into()));
    }
    let mut val = data[pos] as i64;
    let mut pos = pos + 1;
    if val >= 252 {
        if pos >= data.len() {
            return Err(VdkError::MalformedInput("opus lacing length truncated".into()));
        }
        val += 4 * data[pos] as i64;
        pos += 1;
    }
    Ok((val, pos))
}

/// Reads a multi-byte Xiph lacing length (code-3 padding size).
fn xiph_lacing_full(data: &[u8], mut pos: usize) -> Result<(i64, usize)> {
    let mut val: i64 = 0;
    loop {
        if pos >= data.len() {
            return Err(VdkError::MalformedInput("opus padding length truncated".into()));
        }
        let next = data[pos] as i64;
        pos += 1;
        val += next;
        if next < 255 {
            break;
        }
        val -= 1;
    }
    Ok((val, pos))
}

/// Splits one undelimited Opus packet (TOC byte + frame data) into frame
/// spans, per the TOC byte's low 2 bits. Each span starts at the TOC byte.
fn parse_toc_frames(data: &[u8]) -> Result<Vec<Range<usize>>> {
    if data.is_empty() {
        return Err(VdkError::MalformedInput("empty opus packet".into()));
    }
    let toc = data[0];
    let end = data.len();
    let mut frames = Vec::new();

    match toc & 0x03 {
        0 => frames.push(0..end),
        1 => {
            let len = end as i64 - 1;
            if len < 0 || len % 2 != 0 {
                return Err(VdkError::MalformedInput(format!(
                    "two cbr opus frames: odd remaining length {len}"
                )));
            }
            let half = (len / 2) as usize;
            let mut p = 1usize;
            frames.push((p - 1)..(p - 1 + half + 1));
            p += half;
            frames.push((p - 1)..(p - 1 + half + 1));
        }
        2 => {
            let (frame_len, new_p) = xiph_lacing_16bit(data, 1)?;
            if frame_len <= 0 {
                return Err(VdkError::MalformedInput(format!(
                    "two-frame opus packet: invalid frame length {frame_len}"
                )));
            }
            frames.push((new_p - 1)..(new_p - 1 + frame_len as usize + 1));
            let p = new_p + frame_len as usize;
            let frame_len2 = end - p;
            frames.push((p - 1)..(p - 1 + frame_len2 + 1));
        }
        3 => {
            let mut p = 1usize;
            let index = *data
                .get(p)
                .ok_or_else(|| VdkError::MalformedInput("opus code-3 byte missing".into()))?;
            p += 1;

            let frame_count = (index & 0x3f) as i64;
            let padding_flag = (index >> 6) & 1;
            let vbr = (index >> 7) & 1;

            if frame_count <= 0 || frame_count > 48 {
                return Err(VdkError::MalformedInput(format!(
                    "opus code-3 frame_count out of range: {frame_count}"
                )));
            }

            let mut padding: i64 = 0;
            if padding_flag == 1 {
                let (p_val, new_p) = xiph_lacing_full(data, p)?;
                if p_val < 0 {
                    return Err(VdkError::MalformedInput("opus code-3 padding negative".into()));
                }
                padding = p_val;
                p = new_p;
            }

            if vbr == 1 {
                let mut total: i64 = 0;
                let mut sizes = Vec::with_capacity((frame_count - 1) as usize);
                for _ in 0..frame_count - 1 {
                    let (frame_len, new_p) = xiph_lacing_16bit(data, p)?;
                    if frame_len < 0 {
                        return Err(VdkError::MalformedInput("opus vbr frame length invalid".into()));
                    }
                    sizes.push(frame_len);
                    total += frame_len;
                    p = new_p;
                }
                let remaining = end as i64 - p as i64 - padding;
                if total > remaining {
                    return Err(VdkError::MalformedInput(format!(
                        "opus vbr total {total} exceeds remaining {remaining}"
                    )));
                }
                for (idx, &size) in sizes.iter().enumerate() {
                    if idx == sizes.len() - 1 {
                        let last_len = remaining - total;
                        frames.push((p - 1)..(p - 1 + last_len as usize + 1));
                    } else {
                        frames.push((p - 1)..(p - 1 + size as usize + 1));
                        p += size as usize;
                    }
                }
            } else {
                let remaining = end as i64 - p as i64 - padding;
                if remaining <= 0 || remaining % frame_count != 0 || remaining / frame_count > 48 {
                    return Err(VdkError::MalformedInput(format!(
                        "opus cbr remaining {remaining} not divisible by frame_count {frame_count}"
                    )));
                }
                let frame_len = (remaining / frame_count) as usize;
                for _ in 0..frame_count {
                    frames.push((p - 1)..(p - 1 + frame_len + 1));
                    p += frame_len;
                }
            }
        }
        _ => unreachable!(),
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_control_header_passes_through_as_single_access_unit() {
        // code 0 (single frame), TOC low bits 00, 8 bytes of "frame" data.
        let data = [0x04, 1, 2, 3, 4, 5, 6, 7];
        let spans = parse_access_units(&data).unwrap();
        assert_eq!(spans, vec![0..8]);
    }

    #[test]
    fn code3_cbr_four_frames_of_forty_bytes() {
        // TOC + index byte + 160 bytes of content (40 bytes/frame * 4).
        let mut data = vec![0x03u8]; // TOC: code 3
        data.push(4); // frame_count=4, no padding, no vbr
        data.extend(std::iter::repeat(0xAAu8).take(160));
        assert_eq!(data.len(), 162);

        let spans = parse_toc_frames(&data).unwrap();
        assert_eq!(spans.len(), 4);
        // Each span carries 40 bytes of frame content plus one leading
        // stand-in TOC byte (the real TOC only for the first frame).
        for span in &spans {
            assert_eq!(span.end - span.start, 41);
        }
        assert_eq!(spans[0], 1..42);
        assert_eq!(spans[3].end, data.len());
    }

    #[test]
    fn code1_two_cbr_frames_reject_odd_length() {
        let data = [0x01u8, 1, 2, 3]; // code 1, 3 remaining bytes (odd)
        assert!(parse_toc_frames(&data).is_err());
    }

    #[test]
    fn extra_data_matches_opushead_layout() {
        let extra = opus_extra_data(48000, 2);
        assert_eq!(extra.len(), 19);
        assert_eq!(&extra[0..8], b"OpusHead");
        assert_eq!(extra[8], 1);
        assert_eq!(extra[9], 2);
    }
}
