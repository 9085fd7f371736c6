//! Byte buffer with prepend headroom.
//!
//! A growable byte region backed by a single contiguous allocation with
//! three cursors: `start`, `end`, and capacity. A fixed front pad is
//! reserved on every fresh allocation so callers can prepend small headers
//! (e.g. an RTMP chunk basic header, a length-prefixed record) without
//! reallocating.

use crate::error::{Result, VdkError};

/// Bytes reserved at the front of every fresh allocation.
pub const FRONT_PAD: usize = 200;

const SIZE_CLASSES: [usize; 4] = [50_000, 100_000, 200_000, 500_000];
const LINEAR_STEP: usize = 10_000;

/// A growable, consumable byte buffer with front-of-buffer headroom.
///
/// Invariant: `0 <= start <= end <= capacity` and `len() == end - start`.
#[derive(Debug, Clone)]
pub struct DataBuffer {
    data: Vec<u8>,
    start: usize,
    end: usize,
}

impl Default for DataBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DataBuffer {
    /// Creates an empty buffer with the standard front pad reserved.
    pub fn new() -> Self {
        let mut data = vec![0u8; FRONT_PAD];
        data.truncate(FRONT_PAD);
        Self {
            data,
            start: FRONT_PAD,
            end: FRONT_PAD,
        }
    }

    /// Number of readable bytes currently held.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True when no readable bytes remain.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the readable slice `[start, end)`.
    pub fn data(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }

    /// True if `n` additional bytes could be appended without growing.
    pub fn require(&self, n: usize) -> bool {
        self.end + n <= self.data.len()
    }

    /// Resets cursors back to the initial pad, retaining the allocation.
    pub fn reset(&mut self) {
        self.start = FRONT_PAD.min(self.data.len());
        self.end = self.start;
    }

    /// Appends `bytes` to the end of the buffer, growing per the size-class
    /// schedule (50k, 100k, 200k, 500k, then linear +10k) when needed.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.ensure_capacity(bytes.len())?;
        self.data[self.end..self.end + bytes.len()].copy_from_slice(bytes);
        self.end += bytes.len();
        Ok(())
    }

    /// Advances `start` by `n`. A negative `n` prepends previously consumed
    /// bytes back into the readable window, as long as `start + n >= 0`.
    pub fn consume(&mut self, n: isize) -> Result<()> {
        let new_start = self.start as isize + n;
        if new_start < 0 || new_start as usize > self.end {
            return Err(VdkError::MalformedInput(format!(
                "consume({}) out of bounds: start={}, end={}",
                n, self.start, self.end
            )));
        }
        self.start = new_start as usize;
        Ok(())
    }

    fn ensure_capacity(&mut self, additional: usize) -> Result<()> {
        let required = self.end + additional;
        if required <= self.data.len() {
            return Ok(());
        }

        // Try sliding the readable window back to the front pad first.
        if self.start > FRONT_PAD {
            let len = self.len();
            self.data.copy_within(self.start..self.end, FRONT_PAD);
            self.start = FRONT_PAD;
            self.end = FRONT_PAD + len;
            if self.end + additional <= self.data.len() {
                return Ok(());
            }
        }

        let new_len = Self::next_size_class(required);
        self.data
            .try_reserve(new_len - self.data.len())
            .map_err(|e| VdkError::ResourceExhausted(e.to_string()))?;
        self.data.resize(new_len, 0);
        Ok(())
    }

    fn next_size_class(required: usize) -> usize {
        for class in SIZE_CLASSES {
            if required <= class {
                return class;
            }
        }
        // Past the largest fixed class: round up to the next linear step.
        let over = required - SIZE_CLASSES[SIZE_CLASSES.len() - 1];
        let steps = over.div_ceil(LINEAR_STEP);
        SIZE_CLASSES[SIZE_CLASSES.len() - 1] + steps * LINEAR_STEP
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_consume_roundtrip() {
        let mut buf = DataBuffer::new();
        buf.append(b"hello").unwrap();
        buf.append(b" world").unwrap();
        assert_eq!(buf.data(), b"hello world");

        buf.consume(6).unwrap();
        assert_eq!(buf.data(), b"world");

        buf.consume(-6).unwrap();
        assert_eq!(buf.data(), b"hello world");
    }

    #[test]
    fn consume_negative_out_of_bounds_fails() {
        let mut buf = DataBuffer::new();
        buf.append(b"ab").unwrap();
        buf.consume(2).unwrap();
        assert!(buf.consume(-(FRONT_PAD as isize) - 1).is_err());
    }

    #[test]
    fn grows_past_first_size_class() {
        let mut buf = DataBuffer::new();
        let chunk = vec![7u8; 60_000];
        buf.append(&chunk).unwrap();
        assert_eq!(buf.len(), 60_000);
        assert!(buf.data().iter().all(|&b| b == 7));
    }

    #[quickcheck_macros::quickcheck]
    fn append_consume_matches_model(appends: Vec<Vec<u8>>, consumes: Vec<u8>) -> bool {
        let mut buf = DataBuffer::new();
        let mut model: Vec<u8> = Vec::new();
        let mut consumed_total: usize = 0;
        let total: usize = appends.iter().map(|b| b.len()).sum();

        for (i, chunk) in appends.iter().enumerate() {
            buf.append(chunk).unwrap();
            model.extend_from_slice(chunk);

            if let Some(&k) = consumes.get(i) {
                let k = (k as usize) % (total - consumed_total + 1).max(1);
                if buf.consume(k as isize).is_ok() {
                    model.drain(0..k);
                    consumed_total += k;
                }
            }
        }

        buf.data() == model.as_slice()
    }
}
