//! Bitstream reading for MPEG audio frames
//!
//! `BitReader` pulls MSB-first bit fields out of any `std::io::Read` source.
//! Bytes are buffered internally and refilled on demand. While a frame is
//! open the reader refuses to touch bytes past the frame's declared length,
//! so a corrupt allocation can never swallow the next frame header.
//!
//! `BitWriter` is the inverse: a 32-bit cache flushed big-endian, used to
//! assemble frames for tests and benchmarks.

use std::io::{ErrorKind, Read};

use crate::crc::Crc16;
use crate::error::{DecodeResult, DecoderError};

/// Size of the internal refill buffer in bytes
pub const READ_BUFFER_SIZE: usize = 4096;

/// Buffered MSB-first bit reader
#[derive(Debug)]
pub struct BitReader<R> {
    /// Underlying byte source
    source: R,
    /// Refill buffer
    buffer: Box<[u8]>,
    /// Number of valid bytes in buffer
    len: usize,
    /// Index of the current byte in buffer
    position: usize,
    /// Bits already consumed from the current byte, always 0..=7
    bit_offset: u32,
    /// Bytes left in the open frame, `None` outside a frame
    frame_remaining: Option<usize>,
    /// Total bytes taken from the source
    consumed: u64,
    /// Checksum fed with every field read while active
    crc: Option<Crc16>,
}

impl<R: Read> BitReader<R> {
    pub fn new(source: R) -> Self {
        Self::with_capacity(source, READ_BUFFER_SIZE)
    }

    pub fn with_capacity(source: R, capacity: usize) -> Self {
        Self {
            source,
            buffer: vec![0u8; capacity.max(1)].into_boxed_slice(),
            len: 0,
            position: 0,
            bit_offset: 0,
            frame_remaining: None,
            consumed: 0,
            crc: None,
        }
    }

    /// Read the next `n` bits (0..=32) as an unsigned integer, MSB first
    pub fn get_bits(&mut self, n: u32) -> DecodeResult<u32> {
        if n > 32 {
            return Err(DecoderError::Internal(format!(
                "cannot read {} bits in one field",
                n
            )));
        }
        if n == 0 {
            return Ok(0);
        }

        let mut result: u64 = 0;
        let mut remaining = n;

        while remaining > 0 {
            if self.bit_offset == 0 {
                self.take_byte()?;
            }

            let available = 8 - self.bit_offset;
            let to_read = remaining.min(available);
            let shift = available - to_read;
            let mask = (1u32 << to_read) - 1;
            let bits = (u32::from(self.buffer[self.position]) >> shift) & mask;

            result = (result << to_read) | u64::from(bits);

            self.bit_offset += to_read;
            if self.bit_offset == 8 {
                self.bit_offset = 0;
                self.position += 1;
            }
            remaining -= to_read;
        }

        let value = result as u32;
        if let Some(crc) = self.crc.as_mut() {
            crc.add_bits(value, n);
        }
        Ok(value)
    }

    /// Read the next whole byte, discarding any unread bits of the current one
    pub fn read_byte(&mut self) -> DecodeResult<u8> {
        self.align();
        self.take_byte()?;
        let byte = self.buffer[self.position];
        self.position += 1;
        Ok(byte)
    }

    /// Skip to the next byte boundary
    pub fn align(&mut self) {
        if self.bit_offset != 0 {
            self.bit_offset = 0;
            self.position += 1;
        }
    }

    /// Bound subsequent reads to the next `length` bytes
    pub fn begin_frame(&mut self, length: usize) {
        self.align();
        self.frame_remaining = Some(length);
    }

    /// Skip whatever the frame has left (ancillary data, padding) and lift the bound.
    /// Returns the number of bytes skipped.
    pub fn end_frame(&mut self) -> DecodeResult<usize> {
        self.align();
        let remaining = self.frame_remaining.unwrap_or(0);
        for _ in 0..remaining {
            self.take_byte()?;
            self.position += 1;
        }
        self.frame_remaining = None;
        Ok(remaining)
    }

    /// Drop the frame bound without consuming the rest of the frame
    pub fn abandon_frame(&mut self) {
        self.align();
        self.frame_remaining = None;
    }

    /// Look at `n` bytes starting `ahead` bytes after the current one without
    /// consuming anything. `None` when the source ends first.
    pub fn peek_bytes(&mut self, ahead: usize, n: usize) -> DecodeResult<Option<&[u8]>> {
        let needed = ahead + n;
        self.fill_ahead(needed)?;
        if self.position + needed > self.len {
            return Ok(None);
        }
        let start = self.position + ahead;
        Ok(Some(&self.buffer[start..start + n]))
    }

    /// Start feeding every field read into `crc`
    pub fn begin_crc(&mut self, crc: Crc16) {
        self.crc = Some(crc);
    }

    /// Stop the checksum and return its value
    pub fn end_crc(&mut self) -> Option<u16> {
        self.crc.take().map(|crc| crc.value())
    }

    /// Total bytes taken from the source so far
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    /// Bit offset inside the current byte, 0..=7
    pub fn bit_offset(&self) -> u32 {
        self.bit_offset
    }

    /// Give back the byte source
    pub fn into_inner(self) -> R {
        self.source
    }

    /// Make buffer[position] a valid byte and charge it to the open frame
    fn take_byte(&mut self) -> DecodeResult<()> {
        if let Some(remaining) = self.frame_remaining {
            if remaining == 0 {
                return Err(DecoderError::FrameOverrun);
            }
        }
        if self.position >= self.len {
            self.refill()?;
        }
        if let Some(remaining) = self.frame_remaining.as_mut() {
            *remaining -= 1;
        }
        self.consumed += 1;
        Ok(())
    }

    /// Buffer at least `needed` bytes from the current one on, short only at
    /// the end of the source
    fn fill_ahead(&mut self, needed: usize) -> DecodeResult<()> {
        if self.position + needed <= self.len {
            return Ok(());
        }
        // Move the unread bytes to the front
        self.buffer.copy_within(self.position..self.len, 0);
        self.len -= self.position;
        self.position = 0;
        if needed > self.buffer.len() {
            let mut grown = vec![0u8; needed].into_boxed_slice();
            grown[..self.len].copy_from_slice(&self.buffer[..self.len]);
            self.buffer = grown;
        }
        while self.len < needed {
            match self.source.read(&mut self.buffer[self.len..]) {
                Ok(0) => break,
                Ok(n) => self.len += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(DecoderError::Io(e)),
            }
        }
        Ok(())
    }

    fn refill(&mut self) -> DecodeResult<()> {
        loop {
            match self.source.read(&mut self.buffer) {
                Ok(0) => return Err(DecoderError::EndOfStream),
                Ok(n) => {
                    self.len = n;
                    self.position = 0;
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(DecoderError::Io(e)),
            }
        }
    }
}

/// MSB-first bit writer with a 32-bit cache
#[derive(Debug, Clone)]
pub struct BitWriter {
    /// Completed bytes
    data: Vec<u8>,
    /// Bit cache, filled from the top
    cache: u32,
    /// Free bits in cache
    cache_bits: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            cache: 0,
            cache_bits: 32,
        }
    }

    /// Append the low `n` bits (0..=32) of `val`, most significant first
    pub fn put_bits(&mut self, val: u32, n: u32) {
        debug_assert!(n <= 32, "cannot write {} bits in one field", n);
        if n == 0 {
            return;
        }
        let val = if n < 32 { val & ((1u32 << n) - 1) } else { val };

        if self.cache_bits > n {
            self.cache_bits -= n;
            self.cache |= val << self.cache_bits;
        } else {
            let remaining = n - self.cache_bits;
            // remaining < 32 here since cache_bits >= 1
            self.cache |= val >> remaining;
            self.data.extend_from_slice(&self.cache.to_be_bytes());
            self.cache_bits = 32 - remaining;
            self.cache = if remaining == 0 {
                0
            } else {
                val << self.cache_bits
            };
        }
    }

    /// Number of bits written so far
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + (32 - self.cache_bits) as usize
    }

    /// Zero-fill up to the next byte boundary
    pub fn align(&mut self) {
        let partial = self.bits_written() % 8;
        if partial != 0 {
            self.put_bits(0, 8 - partial as u32);
        }
    }

    /// Zero-fill until exactly `bytes` bytes have been written.
    /// Does nothing when the writer is already past that length.
    pub fn pad_to(&mut self, bytes: usize) {
        self.align();
        while self.bits_written() < bytes * 8 {
            self.put_bits(0, 8);
        }
    }

    /// Flush the cache and return the bytes, the last one zero-padded
    pub fn finish(mut self) -> Vec<u8> {
        let used = 32 - self.cache_bits;
        let bytes = ((used + 7) / 8) as usize;
        let cache = self.cache.to_be_bytes();
        self.data.extend_from_slice(&cache[..bytes]);
        self.data
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}
