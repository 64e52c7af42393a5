//! PCM output buffers
//!
//! The decoder hands every synthesis pass to an `OutputBuffer`, one channel
//! at a time. `Buffer16BitStereo` keeps one frame of interleaved
//! little-endian 16-bit samples in memory and lets the caller drain them
//! through `std::io::Read`.

use std::io::{self, Read};

use crate::error::DecodeResult;
use crate::synthesis::clamp_pcm;
use crate::tables::SBLIMIT;

/// Samples per channel in the largest frame
pub const MAX_FRAME_SAMPLES: usize = 1152;

/// Destination of decoded PCM
pub trait OutputBuffer {
    /// Announce the layout of the frame about to be decoded
    fn set_format(&mut self, channels: usize, sample_rate: u32) -> DecodeResult<()>;

    /// Take the 32 PCM values of one synthesis pass for `channel`
    fn append_samples(&mut self, channel: usize, samples: &[f32; SBLIMIT]);

    /// Start a new frame, dropping anything not yet written out
    fn clear_buffer(&mut self);

    /// Close the frame, making its samples available
    fn write_buffer(&mut self) -> DecodeResult<()>;
}

/// Convert a PCM value to i16, clamped to ±32767 and truncated toward zero
#[inline]
pub fn pcm_to_i16(value: f32) -> i16 {
    clamp_pcm(value) as i16
}

/// Interleaved 16-bit little-endian sample buffer holding one frame
#[derive(Debug, Clone)]
pub struct Buffer16BitStereo {
    data: Vec<u8>,
    /// Next byte offset per channel
    write_pos: [usize; 2],
    /// End of valid data, set by `write_buffer`
    end: usize,
    read_pos: usize,
    /// Channels produced by the decoder
    channels: usize,
    sample_rate: u32,
    /// Copy a mono stream into both output channels
    double_mono_to_stereo: bool,
}

impl Buffer16BitStereo {
    pub fn new(double_mono_to_stereo: bool) -> Self {
        Self {
            data: vec![0u8; MAX_FRAME_SAMPLES * 2 * 2],
            write_pos: [0, 2],
            end: 0,
            read_pos: 0,
            channels: 2,
            sample_rate: 0,
            double_mono_to_stereo,
        }
    }

    pub fn double_mono_to_stereo(&self) -> bool {
        self.double_mono_to_stereo
    }

    pub fn set_double_mono_to_stereo(&mut self, enabled: bool) {
        self.double_mono_to_stereo = enabled;
        self.clear_buffer();
    }

    /// Channels in the interleaved output
    pub fn output_channels(&self) -> usize {
        if self.channels == 1 && self.double_mono_to_stereo {
            2
        } else {
            self.channels
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Bytes of one interleaved sample frame
    pub fn frame_bytes(&self) -> usize {
        2 * self.output_channels()
    }

    /// Bytes written by the last frame and not read yet
    pub fn pending_bytes(&self) -> &[u8] {
        &self.data[self.read_pos..self.end]
    }

    /// Bytes available to `read`
    pub fn available(&self) -> usize {
        self.end - self.read_pos
    }

    /// Drain every pending sample as interleaved i16
    pub fn drain_samples(&mut self) -> Vec<i16> {
        let samples = self
            .pending_bytes()
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        self.read_pos = self.end;
        samples
    }

    #[inline]
    fn put(&mut self, pos: usize, value: i16) {
        if self.data.len() < pos + 2 {
            self.data.resize(pos + 2, 0);
        }
        self.data[pos..pos + 2].copy_from_slice(&value.to_le_bytes());
    }
}

impl Default for Buffer16BitStereo {
    fn default() -> Self {
        Self::new(false)
    }
}

impl OutputBuffer for Buffer16BitStereo {
    fn set_format(&mut self, channels: usize, sample_rate: u32) -> DecodeResult<()> {
        if channels != self.channels {
            self.channels = channels.clamp(1, 2);
            self.clear_buffer();
        }
        self.sample_rate = sample_rate;
        Ok(())
    }

    fn append_samples(&mut self, channel: usize, samples: &[f32; SBLIMIT]) {
        if channel >= self.channels {
            return;
        }
        let stride = self.frame_bytes();
        let doubled = self.channels == 1 && self.double_mono_to_stereo;
        let mut pos = self.write_pos[channel];

        for &sample in samples {
            let value = pcm_to_i16(sample);
            self.put(pos, value);
            if doubled {
                self.put(pos + 2, value);
            }
            pos += stride;
        }
        self.write_pos[channel] = pos;
    }

    fn clear_buffer(&mut self) {
        self.write_pos = [0, 2];
        self.end = 0;
        self.read_pos = 0;
    }

    fn write_buffer(&mut self) -> DecodeResult<()> {
        self.end = self.write_pos[0];
        self.read_pos = 0;
        Ok(())
    }
}

impl Read for Buffer16BitStereo {
    /// Copy whole sample frames only. Returns 0 once the frame is drained,
    /// or when `buf` cannot hold a single sample frame.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let frame = self.frame_bytes();
        let mut count = buf.len().min(self.available());
        count -= count % frame;

        buf[..count].copy_from_slice(&self.data[self.read_pos..self.read_pos + count]);
        self.read_pos += count;
        Ok(count)
    }
}
