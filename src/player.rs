//! Playback driver
//!
//! `Player` decodes frames one at a time and writes the PCM to an
//! `AudioDevice`. No audio backend is bundled; `MemoryDevice` collects the
//! samples in memory and serves as the null sink.

use std::io::Read;

use log::{debug, info, warn};

use crate::buffer::Buffer16BitStereo;
use crate::decoder::{Decoder, DecoderConfig};
use crate::error::DecodeResult;

/// Sink for interleaved 16-bit PCM
pub trait AudioDevice {
    /// Prepare for samples at `sample_rate` with `channels` interleaved channels
    fn open(&mut self, sample_rate: u32, channels: usize) -> DecodeResult<()>;

    fn is_open(&self) -> bool;

    /// Write interleaved samples, blocking until accepted
    fn write(&mut self, samples: &[i16]) -> DecodeResult<()>;

    /// Block until everything written has been played
    fn flush(&mut self) -> DecodeResult<()>;

    fn close(&mut self);

    /// Playback position in milliseconds
    fn position(&self) -> u64;
}

/// Device that keeps every sample in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryDevice {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: usize,
    open: bool,
    opens: usize,
    flushes: usize,
    /// Playback time of the samples written before the last `open`, in milliseconds
    base_position: u64,
    /// First sample written after the last `open`
    segment_start: usize,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of `open` calls
    pub fn opens(&self) -> usize {
        self.opens
    }

    /// Number of `flush` calls
    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl AudioDevice for MemoryDevice {
    fn open(&mut self, sample_rate: u32, channels: usize) -> DecodeResult<()> {
        self.base_position = self.position();
        self.segment_start = self.samples.len();
        self.sample_rate = sample_rate;
        self.channels = channels;
        self.open = true;
        self.opens += 1;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write(&mut self, samples: &[i16]) -> DecodeResult<()> {
        self.samples.extend_from_slice(samples);
        Ok(())
    }

    fn flush(&mut self) -> DecodeResult<()> {
        self.flushes += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn position(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return self.base_position;
        }
        let frames = ((self.samples.len() - self.segment_start) / self.channels) as u64;
        self.base_position + frames * 1000 / u64::from(self.sample_rate)
    }
}

/// Decodes a stream and plays it on an `AudioDevice`
#[derive(Debug)]
pub struct Player<R: Read, D: AudioDevice> {
    decoder: Decoder<R>,
    buffer: Buffer16BitStereo,
    device: D,
    /// Sample rate and channel count the device was opened with
    device_format: Option<(u32, usize)>,
    frames_played: u64,
    frames_skipped: u64,
    complete: bool,
    closed: bool,
}

impl<R: Read, D: AudioDevice> Player<R, D> {
    pub fn new(source: R, device: D) -> Self {
        Self::from_decoder(Decoder::new(source), device, false)
    }

    pub fn with_config(source: R, device: D, config: DecoderConfig) -> DecodeResult<Self> {
        let double = config.double_mono_to_stereo;
        Ok(Self::from_decoder(
            Decoder::with_config(source, config)?,
            device,
            double,
        ))
    }

    fn from_decoder(decoder: Decoder<R>, device: D, double_mono_to_stereo: bool) -> Self {
        Self {
            decoder,
            buffer: Buffer16BitStereo::new(double_mono_to_stereo),
            device,
            device_format: None,
            frames_played: 0,
            frames_skipped: 0,
            complete: false,
            closed: false,
        }
    }

    /// Play up to `frames` frames, or the whole stream with `None`.
    ///
    /// Returns `false` once the end of the stream was reached, after the
    /// device has been flushed and closed.
    pub fn play(&mut self, frames: Option<usize>) -> DecodeResult<bool> {
        let mut remaining = frames;
        let mut more = !self.complete && !self.closed;

        while more {
            if let Some(left) = remaining.as_mut() {
                if *left == 0 {
                    break;
                }
                *left -= 1;
            }
            more = self.decode_frame()?;
        }

        if !more && !self.complete && !self.closed {
            self.complete = true;
            if self.device.is_open() {
                self.device.flush()?;
            }
            self.close();
            info!(
                "playback finished: {} frames, {} skipped",
                self.frames_played, self.frames_skipped
            );
        }
        Ok(more)
    }

    /// Decode one frame and write it out. Bad frames are skipped.
    fn decode_frame(&mut self) -> DecodeResult<bool> {
        match self.decoder.decode_frame(&mut self.buffer) {
            Ok(header) => {
                let format = (header.sample_rate(), self.buffer.output_channels());
                if self.device_format != Some(format) || !self.device.is_open() {
                    self.reopen_device(format)?;
                }
                let samples = self.buffer.drain_samples();
                self.device.write(&samples)?;
                self.frames_played += 1;
                Ok(true)
            }
            Err(e) if e.is_recoverable() => {
                warn!("skipping frame: {}", e);
                self.frames_skipped += 1;
                Ok(true)
            }
            Err(e) if e.is_end_of_stream() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Open the device for `format`, draining and closing it first when it
    /// was playing another format
    fn reopen_device(&mut self, format: (u32, usize)) -> DecodeResult<()> {
        let (sample_rate, channels) = format;
        if self.device.is_open() {
            debug!(
                "output format changed to {} Hz, {} channels, reopening device",
                sample_rate, channels
            );
            self.device.flush()?;
            self.device.close();
        } else {
            debug!("opening device: {} Hz, {} channels", sample_rate, channels);
        }
        self.device.open(sample_rate, channels)?;
        self.device_format = Some(format);
        Ok(())
    }

    /// Stop playback and close the device. Further `play` calls do nothing.
    pub fn close(&mut self) {
        if !self.closed {
            self.device.close();
            self.closed = true;
        }
    }

    /// The whole stream has been played
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn frames_played(&self) -> u64 {
        self.frames_played
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    /// Playback position in milliseconds
    pub fn position(&self) -> u64 {
        self.device.position()
    }

    pub fn decoder(&self) -> &Decoder<R> {
        &self.decoder
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn into_device(mut self) -> D {
        self.close();
        self.device
    }
}
