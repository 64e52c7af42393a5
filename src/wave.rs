//! RIFF/WAVE output
//!
//! Standard RIFF files are written and read through `hound`.
//! `WaveWriter::new_bare` writes the same chunks without the leading
//! `"RIFF" size` pair, a layout some older tools produced:
//!
//! ```text
//! "WAVE"
//! "fmt " 16 format(1) channels rate byte_rate block_align bits
//! "data" size samples...
//! ```
//!
//! The bare data size is written as zero first and backpatched once the data
//! length is known.

use std::fmt;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use log::debug;

use crate::buffer::{pcm_to_i16, OutputBuffer};
use crate::decoder::{DecodeSummary, Decoder, DecoderConfig};
use crate::error::{DecodeResult, DecoderError, WaveError, WaveResult};
use crate::tables::SBLIMIT;

/// WAVE format tag for integer PCM
const WAVE_FORMAT_PCM: u16 = 0x0001;

/// Size of the PCM `fmt ` chunk body
const FMT_CHUNK_LEN: u32 = 16;

/// File offset of the data size field in the bare layout
const BARE_DATA_SIZE_OFFSET: u64 = 32;

/// PCM format of a WAVE file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveSpec {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
}

impl WaveSpec {
    pub fn new(sample_rate: u32, bits_per_sample: u16, channels: u16) -> Self {
        Self {
            sample_rate,
            bits_per_sample,
            channels,
        }
    }

    /// Check the parameters the writer supports
    pub fn validate(&self) -> WaveResult<()> {
        if self.channels != 1 && self.channels != 2 {
            return Err(WaveError::InvalidChannels(self.channels));
        }
        validate_bits_per_sample(self.bits_per_sample)?;
        if self.sample_rate == 0 {
            return Err(WaveError::InvalidSampleRate(self.sample_rate));
        }
        Ok(())
    }

    /// Bytes of one sample frame across all channels
    pub fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.block_align())
    }

    fn to_hound(self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: hound::SampleFormat::Int,
        }
    }
}

fn validate_bits_per_sample(bits_per_sample: u16) -> WaveResult<()> {
    match bits_per_sample {
        8 | 16 => Ok(()),
        bits => Err(WaveError::InvalidBitsPerSample(bits)),
    }
}

/// 8-bit WAVE samples are unsigned with a 128 offset
fn to_unsigned_8bit(sample: i16) -> u8 {
    ((sample >> 8) + 128) as u8
}

enum Output<W: Write + Seek> {
    Riff(hound::WavWriter<W>),
    Bare(W),
}

/// Streaming WAVE writer
pub struct WaveWriter<W: Write + Seek> {
    output: Output<W>,
    spec: WaveSpec,
    /// Sample bytes written so far
    data_len: u32,
}

impl<W: Write + Seek> fmt::Debug for WaveWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = match self.output {
            Output::Riff(_) => "riff",
            Output::Bare(_) => "bare",
        };
        f.debug_struct("WaveWriter")
            .field("layout", &layout)
            .field("spec", &self.spec)
            .field("data_len", &self.data_len)
            .finish()
    }
}

impl<W: Write + Seek> WaveWriter<W> {
    /// Write a standard RIFF/WAVE header
    pub fn new(sink: W, spec: WaveSpec) -> WaveResult<Self> {
        spec.validate()?;
        let writer = hound::WavWriter::new(sink, spec.to_hound())?;
        Ok(Self::opened(Output::Riff(writer), spec))
    }

    /// Write the legacy header that starts at "WAVE"
    pub fn new_bare(mut sink: W, spec: WaveSpec) -> WaveResult<Self> {
        spec.validate()?;
        let mut header = Vec::with_capacity(36);
        header.extend_from_slice(b"WAVE");
        header.extend_from_slice(b"fmt ");
        header.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
        header.extend_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
        header.extend_from_slice(&spec.channels.to_le_bytes());
        header.extend_from_slice(&spec.sample_rate.to_le_bytes());
        header.extend_from_slice(&spec.byte_rate().to_le_bytes());
        header.extend_from_slice(&spec.block_align().to_le_bytes());
        header.extend_from_slice(&spec.bits_per_sample.to_le_bytes());
        header.extend_from_slice(b"data");
        header.extend_from_slice(&0u32.to_le_bytes());
        sink.write_all(&header)?;
        Ok(Self::opened(Output::Bare(sink), spec))
    }

    fn opened(output: Output<W>, spec: WaveSpec) -> Self {
        debug!(
            "WAVE header: {} Hz, {} channels, {} bits",
            spec.sample_rate, spec.channels, spec.bits_per_sample
        );
        Self {
            output,
            spec,
            data_len: 0,
        }
    }

    pub fn spec(&self) -> WaveSpec {
        self.spec
    }

    /// Sample bytes written so far
    pub fn data_len(&self) -> u32 {
        self.data_len
    }

    /// Append interleaved samples. 8-bit output stores `(s >> 8) + 128`.
    pub fn write_data(&mut self, samples: &[i16]) -> WaveResult<()> {
        let eight_bit = self.spec.bits_per_sample == 8;
        match &mut self.output {
            Output::Riff(writer) => {
                for &s in samples {
                    if eight_bit {
                        writer.write_sample((s >> 8) as i8)?;
                    } else {
                        writer.write_sample(s)?;
                    }
                }
            }
            Output::Bare(sink) => {
                let bytes: Vec<u8> = if eight_bit {
                    samples.iter().map(|&s| to_unsigned_8bit(s)).collect()
                } else {
                    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
                };
                sink.write_all(&bytes)?;
            }
        }
        let bytes = samples.len() * usize::from(self.spec.bits_per_sample / 8);
        self.data_len = self.data_len.saturating_add(bytes as u32);
        Ok(())
    }

    /// Patch the size fields for the data written so far and keep appending
    pub fn write_lengths(&mut self) -> WaveResult<()> {
        match &mut self.output {
            Output::Riff(writer) => writer.flush()?,
            Output::Bare(sink) => {
                let end = sink.stream_position()?;
                sink.seek(SeekFrom::Start(BARE_DATA_SIZE_OFFSET))?;
                sink.write_all(&self.data_len.to_le_bytes())?;
                sink.seek(SeekFrom::Start(end))?;
            }
        }
        Ok(())
    }

    /// Patch the sizes and flush the sink
    pub fn close(mut self) -> WaveResult<()> {
        if let Output::Bare(sink) = &mut self.output {
            if self.data_len % 2 == 1 {
                sink.write_all(&[0])?;
            }
        }
        self.write_lengths()?;
        match self.output {
            Output::Riff(writer) => writer.finalize()?,
            Output::Bare(mut sink) => sink.flush()?,
        }
        debug!("WAVE closed: {} data bytes", self.data_len);
        Ok(())
    }
}

fn read_tag<R: Read>(reader: &mut R) -> WaveResult<[u8; 4]> {
    let mut tag = [0u8; 4];
    reader.read_exact(&mut tag)?;
    Ok(tag)
}

fn read_u32_le<R: Read>(reader: &mut R) -> WaveResult<u32> {
    Ok(u32::from_le_bytes(read_tag(reader)?))
}

fn read_u16_le<R: Read>(reader: &mut R) -> WaveResult<u16> {
    let mut bytes = [0u8; 2];
    reader.read_exact(&mut bytes)?;
    Ok(u16::from_le_bytes(bytes))
}

fn skip<R: Read>(reader: &mut R, len: u64) -> WaveResult<()> {
    let skipped = std::io::copy(&mut reader.take(len), &mut std::io::sink())?;
    if skipped < len {
        return Err(WaveError::MissingChunk("data"));
    }
    Ok(())
}

/// Read the format of a WAVE file in either layout.
///
/// Returns the format and the declared data length, leaving `reader` at the
/// first sample byte.
pub fn read_wave_spec<R: Read>(reader: &mut R) -> WaveResult<(WaveSpec, u32)> {
    let tag = read_tag(reader)?;
    if &tag == b"RIFF" {
        let riff = hound::WavReader::new(Cursor::new(tag).chain(&mut *reader))?;
        let spec = riff.spec();
        let data_len = riff.len() * u32::from((spec.bits_per_sample + 7) / 8);
        return Ok((
            WaveSpec::new(spec.sample_rate, spec.bits_per_sample, spec.channels),
            data_len,
        ));
    }
    if &tag != b"WAVE" {
        return Err(WaveError::MissingChunk("WAVE"));
    }

    let mut spec = None;
    loop {
        let id = match read_tag(reader) {
            Ok(id) => id,
            Err(WaveError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(WaveError::MissingChunk("data"));
            }
            Err(e) => return Err(e),
        };
        let len = read_u32_le(reader)?;

        match &id {
            b"fmt " => {
                let _format = read_u16_le(reader)?;
                let channels = read_u16_le(reader)?;
                let sample_rate = read_u32_le(reader)?;
                let _byte_rate = read_u32_le(reader)?;
                let _block_align = read_u16_le(reader)?;
                let bits_per_sample = read_u16_le(reader)?;
                let extra = u64::from(len.saturating_sub(FMT_CHUNK_LEN)) + u64::from(len % 2);
                skip(reader, extra)?;
                spec = Some(WaveSpec::new(sample_rate, bits_per_sample, channels));
            }
            b"data" => {
                return spec
                    .map(|spec| (spec, len))
                    .ok_or(WaveError::MissingChunk("fmt "));
            }
            _ => skip(reader, u64::from(len) + u64::from(len % 2))?,
        }
    }
}

/// `OutputBuffer` that streams every decoded frame into a WAVE file.
///
/// The file header is written when the first frame announces its format.
#[derive(Debug)]
pub struct WaveFileBuffer<W: Write + Seek> {
    sink: Option<W>,
    writer: Option<WaveWriter<W>>,
    bits_per_sample: u16,
    /// Interleaved samples of the current frame
    samples: Vec<i16>,
    /// Next sample index per channel
    write_pos: [usize; 2],
    /// Channels produced by the decoder
    channels: usize,
    /// Copy a mono stream into both file channels
    double_mono_to_stereo: bool,
}

impl<W: Write + Seek> WaveFileBuffer<W> {
    /// 16-bit output
    pub fn new(sink: W) -> Self {
        Self::build(sink, 16)
    }

    /// Output with 8 or 16 bits per sample
    pub fn with_bits_per_sample(sink: W, bits_per_sample: u16) -> WaveResult<Self> {
        validate_bits_per_sample(bits_per_sample)?;
        Ok(Self::build(sink, bits_per_sample))
    }

    fn build(sink: W, bits_per_sample: u16) -> Self {
        Self {
            sink: Some(sink),
            writer: None,
            bits_per_sample,
            samples: Vec::with_capacity(crate::buffer::MAX_FRAME_SAMPLES * 2),
            write_pos: [0, 1],
            channels: 2,
            double_mono_to_stereo: false,
        }
    }

    /// Write mono streams as two identical channels
    pub fn double_mono_to_stereo(mut self, enabled: bool) -> Self {
        self.double_mono_to_stereo = enabled;
        self
    }

    /// Channels in the file for a decoder producing `channels`
    fn file_channels(&self, channels: usize) -> usize {
        if channels == 1 && self.double_mono_to_stereo {
            2
        } else {
            channels
        }
    }

    /// Format of the file, once the first frame has been seen
    pub fn spec(&self) -> Option<WaveSpec> {
        self.writer.as_ref().map(|w| w.spec())
    }

    /// Backpatch the header. Without any decoded frame nothing is written.
    pub fn finish(self) -> DecodeResult<()> {
        if let Some(writer) = self.writer {
            writer.close()?;
        }
        Ok(())
    }
}

impl<W: Write + Seek> OutputBuffer for WaveFileBuffer<W> {
    fn set_format(&mut self, channels: usize, sample_rate: u32) -> DecodeResult<()> {
        let spec = WaveSpec::new(
            sample_rate,
            self.bits_per_sample,
            self.file_channels(channels) as u16,
        );
        match &self.writer {
            Some(writer) if writer.spec() != spec => {
                let current = writer.spec();
                return Err(WaveError::FormatChanged {
                    from_rate: current.sample_rate,
                    from_channels: current.channels,
                    to_rate: spec.sample_rate,
                    to_channels: spec.channels,
                }
                .into());
            }
            Some(_) => {}
            None => {
                spec.validate()?;
                let sink = self.sink.take().ok_or_else(|| {
                    DecoderError::Internal("WAVE buffer lost its sink".to_string())
                })?;
                self.writer = Some(WaveWriter::new(sink, spec)?);
            }
        }
        self.channels = channels;
        Ok(())
    }

    fn append_samples(&mut self, channel: usize, samples: &[f32; SBLIMIT]) {
        if channel >= self.channels {
            return;
        }
        let stride = self.file_channels(self.channels);
        let doubled = stride > self.channels;
        let mut pos = self.write_pos[channel];
        for &sample in samples {
            let value = pcm_to_i16(sample);
            if self.samples.len() < pos + stride {
                self.samples.resize(pos + stride, 0);
            }
            self.samples[pos] = value;
            if doubled {
                self.samples[pos + 1] = value;
            }
            pos += stride;
        }
        self.write_pos[channel] = pos;
    }

    fn clear_buffer(&mut self) {
        self.samples.clear();
        self.write_pos = [0, 1];
    }

    fn write_buffer(&mut self) -> DecodeResult<()> {
        let end = self.write_pos[0].min(self.samples.len());
        if let Some(writer) = self.writer.as_mut() {
            writer.write_data(&self.samples[..end])?;
        }
        self.clear_buffer();
        Ok(())
    }
}

/// Decode a whole stream into a 16-bit WAVE file.
///
/// Returns the decode totals together with the finished sink.
pub fn decode_to_wav<R: Read, W: Write + Seek>(
    source: R,
    mut sink: W,
    config: DecoderConfig,
    max_frames: Option<u64>,
) -> DecodeResult<(DecodeSummary, W)> {
    let mut buffer =
        WaveFileBuffer::new(&mut sink).double_mono_to_stereo(config.double_mono_to_stereo);
    let mut decoder = Decoder::with_config(source, config)?;
    let summary = decoder.decode_all(&mut buffer, max_frames)?;
    buffer.finish()?;
    Ok((summary, sink))
}
