//! Frame decoder
//!
//! `Decoder` pulls bytes from any `Read` source, finds the next frame header,
//! reads the side information and sample data of a Layer I or Layer II frame
//! through the subband decoders and runs the synthesis filters, handing the
//! PCM of every pass to an `OutputBuffer`.
//!
//! Decoding is pull-based: each `decode_frame` call decodes exactly one
//! frame. Recoverable errors leave the reader positioned after the bad frame,
//! so the caller can simply call `decode_frame` again.

use std::io::Read;

use log::{debug, trace, warn};

use crate::bitstream::BitReader;
use crate::buffer::OutputBuffer;
use crate::crc::Crc16;
use crate::error::{DecodeResult, DecoderError};
use crate::header::{is_sync_word, FrameHeader, Layer, HEADER_LEN};
use crate::subband::{AllocationContext, Subband};
use crate::synthesis::{Equalizer, SynthesisFilter};
#[cfg(feature = "diagnostics")]
use crate::diagnostics::{DecodeTrace, FrameRecord};

/// Which channels of a stereo stream reach the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputChannels {
    /// Both channels, interleaved
    #[default]
    Both,
    /// Left channel only, as mono
    Left,
    /// Right channel only, as mono
    Right,
    /// Average of both channels, as mono
    Downmix,
}

impl OutputChannels {
    /// Channels produced for a stream with `source` channels
    pub fn output_count(self, source: usize) -> usize {
        if source == 2 && self == OutputChannels::Both {
            2
        } else {
            1
        }
    }
}

/// Decoder configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderConfig {
    /// Channel routing for stereo streams
    pub output_channels: OutputChannels,
    /// Copy mono output into both channels of the output buffer
    pub double_mono_to_stereo: bool,
    /// Check the CRC-16 of protected frames
    pub verify_crc: bool,
    /// Per-subband gain
    pub equalizer: Equalizer,
    /// Give up after skipping this many bytes while looking for a header
    pub max_resync_bytes: Option<usize>,
    /// Accept a header only if the next frame's header follows it and, once
    /// a frame was decoded, only with the same version, layer and sample rate
    pub strict_sync: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            output_channels: OutputChannels::Both,
            double_mono_to_stereo: false,
            verify_crc: true,
            equalizer: Equalizer::flat(),
            max_resync_bytes: None,
            strict_sync: false,
        }
    }
}

impl DecoderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output_channels(mut self, channels: OutputChannels) -> Self {
        self.output_channels = channels;
        self
    }

    pub fn double_mono_to_stereo(mut self, enabled: bool) -> Self {
        self.double_mono_to_stereo = enabled;
        self
    }

    pub fn verify_crc(mut self, enabled: bool) -> Self {
        self.verify_crc = enabled;
        self
    }

    pub fn equalizer(mut self, equalizer: Equalizer) -> Self {
        self.equalizer = equalizer;
        self
    }

    pub fn max_resync_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_resync_bytes = limit;
        self
    }

    pub fn strict_sync(mut self, enabled: bool) -> Self {
        self.strict_sync = enabled;
        self
    }

    /// Reject gain factors the synthesis filter cannot use
    pub fn validate(&self) -> DecodeResult<()> {
        for (band, &factor) in self.equalizer.factors().iter().enumerate() {
            if !factor.is_finite() || factor < 0.0 {
                return Err(DecoderError::InvalidConfig(format!(
                    "equalizer band {} has factor {}",
                    band, factor
                )));
            }
        }
        Ok(())
    }
}

/// Totals of a `decode_all` run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecodeSummary {
    pub frames_decoded: u64,
    /// Frames dropped after a recoverable error
    pub frames_skipped: u64,
    /// Sample rate of the last decoded frame
    pub sample_rate: u32,
    /// Output channels of the last decoded frame
    pub channels: usize,
    pub samples_per_channel: u64,
    pub bytes_consumed: u64,
}

impl DecodeSummary {
    /// Decoded audio length in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples_per_channel as f64 / f64::from(self.sample_rate)
    }
}

/// A located frame header
#[derive(Debug, Clone, Copy)]
struct SyncedHeader {
    header: FrameHeader,
    word: u32,
    /// Stream offset of the first header byte
    offset: u64,
    /// Bytes skipped before the header
    skipped: usize,
}

/// MPEG audio Layer I/II decoder
#[derive(Debug)]
pub struct Decoder<R: Read> {
    reader: BitReader<R>,
    config: DecoderConfig,
    /// Left and right synthesis filters, kept across frames
    filters: [SynthesisFilter; 2],
    last_header: Option<FrameHeader>,
    frames_decoded: u64,
    /// Largest absolute PCM value of the last decoded frame
    last_peak: f32,
    #[cfg(feature = "diagnostics")]
    trace: Option<DecodeTrace>,
}

impl<R: Read> Decoder<R> {
    /// Decoder with the default configuration
    pub fn new(source: R) -> Self {
        Self::build(source, DecoderConfig::default())
    }

    pub fn with_config(source: R, config: DecoderConfig) -> DecodeResult<Self> {
        config.validate()?;
        Ok(Self::build(source, config))
    }

    fn build(source: R, config: DecoderConfig) -> Self {
        let filters = [
            SynthesisFilter::with_equalizer(&config.equalizer),
            SynthesisFilter::with_equalizer(&config.equalizer),
        ];
        Self {
            reader: BitReader::new(source),
            config,
            filters,
            last_header: None,
            frames_decoded: 0,
            last_peak: 0.0,
            #[cfg(feature = "diagnostics")]
            trace: None,
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Header of the last successfully decoded frame
    pub fn last_header(&self) -> Option<&FrameHeader> {
        self.last_header.as_ref()
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    pub fn last_peak(&self) -> f32 {
        self.last_peak
    }

    /// Bytes taken from the source so far
    pub fn bytes_consumed(&self) -> u64 {
        self.reader.bytes_consumed()
    }

    /// Channels in the PCM produced for frames with this header
    pub fn output_channels_for(&self, header: &FrameHeader) -> usize {
        self.config.output_channels.output_count(header.channels())
    }

    /// Change the per-subband gain of both filters
    pub fn set_equalizer(&mut self, equalizer: Equalizer) -> DecodeResult<()> {
        let config = self.config.clone().equalizer(equalizer);
        config.validate()?;
        for filter in self.filters.iter_mut() {
            filter.set_equalizer(&config.equalizer);
        }
        self.config = config;
        Ok(())
    }

    /// Give back the byte source
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    /// Decode the next frame into `output`.
    ///
    /// Returns the frame header on success and `EndOfStream` once the source
    /// is exhausted. Errors for which `is_recoverable()` holds only affect the
    /// current frame.
    pub fn decode_frame<B: OutputBuffer + ?Sized>(
        &mut self,
        output: &mut B,
    ) -> DecodeResult<FrameHeader> {
        let synced = self.sync()?;
        let header = synced.header;

        self.reader.begin_frame(header.body_length());
        match self.decode_body(&synced, output) {
            Ok(()) => {
                let skipped = self.reader.end_frame()?;
                if skipped > 0 {
                    trace!("skipped {} bytes of ancillary data", skipped);
                }
            }
            Err(e) if e.is_recoverable() => {
                warn!("frame at byte {} skipped: {}", synced.offset, e);
                self.reader.end_crc();
                self.reader.end_frame()?;
                return Err(e);
            }
            Err(e) => {
                self.reader.end_crc();
                self.reader.abandon_frame();
                return Err(e);
            }
        }

        debug!(
            "frame {} at byte {} ({} bytes skipped): {}",
            self.frames_decoded, synced.offset, synced.skipped, header
        );
        self.record_frame(&synced);

        self.frames_decoded += 1;
        self.last_header = Some(header);
        Ok(header)
    }

    /// Decode frames until the end of the stream, or until `max_frames`
    /// frames have been decoded. Recoverable errors skip the frame.
    pub fn decode_all<B: OutputBuffer + ?Sized>(
        &mut self,
        output: &mut B,
        max_frames: Option<u64>,
    ) -> DecodeResult<DecodeSummary> {
        let mut summary = DecodeSummary::default();
        while max_frames.map_or(true, |max| summary.frames_decoded < max) {
            match self.decode_frame(output) {
                Ok(header) => {
                    summary.frames_decoded += 1;
                    summary.sample_rate = header.sample_rate();
                    summary.channels = self.output_channels_for(&header);
                    summary.samples_per_channel += header.samples_per_frame() as u64;
                }
                Err(e) if e.is_recoverable() => summary.frames_skipped += 1,
                Err(e) if e.is_end_of_stream() => break,
                Err(e) => return Err(e),
            }
        }
        summary.bytes_consumed = self.bytes_consumed();
        Ok(summary)
    }

    /// Slide a 32-bit window over the stream until it holds a valid header
    fn sync(&mut self) -> DecodeResult<SyncedHeader> {
        let mut word = 0u32;
        let mut filled = 0;
        let mut skipped = 0usize;

        loop {
            let byte = self.reader.read_byte()?;
            word = (word << 8) | u32::from(byte);
            if filled < HEADER_LEN {
                filled += 1;
            } else {
                skipped += 1;
            }

            if filled == HEADER_LEN && is_sync_word(word) {
                match FrameHeader::parse(word) {
                    Ok(header) if self.config.strict_sync && !self.confirm_header(header)? => {
                        trace!("header candidate 0x{:08X} not confirmed", word);
                    }
                    Ok(header) => {
                        if skipped > 0 {
                            warn!("skipped {} bytes to find the next frame header", skipped);
                        }
                        return Ok(SyncedHeader {
                            header,
                            word,
                            offset: self.reader.bytes_consumed() - HEADER_LEN as u64,
                            skipped,
                        });
                    }
                    Err(e) => trace!("rejected header candidate 0x{:08X}: {}", word, e),
                }
            }

            if let Some(limit) = self.config.max_resync_bytes {
                if skipped > limit {
                    warn!("no frame header within {} bytes, giving up", limit);
                    return Err(DecoderError::EndOfStream);
                }
            }
        }
    }

    /// Strict sync check of a header just read: it belongs to the locked
    /// stream and the next header follows at the end of its frame. A frame
    /// running into the end of the source counts as confirmed.
    fn confirm_header(&mut self, header: FrameHeader) -> DecodeResult<bool> {
        if let Some(locked) = self.last_header.as_ref() {
            if !header.same_stream(locked) {
                return Ok(false);
            }
        }
        let next = match self.reader.peek_bytes(header.body_length(), HEADER_LEN)? {
            Some(bytes) => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            None => return Ok(true),
        };
        Ok(FrameHeader::parse(next).map_or(false, |next| next.same_stream(&header)))
    }

    fn decode_body<B: OutputBuffer + ?Sized>(
        &mut self,
        synced: &SyncedHeader,
        output: &mut B,
    ) -> DecodeResult<()> {
        let header = &synced.header;
        if header.layer == Layer::Layer3 {
            return Err(DecoderError::UnsupportedLayer(header.layer));
        }

        let crc_word = if header.has_crc {
            Some(self.reader.get_bits(16)? as u16)
        } else {
            None
        };
        if crc_word.is_some() && self.config.verify_crc {
            self.reader.begin_crc(Crc16::for_header(synced.word));
        }

        let mut subbands = self.build_subbands(header)?;
        for subband in subbands.iter_mut() {
            subband.read_allocation(&mut self.reader)?;
        }
        for subband in subbands.iter_mut() {
            subband.read_scalefactor_selection(&mut self.reader)?;
        }

        if let (Some(expected), Some(computed)) = (crc_word, self.reader.end_crc()) {
            if expected != computed {
                return Err(DecoderError::CrcMismatch { expected, computed });
            }
        }

        for subband in subbands.iter_mut() {
            subband.read_scalefactors(&mut self.reader)?;
        }
        trace!(
            "side information read: {} subbands, intensity bound {}",
            subbands.len(),
            header.intensity_bound()
        );

        let channels = self.output_channels_for(header);
        output.set_format(channels, header.sample_rate())?;
        output.clear_buffer();
        self.last_peak = 0.0;

        let routing = self.config.output_channels;
        loop {
            let mut read_ready = false;
            for subband in subbands.iter_mut() {
                read_ready = subband.read_sample_data(&mut self.reader)?;
            }

            loop {
                let mut write_ready = false;
                for subband in subbands.iter_mut() {
                    write_ready = subband.put_next_sample(routing, &mut self.filters);
                }
                self.synthesize(output, channels);
                if write_ready {
                    break;
                }
            }

            if read_ready {
                break;
            }
        }

        output.write_buffer()
    }

    /// One subband decoder per coded subband, chosen by channel mode and bound
    fn build_subbands(&self, header: &FrameHeader) -> DecodeResult<Vec<Subband>> {
        let limit = header.subband_limit();
        let bound = header.intensity_bound().min(limit);
        let table = header.allocation_table();

        (0..limit)
            .map(|sb| {
                let context = match header.layer {
                    Layer::Layer1 => AllocationContext::Layer1,
                    _ => {
                        let (nbal, row) = table.band(sb).ok_or_else(|| {
                            DecoderError::Internal(format!(
                                "subband {} beyond allocation table limit {}",
                                sb, table.sblimit
                            ))
                        })?;
                        AllocationContext::Layer2 { nbal, row }
                    }
                };
                Ok(if header.channels() == 1 {
                    Subband::mono(sb, context)
                } else if sb < bound {
                    Subband::stereo(sb, context)
                } else {
                    Subband::intensity_stereo(sb, context)
                })
            })
            .collect()
    }

    fn synthesize<B: OutputBuffer + ?Sized>(&mut self, output: &mut B, channels: usize) {
        for (channel, filter) in self.filters.iter_mut().enumerate().take(channels) {
            let pcm = filter.calculate_pcm_samples();
            for &sample in pcm.iter() {
                self.last_peak = self.last_peak.max(sample.abs());
            }
            output.append_samples(channel, &pcm);
        }
    }
}

#[cfg(not(feature = "diagnostics"))]
impl<R: Read> Decoder<R> {
    fn record_frame(&mut self, _synced: &SyncedHeader) {}
}

#[cfg(feature = "diagnostics")]
impl<R: Read> Decoder<R> {
    fn record_frame(&mut self, synced: &SyncedHeader) {
        if let Some(trace) = self.trace.as_mut() {
            trace.record(FrameRecord::new(
                self.frames_decoded,
                synced.offset,
                &synced.header,
                synced.skipped,
                self.last_peak,
            ));
        }
    }

    /// Start recording one `FrameRecord` per decoded frame
    pub fn enable_trace(&mut self) {
        if self.trace.is_none() {
            self.trace = Some(DecodeTrace::new());
        }
    }

    pub fn trace(&self) -> Option<&DecodeTrace> {
        self.trace.as_ref()
    }

    pub fn take_trace(&mut self) -> Option<DecodeTrace> {
        self.trace.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::BitWriter;
    use crate::buffer::Buffer16BitStereo;
    use std::io::Cursor;

    /// MPEG-1 Layer II, 192 kbps, 44.1 kHz, stereo, no CRC: 626-byte frames, sblimit 30
    const STEREO_L2: u32 = 0xFFFD_A004;

    fn silent_frame(word: u32) -> Vec<u8> {
        let header = FrameHeader::parse(word).unwrap();
        let mut w = BitWriter::new();
        w.put_bits(word, 32);
        w.pad_to(header.frame_length());
        w.finish()
    }

    #[test]
    fn test_config_builder_and_validation() {
        let config = DecoderConfig::new()
            .output_channels(OutputChannels::Downmix)
            .double_mono_to_stereo(true)
            .verify_crc(false)
            .max_resync_bytes(Some(64));
        assert_eq!(config.output_channels, OutputChannels::Downmix);
        assert!(config.double_mono_to_stereo);
        assert!(!config.verify_crc);
        assert!(config.validate().is_ok());

        let mut eq = Equalizer::flat();
        eq.set_factor(4, f32::NAN);
        let bad = DecoderConfig::new().equalizer(eq);
        assert!(matches!(bad.validate(), Err(DecoderError::InvalidConfig(_))));
        assert!(Decoder::with_config(Cursor::new(Vec::new()), bad).is_err());

        let mut eq = Equalizer::flat();
        eq.set_factor(0, -1.0);
        assert!(DecoderConfig::new().equalizer(eq).validate().is_err());
    }

    #[test]
    fn test_output_channel_count() {
        assert_eq!(OutputChannels::Both.output_count(2), 2);
        assert_eq!(OutputChannels::Both.output_count(1), 1);
        assert_eq!(OutputChannels::Left.output_count(2), 1);
        assert_eq!(OutputChannels::Downmix.output_count(2), 1);
    }

    #[test]
    fn test_silent_frame_decodes_to_zero() {
        let mut decoder = Decoder::new(Cursor::new(silent_frame(STEREO_L2)));
        let mut buffer = Buffer16BitStereo::default();

        let header = decoder.decode_frame(&mut buffer).unwrap();
        assert_eq!(header.layer, Layer::Layer2);
        assert_eq!(decoder.frames_decoded(), 1);
        assert_eq!(decoder.bytes_consumed(), 626);

        let samples = buffer.drain_samples();
        assert_eq!(samples.len(), 1152 * 2);
        assert!(samples.iter().all(|&s| s == 0));

        assert!(matches!(
            decoder.decode_frame(&mut buffer),
            Err(DecoderError::EndOfStream)
        ));
    }

    #[test]
    fn test_strict_sync_rejects_false_header() {
        // A stray header word in front of two real frames
        let mut stream = STEREO_L2.to_be_bytes().to_vec();
        stream.extend([0u8; 40]);
        stream.extend(silent_frame(STEREO_L2));
        stream.extend(silent_frame(STEREO_L2));

        // The stray header is decoded and swallows the first real one
        let mut decoder = Decoder::new(Cursor::new(stream.clone()));
        let mut buffer = Buffer16BitStereo::default();
        decoder.decode_frame(&mut buffer).unwrap();
        assert_eq!(decoder.bytes_consumed(), 626);

        let config = DecoderConfig::new().strict_sync(true);
        let mut decoder = Decoder::with_config(Cursor::new(stream), config).unwrap();
        decoder.decode_frame(&mut buffer).unwrap();
        assert_eq!(decoder.bytes_consumed(), 44 + 626);
        // The last frame runs into the end of the stream and is still accepted
        decoder.decode_frame(&mut buffer).unwrap();
        assert_eq!(decoder.frames_decoded(), 2);
        assert!(decoder.decode_frame(&mut buffer).unwrap_err().is_end_of_stream());
    }

    #[test]
    fn test_strict_sync_locks_to_stream() {
        // A Layer I frame after two Layer II frames
        let mut stream = silent_frame(STEREO_L2);
        stream.extend(silent_frame(STEREO_L2));
        stream.extend(silent_frame(0xFFFF_40C0));

        let config = DecoderConfig::new().strict_sync(true);
        let mut decoder = Decoder::with_config(Cursor::new(stream.clone()), config).unwrap();
        let mut buffer = Buffer16BitStereo::default();
        decoder.decode_frame(&mut buffer).unwrap();
        // The second frame is followed by a foreign header, the third is not
        // the locked layer
        assert!(decoder.decode_frame(&mut buffer).unwrap_err().is_end_of_stream());
        assert_eq!(decoder.frames_decoded(), 1);
        assert_eq!(decoder.last_header().map(|h| h.layer), Some(Layer::Layer2));

        let mut decoder = Decoder::new(Cursor::new(stream));
        for _ in 0..3 {
            decoder.decode_frame(&mut buffer).unwrap();
        }
        assert_eq!(decoder.frames_decoded(), 3);
    }

    #[test]
    fn test_resync_skips_garbage() {
        let mut stream = vec![0x00, 0x12, 0xFF, 0xFF, 0xFF];
        stream.extend(silent_frame(STEREO_L2));

        let mut decoder = Decoder::new(Cursor::new(stream));
        let mut buffer = Buffer16BitStereo::default();
        decoder.decode_frame(&mut buffer).unwrap();
        assert_eq!(decoder.frames_decoded(), 1);
        assert_eq!(buffer.available(), 1152 * 4);
    }

    #[test]
    fn test_resync_limit() {
        let mut stream = vec![0u8; 100];
        stream.extend(silent_frame(STEREO_L2));

        let config = DecoderConfig::new().max_resync_bytes(Some(10));
        let mut decoder = Decoder::with_config(Cursor::new(stream), config).unwrap();
        let mut buffer = Buffer16BitStereo::default();
        assert!(decoder.decode_frame(&mut buffer).unwrap_err().is_end_of_stream());
    }

    #[test]
    fn test_layer3_frames_are_skipped() {
        // MPEG-1 Layer III, 128 kbps, 44.1 kHz, stereo: 417 bytes
        let layer3 = 0xFFFB_9004;
        let mut stream = silent_frame(layer3);
        assert_eq!(stream.len(), 417);
        stream.extend(silent_frame(STEREO_L2));

        let mut decoder = Decoder::new(Cursor::new(stream));
        let mut buffer = Buffer16BitStereo::default();
        let err = decoder.decode_frame(&mut buffer).unwrap_err();
        assert!(matches!(err, DecoderError::UnsupportedLayer(Layer::Layer3)));
        assert!(err.is_recoverable());

        decoder.decode_frame(&mut buffer).unwrap();
        assert_eq!(decoder.frames_decoded(), 1);
    }

    #[test]
    fn test_mono_routing_produces_mono_output() {
        let config = DecoderConfig::new().output_channels(OutputChannels::Left);
        let mut decoder = Decoder::with_config(Cursor::new(silent_frame(STEREO_L2)), config).unwrap();
        let mut buffer = Buffer16BitStereo::default();
        let header = decoder.decode_frame(&mut buffer).unwrap();

        assert_eq!(decoder.output_channels_for(&header), 1);
        assert_eq!(buffer.output_channels(), 1);
        assert_eq!(buffer.drain_samples().len(), 1152);
    }

    #[test]
    fn test_decode_all_counts_frames() {
        let mut stream = silent_frame(STEREO_L2);
        stream.extend(silent_frame(0xFFFB_9004));
        stream.extend(silent_frame(STEREO_L2));
        stream.extend(silent_frame(STEREO_L2));

        let mut decoder = Decoder::new(Cursor::new(stream.clone()));
        let mut buffer = Buffer16BitStereo::default();
        let summary = decoder.decode_all(&mut buffer, None).unwrap();
        assert_eq!(summary.frames_decoded, 3);
        assert_eq!(summary.frames_skipped, 1);
        assert_eq!(summary.sample_rate, 44100);
        assert_eq!(summary.channels, 2);
        assert_eq!(summary.samples_per_channel, 3 * 1152);
        assert_eq!(summary.bytes_consumed, stream.len() as u64);
        assert!((summary.duration_secs() - 3456.0 / 44100.0).abs() < 1e-9);

        let mut decoder = Decoder::new(Cursor::new(stream));
        let summary = decoder.decode_all(&mut buffer, Some(1)).unwrap();
        assert_eq!(summary.frames_decoded, 1);
        assert_eq!(summary.bytes_consumed, 626);
    }
}
