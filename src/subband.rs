//! Subband sample reconstruction for Layer I and Layer II
//!
//! Each of the (up to) 32 subbands of a frame walks through the same steps:
//! bit allocation, scale factor selection (Layer II only), scale factors,
//! then sample data interleaved with `put_next_sample`, which dequantizes,
//! rescales and hands one value per channel to the synthesis filters.
//!
//! The three channel layouts are variants of `SubbandKind`:
//! - `Mono`: one channel of data
//! - `Stereo`: two independently coded channels
//! - `IntensityStereo`: one set of samples shared by both channels, each
//!   channel with its own scale factors (joint stereo above the bound)

use std::io::Read;

use crate::bitstream::BitReader;
use crate::decoder::OutputChannels;
use crate::error::{DecodeResult, DecoderError};
use crate::synthesis::SynthesisFilter;
use crate::tables::{AllocationRow, QuantClass, LAYER1_CLASSES, SCALE_FACTORS};

/// Granules (Layer I samples, Layer II triplets) per subband per frame
pub const GRANULES_PER_FRAME: usize = 12;

/// How allocation codes of a subband are read and interpreted
#[derive(Debug, Clone, Copy)]
pub enum AllocationContext {
    /// 4-bit codes, n > 0 selects n + 1 bits per sample
    Layer1,
    /// `nbal`-bit codes indexing a row of the Layer II allocation table
    Layer2 {
        nbal: u32,
        row: &'static AllocationRow,
    },
}

impl AllocationContext {
    fn is_layer1(&self) -> bool {
        matches!(self, AllocationContext::Layer1)
    }
}

/// Per-channel state of one subband
#[derive(Debug, Clone, Default)]
pub struct ChannelState {
    /// Raw allocation code, 0 = no data this frame
    pub allocation: u32,
    /// Quantization class selected by the allocation code
    pub class: Option<QuantClass>,
    /// Scale factor selection information, Layer II only
    pub scfsi: u8,
    /// Scale factors for the three thirds of the frame
    pub scalefactors: [f32; 3],
    /// Dequantized samples of the current granule (one for Layer I, three for Layer II)
    pub samples: [f32; 3],
}

impl ChannelState {
    fn read_allocation<R: Read>(
        &mut self,
        reader: &mut BitReader<R>,
        context: AllocationContext,
        subband: usize,
    ) -> DecodeResult<()> {
        match context {
            AllocationContext::Layer1 => {
                let code = reader.get_bits(4)?;
                if code == 15 {
                    return Err(DecoderError::InvalidAllocation { subband, value: code });
                }
                self.allocation = code;
                self.class = LAYER1_CLASSES[code as usize];
            }
            AllocationContext::Layer2 { nbal, row } => {
                let code = reader.get_bits(nbal)?;
                let class = row.get(code as usize).copied().ok_or_else(|| {
                    DecoderError::Internal(format!(
                        "allocation code {} outside a {}-bit row in subband {}",
                        code, nbal, subband
                    ))
                })?;
                self.allocation = code;
                self.class = class;
            }
        }
        Ok(())
    }

    fn is_allocated(&self) -> bool {
        self.allocation != 0
    }

    fn read_scalefactor_selection<R: Read>(&mut self, reader: &mut BitReader<R>) -> DecodeResult<()> {
        if self.is_allocated() {
            self.scfsi = reader.get_bits(2)? as u8;
        }
        Ok(())
    }

    fn read_scalefactors<R: Read>(
        &mut self,
        reader: &mut BitReader<R>,
        context: AllocationContext,
    ) -> DecodeResult<()> {
        if !self.is_allocated() {
            return Ok(());
        }
        self.scalefactors = if context.is_layer1() {
            let sf = read_scalefactor(reader)?;
            [sf, sf, sf]
        } else {
            read_scalefactor_triple(reader, self.scfsi)?
        };
        Ok(())
    }

    fn read_samples<R: Read>(
        &mut self,
        reader: &mut BitReader<R>,
        context: AllocationContext,
    ) -> DecodeResult<()> {
        let class = match self.class {
            Some(class) => class,
            None => return Ok(()),
        };

        if context.is_layer1() {
            self.samples[0] = class.dequantize(reader.get_bits(class.code_bits)?);
        } else if class.grouped {
            // Three values packed into one codeword, first sample least significant
            let mut code = reader.get_bits(class.code_bits)?;
            for sample in self.samples.iter_mut() {
                *sample = class.dequantize(code % class.levels);
                code /= class.levels;
            }
        } else {
            for sample in self.samples.iter_mut() {
                *sample = class.dequantize(reader.get_bits(class.code_bits)?);
            }
        }
        Ok(())
    }

    /// Dequantized sample `index` of the current granule, scaled by scale factor `third`
    fn scaled(&self, index: usize, third: usize) -> f32 {
        if self.is_allocated() {
            self.samples[index] * self.scalefactors[third]
        } else {
            0.0
        }
    }
}

fn read_scalefactor<R: Read>(reader: &mut BitReader<R>) -> DecodeResult<f32> {
    Ok(SCALE_FACTORS[reader.get_bits(6)? as usize])
}

/// Read the scale factors of the three thirds of a Layer II frame under `scfsi`
pub fn read_scalefactor_triple<R: Read>(
    reader: &mut BitReader<R>,
    scfsi: u8,
) -> DecodeResult<[f32; 3]> {
    match scfsi {
        0 => {
            let first = read_scalefactor(reader)?;
            let second = read_scalefactor(reader)?;
            let third = read_scalefactor(reader)?;
            Ok([first, second, third])
        }
        1 => {
            let shared = read_scalefactor(reader)?;
            let third = read_scalefactor(reader)?;
            Ok([shared, shared, third])
        }
        2 => {
            let shared = read_scalefactor(reader)?;
            Ok([shared, shared, shared])
        }
        3 => {
            let first = read_scalefactor(reader)?;
            let shared = read_scalefactor(reader)?;
            Ok([first, shared, shared])
        }
        other => Err(DecoderError::Internal(format!(
            "scale factor selection {} out of range",
            other
        ))),
    }
}

/// Channel layout of a subband
#[derive(Debug, Clone)]
pub enum SubbandKind {
    Mono(ChannelState),
    Stereo([ChannelState; 2]),
    IntensityStereo {
        /// Allocation, samples and left-channel scale factors
        shared: ChannelState,
        /// Scale factor selection of the right channel
        right_scfsi: u8,
        /// Right-channel scale factors
        right_scalefactors: [f32; 3],
    },
}

/// Decoder state of one subband for one frame
#[derive(Debug, Clone)]
pub struct Subband {
    /// Frequency slot 0..32
    index: usize,
    context: AllocationContext,
    kind: SubbandKind,
    /// Granules read so far this frame, 0..=12
    granule: usize,
    /// Next sample of the current Layer II triplet
    sample: usize,
}

impl Subband {
    pub fn new(index: usize, context: AllocationContext, kind: SubbandKind) -> Self {
        Self {
            index,
            context,
            kind,
            granule: 0,
            sample: 0,
        }
    }

    pub fn mono(index: usize, context: AllocationContext) -> Self {
        Self::new(index, context, SubbandKind::Mono(ChannelState::default()))
    }

    pub fn stereo(index: usize, context: AllocationContext) -> Self {
        Self::new(index, context, SubbandKind::Stereo(Default::default()))
    }

    pub fn intensity_stereo(index: usize, context: AllocationContext) -> Self {
        Self::new(
            index,
            context,
            SubbandKind::IntensityStereo {
                shared: ChannelState::default(),
                right_scfsi: 0,
                right_scalefactors: [0.0; 3],
            },
        )
    }

    /// Read the allocation code(s). Must happen once per frame before anything else.
    pub fn read_allocation<R: Read>(&mut self, reader: &mut BitReader<R>) -> DecodeResult<()> {
        let (context, index) = (self.context, self.index);
        match &mut self.kind {
            SubbandKind::Mono(channel) => channel.read_allocation(reader, context, index),
            SubbandKind::Stereo(channels) => {
                for channel in channels.iter_mut() {
                    channel.read_allocation(reader, context, index)?;
                }
                Ok(())
            }
            SubbandKind::IntensityStereo { shared, .. } => {
                shared.read_allocation(reader, context, index)
            }
        }
    }

    /// Read the 2-bit scale factor selection of every allocated channel (Layer II only)
    pub fn read_scalefactor_selection<R: Read>(
        &mut self,
        reader: &mut BitReader<R>,
    ) -> DecodeResult<()> {
        if self.context.is_layer1() {
            return Ok(());
        }
        match &mut self.kind {
            SubbandKind::Mono(channel) => channel.read_scalefactor_selection(reader),
            SubbandKind::Stereo(channels) => {
                for channel in channels.iter_mut() {
                    channel.read_scalefactor_selection(reader)?;
                }
                Ok(())
            }
            SubbandKind::IntensityStereo {
                shared,
                right_scfsi,
                ..
            } => {
                if shared.is_allocated() {
                    shared.scfsi = reader.get_bits(2)? as u8;
                    *right_scfsi = reader.get_bits(2)? as u8;
                }
                Ok(())
            }
        }
    }

    /// Read the 6-bit scale factor indices required by the allocation and selection
    pub fn read_scalefactors<R: Read>(&mut self, reader: &mut BitReader<R>) -> DecodeResult<()> {
        let context = self.context;
        match &mut self.kind {
            SubbandKind::Mono(channel) => channel.read_scalefactors(reader, context),
            SubbandKind::Stereo(channels) => {
                for channel in channels.iter_mut() {
                    channel.read_scalefactors(reader, context)?;
                }
                Ok(())
            }
            SubbandKind::IntensityStereo {
                shared,
                right_scfsi,
                right_scalefactors,
            } => {
                if !shared.is_allocated() {
                    return Ok(());
                }
                shared.read_scalefactors(reader, context)?;
                *right_scalefactors = if context.is_layer1() {
                    let sf = read_scalefactor(reader)?;
                    [sf, sf, sf]
                } else {
                    read_scalefactor_triple(reader, *right_scfsi)?
                };
                Ok(())
            }
        }
    }

    /// Read the next granule of sample data.
    /// Returns true when all 12 granules of the frame have been read.
    pub fn read_sample_data<R: Read>(&mut self, reader: &mut BitReader<R>) -> DecodeResult<bool> {
        let context = self.context;
        match &mut self.kind {
            SubbandKind::Mono(channel) => channel.read_samples(reader, context)?,
            SubbandKind::Stereo(channels) => {
                for channel in channels.iter_mut() {
                    channel.read_samples(reader, context)?;
                }
            }
            SubbandKind::IntensityStereo { shared, .. } => shared.read_samples(reader, context)?,
        }

        self.sample = 0;
        self.granule += 1;
        Ok(self.granule == GRANULES_PER_FRAME)
    }

    /// Scale factor slot for the current granule: granules 1-4 use the first,
    /// 5-8 the second, 9-12 the third.
    fn third(&self) -> usize {
        if self.context.is_layer1() || self.granule <= 4 {
            0
        } else if self.granule <= 8 {
            1
        } else {
            2
        }
    }

    /// Left and right values of the next sample, `None` for the right channel of mono
    fn next_values(&self) -> (f32, Option<f32>) {
        let (index, third) = (self.sample, self.third());
        match &self.kind {
            SubbandKind::Mono(channel) => (channel.scaled(index, third), None),
            SubbandKind::Stereo([left, right]) => {
                (left.scaled(index, third), Some(right.scaled(index, third)))
            }
            SubbandKind::IntensityStereo {
                shared,
                right_scalefactors,
                ..
            } => {
                if !shared.is_allocated() {
                    return (0.0, Some(0.0));
                }
                // Both channels share the magnitude, each applies its own scale factor
                let magnitude = shared.samples[index];
                (
                    magnitude * shared.scalefactors[third],
                    Some(magnitude * right_scalefactors[third]),
                )
            }
        }
    }

    /// Dequantize, rescale and route the next sample into the synthesis filters.
    /// Returns true when the current granule is used up.
    pub fn put_next_sample(
        &mut self,
        channels: OutputChannels,
        filters: &mut [SynthesisFilter; 2],
    ) -> bool {
        let (left, right) = self.next_values();

        match right {
            None => filters[0].input_sample(left, self.index),
            Some(right) => match channels {
                OutputChannels::Both => {
                    filters[0].input_sample(left, self.index);
                    filters[1].input_sample(right, self.index);
                }
                OutputChannels::Left => filters[0].input_sample(left, self.index),
                OutputChannels::Right => filters[0].input_sample(right, self.index),
                OutputChannels::Downmix => filters[0].input_sample((left + right) * 0.5, self.index),
            },
        }

        if self.context.is_layer1() {
            return true;
        }
        self.sample += 1;
        self.sample == 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::BitWriter;
    use crate::tables::{Q3, Q7, ALLOC_TABLE_B2B};
    use std::io::Cursor;

    fn reader(bytes: Vec<u8>) -> BitReader<Cursor<Vec<u8>>> {
        BitReader::new(Cursor::new(bytes))
    }

    fn layer2_context(sb: usize) -> AllocationContext {
        let (nbal, row) = ALLOC_TABLE_B2B.band(sb).unwrap();
        AllocationContext::Layer2 { nbal, row }
    }

    /// Bits consumed by the reader so far
    fn bits_read<R: Read>(br: &BitReader<R>) -> u64 {
        if br.bit_offset() == 0 {
            br.bytes_consumed() * 8
        } else {
            (br.bytes_consumed() - 1) * 8 + u64::from(br.bit_offset())
        }
    }

    #[test]
    fn test_zero_allocation_reads_nothing_further() {
        let mut w = BitWriter::new();
        w.put_bits(0, 4); // allocation 0 for subband 0 of table B.2b
        w.put_bits(0b1010_1010, 8); // bits that must not be consumed
        let mut br = reader(w.finish());

        let mut sb = Subband::mono(0, layer2_context(0));
        sb.read_allocation(&mut br).unwrap();
        sb.read_scalefactor_selection(&mut br).unwrap();
        sb.read_scalefactors(&mut br).unwrap();
        assert!(!sb.read_sample_data(&mut br).unwrap());
        assert_eq!(bits_read(&br), 4);

        let mut filters = [SynthesisFilter::new(), SynthesisFilter::new()];
        for _ in 0..3 {
            sb.put_next_sample(OutputChannels::Both, &mut filters);
        }
        assert!(filters[0].pending_samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_scfsi_patterns() {
        let cases: [(u8, [u32; 3], usize); 4] = [
            (0, [10, 20, 30], 3),
            (1, [10, 10, 30], 2),
            (2, [10, 10, 10], 1),
            (3, [10, 30, 30], 2),
        ];

        for (scfsi, expected, reads) in cases {
            let mut w = BitWriter::new();
            let distinct: Vec<u32> = match scfsi {
                0 => vec![10, 20, 30],
                1 => vec![10, 30],
                2 => vec![10],
                _ => vec![10, 30],
            };
            for index in &distinct {
                w.put_bits(*index, 6);
            }
            let mut br = reader(w.finish());

            let factors = read_scalefactor_triple(&mut br, scfsi).unwrap();
            assert_eq!(bits_read(&br), 6 * reads as u64, "scfsi {}", scfsi);
            for third in 0..3 {
                assert_eq!(factors[third], SCALE_FACTORS[expected[third] as usize]);
            }
        }
    }

    #[test]
    fn test_scfsi_out_of_range_is_fatal() {
        let mut br = reader(vec![0xFF; 4]);
        let err = read_scalefactor_triple(&mut br, 4).unwrap_err();
        assert!(matches!(err, DecoderError::Internal(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_layer1_forbidden_allocation() {
        let mut br = reader(vec![0xF0]);
        let mut sb = Subband::mono(5, AllocationContext::Layer1);
        let err = sb.read_allocation(&mut br).unwrap_err();
        assert!(matches!(err, DecoderError::InvalidAllocation { subband: 5, value: 15 }));
    }

    #[test]
    fn test_layer1_sample_per_granule() {
        let mut w = BitWriter::new();
        w.put_bits(2, 4); // 3 bits per sample, 7 levels
        w.put_bits(3, 6); // scale factor 1.0
        for _ in 0..GRANULES_PER_FRAME {
            w.put_bits(0b111 - 1, 3); // highest legal code
        }
        let mut br = reader(w.finish());

        let mut sb = Subband::mono(0, AllocationContext::Layer1);
        sb.read_allocation(&mut br).unwrap();
        sb.read_scalefactors(&mut br).unwrap();

        let mut filters = [SynthesisFilter::new(), SynthesisFilter::new()];
        let expected = Q7.dequantize(6);
        for granule in 1..=GRANULES_PER_FRAME {
            let done = sb.read_sample_data(&mut br).unwrap();
            assert_eq!(done, granule == GRANULES_PER_FRAME);
            assert!(sb.put_next_sample(OutputChannels::Both, &mut filters));
            assert_eq!(filters[0].pending_samples()[0], expected);
        }
    }

    #[test]
    fn test_grouped_triplet_order() {
        let mut w = BitWriter::new();
        w.put_bits(1, 4); // class Q3 in subband 0 of table B.2b
        w.put_bits(2, 2); // one scale factor for the frame
        w.put_bits(3, 6); // scale factor 1.0
        // v0 = 2, v1 = 0, v2 = 1  =>  code = 2 + 0 * 3 + 1 * 9
        w.put_bits(11, 5);
        let mut br = reader(w.finish());

        let mut sb = Subband::mono(0, layer2_context(0));
        sb.read_allocation(&mut br).unwrap();
        sb.read_scalefactor_selection(&mut br).unwrap();
        sb.read_scalefactors(&mut br).unwrap();
        sb.read_sample_data(&mut br).unwrap();

        let mut filters = [SynthesisFilter::new(), SynthesisFilter::new()];
        let mut seen = Vec::new();
        for step in 0..3 {
            let done = sb.put_next_sample(OutputChannels::Both, &mut filters);
            assert_eq!(done, step == 2);
            seen.push(filters[0].pending_samples()[0]);
        }
        assert_eq!(seen, vec![Q3.dequantize(2), Q3.dequantize(0), Q3.dequantize(1)]);
    }

    #[test]
    fn test_stereo_routing() {
        let mut w = BitWriter::new();
        w.put_bits(2, 4); // left: 7 levels
        w.put_bits(2, 4); // right: 7 levels
        w.put_bits(2, 2);
        w.put_bits(2, 2);
        w.put_bits(3, 6); // left scale factor 1.0
        w.put_bits(6, 6); // right scale factor 0.5
        for _ in 0..3 {
            w.put_bits(6, 3);
        }
        for _ in 0..3 {
            w.put_bits(0, 3);
        }
        let bytes = w.finish();

        let left = Q7.dequantize(6);
        let right = Q7.dequantize(0) * 0.5;

        for (channels, first, second) in [
            (OutputChannels::Both, left, Some(right)),
            (OutputChannels::Left, left, None),
            (OutputChannels::Right, right, None),
            (OutputChannels::Downmix, (left + right) * 0.5, None),
        ] {
            let mut br = reader(bytes.clone());
            let mut sb = Subband::stereo(0, layer2_context(0));
            sb.read_allocation(&mut br).unwrap();
            sb.read_scalefactor_selection(&mut br).unwrap();
            sb.read_scalefactors(&mut br).unwrap();
            sb.read_sample_data(&mut br).unwrap();

            let mut filters = [SynthesisFilter::new(), SynthesisFilter::new()];
            sb.put_next_sample(channels, &mut filters);
            assert_eq!(filters[0].pending_samples()[0], first);
            if let Some(second) = second {
                assert_eq!(filters[1].pending_samples()[0], second);
            } else {
                assert_eq!(filters[1].pending_samples()[0], 0.0);
            }
        }
    }

    #[test]
    fn test_intensity_stereo_scalefactor_selection_per_channel() {
        let mut w = BitWriter::new();
        w.put_bits(2, 4); // shared allocation: 7 levels
        w.put_bits(0, 2); // left: three scale factors
        w.put_bits(2, 2); // right: one scale factor
        for index in [3, 6, 9] {
            w.put_bits(index, 6);
        }
        w.put_bits(6, 6);
        for _ in 0..GRANULES_PER_FRAME * 3 {
            w.put_bits(6, 3);
        }
        let mut br = reader(w.finish());

        let mut sb = Subband::intensity_stereo(0, layer2_context(0));
        sb.read_allocation(&mut br).unwrap();
        assert_eq!(bits_read(&br), 4);
        sb.read_scalefactor_selection(&mut br).unwrap();
        assert_eq!(bits_read(&br), 4 + 2 + 2);
        sb.read_scalefactors(&mut br).unwrap();
        assert_eq!(bits_read(&br), 8 + 3 * 6 + 6);

        let magnitude = Q7.dequantize(6);
        let mut filters = [SynthesisFilter::new(), SynthesisFilter::new()];
        let mut left_per_third = Vec::new();
        for granule in 1..=GRANULES_PER_FRAME {
            sb.read_sample_data(&mut br).unwrap();
            let third = (granule - 1) / 4;
            let left = magnitude * SCALE_FACTORS[[3, 6, 9][third]];
            let right = magnitude * SCALE_FACTORS[6];
            for _ in 0..3 {
                sb.put_next_sample(OutputChannels::Both, &mut filters);
                assert_eq!(filters[0].pending_samples()[0], left, "granule {}", granule);
                assert_eq!(filters[1].pending_samples()[0], right, "granule {}", granule);
            }
            if granule % 4 == 1 {
                left_per_third.push(left);
            }
        }
        assert_eq!(bits_read(&br), 32 + (GRANULES_PER_FRAME * 9) as u64);
        assert!(left_per_third[0] > left_per_third[1]);
        assert!(left_per_third[1] > left_per_third[2]);
    }
}
