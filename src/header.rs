//! MPEG audio frame header parsing
//!
//! The 32-bit header is laid out as
//!
//! ```text
//! AAAAAAAA AAABBCCD EEEEFFGH IIJJKLMM
//! A sync (11 bits)   B version   C layer      D protection (0 = CRC present)
//! E bitrate index    F sample-rate index      G padding    H private
//! I channel mode     J mode extension         K copyright  L original
//! M emphasis
//! ```

use std::fmt;
use std::io::Read;

use crate::bitstream::BitReader;
use crate::error::{DecodeResult, HeaderError, HeaderResult};
use crate::tables::{
    ALLOC_TABLE_B2A, ALLOC_TABLE_B2B, ALLOC_TABLE_B2C, ALLOC_TABLE_B2D, ALLOC_TABLE_LSF,
    AllocationTable, BITRATES_LSF_L1, BITRATES_LSF_L23, BITRATES_MPEG1_L1, BITRATES_MPEG1_L2,
    BITRATES_MPEG1_L3, SAMPLE_RATES, SBLIMIT,
};

/// Length of the frame header in bytes
pub const HEADER_LEN: usize = 4;

/// Mask of the 11-bit sync pattern in a header word
pub const SYNC_MASK: u32 = 0xFFE0_0000;

/// MPEG version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    /// MPEG-1 (ISO/IEC 11172-3)
    Mpeg1,
    /// MPEG-2 low sampling frequencies (ISO/IEC 13818-3)
    Mpeg2,
    /// MPEG-2.5 unofficial extension
    Mpeg2p5,
}

impl MpegVersion {
    /// Row of the sample-rate table
    fn family(self) -> usize {
        match self {
            MpegVersion::Mpeg1 => 0,
            MpegVersion::Mpeg2 => 1,
            MpegVersion::Mpeg2p5 => 2,
        }
    }

    /// Whether this version uses the low sampling frequency tables
    pub fn is_lsf(self) -> bool {
        self != MpegVersion::Mpeg1
    }
}

/// Audio layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Layer1,
    Layer2,
    Layer3,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Layer1 => write!(f, "Layer I"),
            Layer::Layer2 => write!(f, "Layer II"),
            Layer::Layer3 => write!(f, "Layer III"),
        }
    }
}

/// Channel mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo,
    /// Intensity stereo above the bound given by the mode extension
    JointStereo,
    DualChannel,
    SingleChannel,
}

/// De-emphasis to apply after decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    None,
    /// 50/15 microseconds
    Ms50_15,
    Reserved,
    /// CCITT J.17
    CcittJ17,
}

/// A parsed frame header. Immutable once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub layer: Layer,
    /// A CRC-16 word follows the header
    pub has_crc: bool,
    pub bitrate_index: u8,
    pub sample_rate_index: u8,
    pub padding: bool,
    pub private: bool,
    pub mode: ChannelMode,
    pub mode_extension: u8,
    pub copyright: bool,
    pub original: bool,
    pub emphasis: Emphasis,
}

/// Quick check that a header word starts with the sync pattern
#[inline]
pub fn is_sync_word(word: u32) -> bool {
    word & SYNC_MASK == SYNC_MASK
}

impl FrameHeader {
    /// Parse a 32-bit header word
    pub fn parse(word: u32) -> HeaderResult<Self> {
        if !is_sync_word(word) {
            return Err(HeaderError::BadSync(word));
        }

        let version = match (word >> 19) & 0x3 {
            0b00 => MpegVersion::Mpeg2p5,
            0b10 => MpegVersion::Mpeg2,
            0b11 => MpegVersion::Mpeg1,
            _ => return Err(HeaderError::ReservedVersion),
        };

        let layer = match (word >> 17) & 0x3 {
            0b01 => Layer::Layer3,
            0b10 => Layer::Layer2,
            0b11 => Layer::Layer1,
            _ => return Err(HeaderError::ReservedLayer),
        };

        let bitrate_index = ((word >> 12) & 0xF) as u8;
        match bitrate_index {
            0 => return Err(HeaderError::FreeFormat),
            15 => return Err(HeaderError::BadBitrate(bitrate_index)),
            _ => {}
        }

        let sample_rate_index = ((word >> 10) & 0x3) as u8;
        if sample_rate_index == 3 {
            return Err(HeaderError::ReservedSampleRate);
        }

        let mode = match (word >> 6) & 0x3 {
            0b00 => ChannelMode::Stereo,
            0b01 => ChannelMode::JointStereo,
            0b10 => ChannelMode::DualChannel,
            _ => ChannelMode::SingleChannel,
        };

        let emphasis = match word & 0x3 {
            0b00 => Emphasis::None,
            0b01 => Emphasis::Ms50_15,
            0b10 => Emphasis::Reserved,
            _ => Emphasis::CcittJ17,
        };

        Ok(Self {
            version,
            layer,
            has_crc: (word >> 16) & 0x1 == 0,
            bitrate_index,
            sample_rate_index,
            padding: (word >> 9) & 0x1 == 1,
            private: (word >> 8) & 0x1 == 1,
            mode,
            mode_extension: ((word >> 4) & 0x3) as u8,
            copyright: (word >> 3) & 0x1 == 1,
            original: (word >> 2) & 0x1 == 1,
            emphasis,
        })
    }

    /// Read 32 bits from `reader` and parse them as a header
    pub fn read<R: Read>(reader: &mut BitReader<R>) -> DecodeResult<Self> {
        let word = reader.get_bits(32)?;
        Ok(Self::parse(word)?)
    }

    /// Bitrate in kbps
    pub fn bitrate_kbps(&self) -> u32 {
        let index = self.bitrate_index as usize;
        match (self.version, self.layer) {
            (MpegVersion::Mpeg1, Layer::Layer1) => BITRATES_MPEG1_L1[index],
            (MpegVersion::Mpeg1, Layer::Layer2) => BITRATES_MPEG1_L2[index],
            (MpegVersion::Mpeg1, Layer::Layer3) => BITRATES_MPEG1_L3[index],
            (_, Layer::Layer1) => BITRATES_LSF_L1[index],
            (_, _) => BITRATES_LSF_L23[index],
        }
    }

    /// Bitrate in bits per second
    pub fn bitrate(&self) -> u32 {
        self.bitrate_kbps() * 1000
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATES[self.version.family()][self.sample_rate_index as usize]
    }

    /// Number of channels carried by the frame
    pub fn channels(&self) -> usize {
        match self.mode {
            ChannelMode::SingleChannel => 1,
            _ => 2,
        }
    }

    /// PCM samples per channel produced by one frame
    pub fn samples_per_frame(&self) -> usize {
        match self.layer {
            Layer::Layer1 => 384,
            Layer::Layer2 => 1152,
            Layer::Layer3 if self.version.is_lsf() => 576,
            Layer::Layer3 => 1152,
        }
    }

    /// Total frame length in bytes, header included
    pub fn frame_length(&self) -> usize {
        let bitrate = self.bitrate() as usize;
        let sample_rate = self.sample_rate() as usize;
        let padding = usize::from(self.padding);

        match self.layer {
            Layer::Layer1 => (12 * bitrate / sample_rate + padding) * 4,
            Layer::Layer2 => 144 * bitrate / sample_rate + padding,
            Layer::Layer3 if self.version.is_lsf() => 72 * bitrate / sample_rate + padding,
            Layer::Layer3 => 144 * bitrate / sample_rate + padding,
        }
    }

    /// Frame length minus the header
    pub fn body_length(&self) -> usize {
        self.frame_length().saturating_sub(HEADER_LEN)
    }

    /// First subband coded in intensity stereo, 32 when there is none
    pub fn intensity_bound(&self) -> usize {
        match (self.mode, self.layer) {
            (ChannelMode::JointStereo, Layer::Layer1 | Layer::Layer2) => {
                4 * (self.mode_extension as usize + 1)
            }
            _ => SBLIMIT,
        }
    }

    /// Layer II bit allocation table selected by version, bitrate and sample rate
    pub fn allocation_table(&self) -> &'static AllocationTable {
        if self.version.is_lsf() {
            return &ALLOC_TABLE_LSF;
        }

        let kbps_per_channel = self.bitrate_kbps() / self.channels() as u32;
        if kbps_per_channel < 56 {
            // 32 kHz has its own low-rate table
            if self.sample_rate_index == 2 {
                &ALLOC_TABLE_B2D
            } else {
                &ALLOC_TABLE_B2C
            }
        } else if kbps_per_channel >= 96 && self.sample_rate_index != 1 {
            &ALLOC_TABLE_B2B
        } else {
            &ALLOC_TABLE_B2A
        }
    }

    /// Number of subbands carrying data
    pub fn subband_limit(&self) -> usize {
        match self.layer {
            Layer::Layer2 => self.allocation_table().sblimit,
            _ => SBLIMIT,
        }
    }

    /// Playback duration of one frame in seconds
    pub fn duration(&self) -> f64 {
        self.samples_per_frame() as f64 / self.sample_rate() as f64
    }

    /// Version, layer and sample rate agree, as between frames of one stream
    pub fn same_stream(&self, other: &FrameHeader) -> bool {
        self.version == other.version
            && self.layer == other.layer
            && self.sample_rate_index == other.sample_rate_index
    }
}

impl fmt::Display for FrameHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = match self.version {
            MpegVersion::Mpeg1 => "MPEG-1",
            MpegVersion::Mpeg2 => "MPEG-2",
            MpegVersion::Mpeg2p5 => "MPEG-2.5",
        };
        let mode = match self.mode {
            ChannelMode::Stereo => "stereo",
            ChannelMode::JointStereo => "joint stereo",
            ChannelMode::DualChannel => "dual channel",
            ChannelMode::SingleChannel => "mono",
        };
        write!(
            f,
            "{} {}, {} kbps, {} Hz, {}",
            version,
            self.layer,
            self.bitrate_kbps(),
            self.sample_rate(),
            mode
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Build a header word from its fields
    fn header_word(version: u32, layer: u32, bitrate: u32, rate: u32, padding: u32, mode: u32) -> u32 {
        0xFFE0_0000
            | (version << 19)
            | (layer << 17)
            | (1 << 16)
            | (bitrate << 12)
            | (rate << 10)
            | (padding << 9)
            | (mode << 6)
    }

    #[test]
    fn test_same_stream() {
        let stereo = FrameHeader::parse(0xFFFD_A004).unwrap();
        let mono = FrameHeader::parse(0xFFFD_60C0).unwrap();
        let layer1 = FrameHeader::parse(0xFFFF_40C0).unwrap();
        let rate_48k = FrameHeader::parse(0xFFFD_A404).unwrap();

        assert!(stereo.same_stream(&mono));
        assert!(!stereo.same_stream(&layer1));
        assert!(!stereo.same_stream(&rate_48k));
    }

    #[test]
    fn test_parse_layer2_stereo() {
        // MPEG-1 Layer II, 192 kbps, 44.1 kHz, stereo, no CRC
        let header = FrameHeader::parse(0xFFFD_A004).unwrap();

        assert_eq!(header.version, MpegVersion::Mpeg1);
        assert_eq!(header.layer, Layer::Layer2);
        assert!(!header.has_crc);
        assert_eq!(header.bitrate_kbps(), 192);
        assert_eq!(header.sample_rate(), 44100);
        assert_eq!(header.mode, ChannelMode::Stereo);
        assert_eq!(header.channels(), 2);
        assert_eq!(header.samples_per_frame(), 1152);
        assert_eq!(header.frame_length(), 626);
        assert_eq!(header.subband_limit(), 30);
        assert!(header.original);
    }

    #[test]
    fn test_parse_layer1_frame_length() {
        // MPEG-1 Layer I, 384 kbps, 48 kHz, mono, padded
        let word = header_word(0b11, 0b11, 12, 1, 1, 0b11);
        let header = FrameHeader::parse(word).unwrap();

        assert_eq!(header.layer, Layer::Layer1);
        assert_eq!(header.samples_per_frame(), 384);
        assert_eq!(header.channels(), 1);
        // (12 * 384000 / 48000 + 1) * 4
        assert_eq!(header.frame_length(), 388);
        assert_eq!(header.subband_limit(), 32);
    }

    #[test]
    fn test_rejects_bad_sync() {
        assert_eq!(
            FrameHeader::parse(0x1234_5678),
            Err(HeaderError::BadSync(0x1234_5678))
        );
    }

    #[test]
    fn test_rejects_reserved_fields() {
        assert_eq!(
            FrameHeader::parse(header_word(0b01, 0b10, 9, 0, 0, 0)),
            Err(HeaderError::ReservedVersion)
        );
        assert_eq!(
            FrameHeader::parse(header_word(0b11, 0b00, 9, 0, 0, 0)),
            Err(HeaderError::ReservedLayer)
        );
        assert_eq!(
            FrameHeader::parse(header_word(0b11, 0b10, 0, 0, 0, 0)),
            Err(HeaderError::FreeFormat)
        );
        assert_eq!(
            FrameHeader::parse(header_word(0b11, 0b10, 15, 0, 0, 0)),
            Err(HeaderError::BadBitrate(15))
        );
        assert_eq!(
            FrameHeader::parse(header_word(0b11, 0b10, 9, 3, 0, 0)),
            Err(HeaderError::ReservedSampleRate)
        );
    }

    #[test]
    fn test_intensity_bound() {
        let mut header = FrameHeader::parse(header_word(0b11, 0b10, 9, 0, 0, 0b01)).unwrap();
        assert_eq!(header.mode, ChannelMode::JointStereo);
        for (ext, bound) in [(0u8, 4usize), (1, 8), (2, 12), (3, 16)] {
            header.mode_extension = ext;
            assert_eq!(header.intensity_bound(), bound);
        }

        header.mode = ChannelMode::Stereo;
        assert_eq!(header.intensity_bound(), 32);
    }

    #[test]
    fn test_allocation_table_selection() {
        // 48 kbps stereo at 44.1 kHz: 24 kbps per channel, table B.2c
        let low = FrameHeader::parse(header_word(0b11, 0b10, 2, 0, 0, 0)).unwrap();
        assert_eq!(low.subband_limit(), 8);

        // 48 kbps stereo at 32 kHz, table B.2d
        let low_32k = FrameHeader::parse(header_word(0b11, 0b10, 2, 2, 0, 0)).unwrap();
        assert_eq!(low_32k.subband_limit(), 12);

        // 128 kbps stereo at 48 kHz: 64 kbps per channel, table B.2a
        let mid = FrameHeader::parse(header_word(0b11, 0b10, 8, 1, 0, 0)).unwrap();
        assert_eq!(mid.subband_limit(), 27);

        // 384 kbps stereo at 48 kHz stays on B.2a
        let high_48k = FrameHeader::parse(header_word(0b11, 0b10, 14, 1, 0, 0)).unwrap();
        assert_eq!(high_48k.subband_limit(), 27);

        // 96 kbps mono at 44.1 kHz, table B.2b
        let mono = FrameHeader::parse(header_word(0b11, 0b10, 6, 0, 0, 0b11)).unwrap();
        assert_eq!(mono.subband_limit(), 30);

        // MPEG-2 always uses the LSF table
        let lsf = FrameHeader::parse(header_word(0b10, 0b10, 8, 0, 0, 0)).unwrap();
        assert_eq!(lsf.sample_rate(), 22050);
        assert_eq!(lsf.subband_limit(), 30);
    }

    #[test]
    fn test_read_from_bitstream() {
        let mut br = BitReader::new(std::io::Cursor::new([0xFFu8, 0xFD, 0xA0, 0x04, 0x00]));
        let header = FrameHeader::read(&mut br).unwrap();
        assert_eq!(header.layer, Layer::Layer2);
        assert_eq!(br.bytes_consumed(), 4);
    }

    #[test]
    fn test_display() {
        let header = FrameHeader::parse(0xFFFD_A004).unwrap();
        assert_eq!(header.to_string(), "MPEG-1 Layer II, 192 kbps, 44100 Hz, stereo");
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 200,
            failure_persistence: None,
            ..ProptestConfig::default()
        })]

        #[test]
        fn property_samples_per_frame_depends_only_on_layer(
            version in prop::sample::select(&[0b00u32, 0b10, 0b11]),
            layer in prop::sample::select(&[0b10u32, 0b11]),
            bitrate in 1u32..15,
            rate in 0u32..3,
            padding in 0u32..2,
            mode in 0u32..4,
        ) {
            let header = FrameHeader::parse(header_word(version, layer, bitrate, rate, padding, mode)).unwrap();
            let expected = if layer == 0b11 { 384 } else { 1152 };
            prop_assert_eq!(header.samples_per_frame(), expected);
            prop_assert!(header.frame_length() > HEADER_LEN);
        }
    }
}
