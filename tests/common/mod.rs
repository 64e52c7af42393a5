//! Bit-level frame construction shared by the integration tests

#![allow(dead_code)]

use maponus_rs::bitstream::BitWriter;
use maponus_rs::crc::Crc16;
use maponus_rs::FrameHeader;

/// MPEG-1 Layer II, 192 kbps, 44.1 kHz, stereo, no CRC (626 bytes, 30 subbands)
pub const L2_STEREO: u32 = 0xFFFD_A004;
/// Same as `L2_STEREO` with a CRC
pub const L2_STEREO_CRC: u32 = 0xFFFC_A004;
/// MPEG-1 Layer II, 192 kbps, 44.1 kHz, joint stereo, intensity bound 4
pub const L2_JOINT_STEREO: u32 = 0xFFFD_A040;
/// MPEG-1 Layer II, 96 kbps, 44.1 kHz, mono (313 bytes, 30 subbands)
pub const L2_MONO: u32 = 0xFFFD_60C0;
/// MPEG-1 Layer I, 128 kbps, 44.1 kHz, mono (136 bytes)
pub const L1_MONO: u32 = 0xFFFF_40C0;

/// Builds one frame: header, optional CRC word, then the body bits
pub struct FrameWriter {
    word: u32,
    header: FrameHeader,
    body: BitWriter,
    crc: Crc16,
    crc_override: Option<u16>,
}

impl FrameWriter {
    pub fn new(word: u32) -> Self {
        Self {
            word,
            header: FrameHeader::parse(word).expect("test header must parse"),
            body: BitWriter::new(),
            crc: Crc16::for_header(word),
            crc_override: None,
        }
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    /// Bits covered by the CRC (allocation and scale factor selection)
    pub fn side(&mut self, value: u32, bits: u32) -> &mut Self {
        self.body.put_bits(value, bits);
        self.crc.add_bits(value, bits);
        self
    }

    /// Bits after the protected part
    pub fn data(&mut self, value: u32, bits: u32) -> &mut Self {
        self.body.put_bits(value, bits);
        self
    }

    /// Allocation width of Layer II subband `sb`
    pub fn nbal(&self, sb: usize) -> u32 {
        self.header
            .allocation_table()
            .band(sb)
            .map(|(nbal, _)| nbal)
            .expect("subband inside the table")
    }

    /// Store this value instead of the computed CRC
    pub fn crc_override(&mut self, crc: u16) -> &mut Self {
        self.crc_override = Some(crc);
        self
    }

    pub fn computed_crc(&self) -> u16 {
        self.crc.value()
    }

    pub fn finish(self) -> Vec<u8> {
        let mut head = BitWriter::new();
        head.put_bits(self.word, 32);
        if self.header.has_crc {
            let crc = self.crc_override.unwrap_or_else(|| self.crc.value());
            head.put_bits(u32::from(crc), 16);
        }
        let mut frame = head.finish();
        frame.extend(self.body.finish());
        assert!(frame.len() <= self.header.frame_length(), "frame body too long");
        frame.resize(self.header.frame_length(), 0);
        frame
    }
}

/// A frame with every allocation zero
pub fn silent_frame(word: u32) -> Vec<u8> {
    FrameWriter::new(word).finish()
}

/// Layer II mono frame with a constant value in subband 0.
///
/// Allocation 15 selects 16-bit samples, scfsi 2 a single scale factor.
pub fn layer2_mono_dc(word: u32, sample: u16, scalefactor: u32) -> Vec<u8> {
    let mut w = FrameWriter::new(word);
    let limit = w.header().subband_limit();
    for sb in 0..limit {
        let nbal = w.nbal(sb);
        w.side(if sb == 0 { 15 } else { 0 }, nbal);
    }
    w.side(2, 2);
    w.data(scalefactor, 6);
    for _ in 0..12 {
        for _ in 0..3 {
            w.data(u32::from(sample), 16);
        }
    }
    w.finish()
}

/// Layer II stereo frame with constant values in subband 0 of both channels.
/// Same coding as `layer2_mono_dc` for each channel.
pub fn layer2_stereo_dc(word: u32, left: u16, right: u16) -> Vec<u8> {
    let mut w = FrameWriter::new(word);
    let limit = w.header().subband_limit();
    for sb in 0..limit {
        let nbal = w.nbal(sb);
        let code = if sb == 0 { 15 } else { 0 };
        w.side(code, nbal);
        w.side(code, nbal);
    }
    w.side(2, 2);
    w.side(2, 2);
    w.data(3, 6);
    w.data(3, 6);
    for _ in 0..12 {
        for value in [left, right] {
            for _ in 0..3 {
                w.data(u32::from(value), 16);
            }
        }
    }
    w.finish()
}

/// Decode a raw little-endian PCM byte slice into samples
pub fn le_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
