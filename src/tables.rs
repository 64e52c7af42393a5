//! Lookup tables and constants for MPEG audio Layer I/II decoding
//!
//! Bitrate and sample-rate tables of ISO/IEC 11172-3 and 13818-3, the Layer
//! I/II scale factors, the Layer II bit allocation tables (Table B.2a-d and
//! the LSF table), the quantization classes of Table B.4, and the synthesis
//! window D of Table B.3. Every table is fixed data so decoded output is
//! bit-exact across platforms.

/// Number of subbands of the polyphase filterbank
pub const SBLIMIT: usize = 32;

/// Sample rates in Hz, indexed by [version family][sample-rate index]
/// (family 0 = MPEG-1, 1 = MPEG-2, 2 = MPEG-2.5)
pub const SAMPLE_RATES: [[u32; 3]; 3] = [
    [44100, 48000, 32000], // MPEG-1
    [22050, 24000, 16000], // MPEG-2
    [11025, 12000, 8000],  // MPEG-2.5
];

/// Bitrates in kbps for MPEG-1 Layer I, indexed by bitrate index (0 = free format)
pub const BITRATES_MPEG1_L1: [u32; 15] = [
    0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448,
];

/// Bitrates in kbps for MPEG-1 Layer II
pub const BITRATES_MPEG1_L2: [u32; 15] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384,
];

/// Bitrates in kbps for MPEG-1 Layer III
pub const BITRATES_MPEG1_L3: [u32; 15] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
];

/// Bitrates in kbps for MPEG-2/2.5 Layer I
pub const BITRATES_LSF_L1: [u32; 15] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256,
];

/// Bitrates in kbps for MPEG-2/2.5 Layers II and III
pub const BITRATES_LSF_L23: [u32; 15] = [
    0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160,
];

/// Layer I/II scale factors, 2^(1 - i/3) for i in 0..63 (Table B.1).
/// Index 63 is not a legal scale factor and maps to silence.
#[rustfmt::skip]
pub const SCALE_FACTORS: [f32; 64] = [
    2.00000000000000, 1.58740105196820, 1.25992104989487, 1.00000000000000,
    0.79370052598410, 0.62996052494744, 0.50000000000000, 0.39685026299205,
    0.31498026247372, 0.25000000000000, 0.19842513149602, 0.15749013123686,
    0.12500000000000, 0.09921256574801, 0.07874506561843, 0.06250000000000,
    0.04960628287401, 0.03937253280921, 0.03125000000000, 0.02480314143700,
    0.01968626640461, 0.01562500000000, 0.01240157071850, 0.00984313320230,
    0.00781250000000, 0.00620078535925, 0.00492156660115, 0.00390625000000,
    0.00310039267963, 0.00246078330058, 0.00195312500000, 0.00155019633981,
    0.00123039165029, 0.00097656250000, 0.00077509816991, 0.00061519582514,
    0.00048828125000, 0.00038754908495, 0.00030759791257, 0.00024414062500,
    0.00019377454248, 0.00015379895629, 0.00012207031250, 0.00009688727124,
    0.00007689947814, 0.00006103515625, 0.00004844363562, 0.00003844973907,
    0.00003051757812, 0.00002422181781, 0.00001922486954, 0.00001525878906,
    0.00001211090890, 0.00000961243477, 0.00000762939453, 0.00000605545445,
    0.00000480621738, 0.00000381469727, 0.00000302772723, 0.00000240310869,
    0.00000190734863, 0.00000151386361, 0.00000120155435, 0.00000000000000,
];

/// A quantization class of Table B.4
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantClass {
    /// Number of quantization steps
    pub levels: u32,
    /// Three consecutive samples share one codeword
    pub grouped: bool,
    /// Bits read from the bitstream per codeword
    pub code_bits: u32,
    /// Bits of one (ungrouped) sample, defines its two's-complement fraction
    pub sample_bits: u32,
    /// Dequantization factor C
    pub c: f32,
    /// Dequantization offset D
    pub d: f32,
}

impl QuantClass {
    const fn grouped(levels: u32, code_bits: u32, sample_bits: u32, c: f32, d: f32) -> Self {
        Self { levels, grouped: true, code_bits, sample_bits, c, d }
    }

    const fn plain(levels: u32, bits: u32, c: f32, d: f32) -> Self {
        Self { levels, grouped: false, code_bits: bits, sample_bits: bits, c, d }
    }

    /// Dequantize one sample value (an ungrouped code, or one value split out
    /// of a grouped codeword) into the range (-1, 1).
    #[inline]
    pub fn dequantize(&self, value: u32) -> f32 {
        let fraction = value as f32 / (1u32 << (self.sample_bits - 1)) as f32 - 1.0;
        self.c * (fraction + self.d)
    }
}

pub const Q3: QuantClass = QuantClass::grouped(3, 5, 2, 1.33333333333, 0.5);
pub const Q5: QuantClass = QuantClass::grouped(5, 7, 3, 1.60000000000, 0.5);
pub const Q7: QuantClass = QuantClass::plain(7, 3, 1.14285714286, 0.25);
pub const Q9: QuantClass = QuantClass::grouped(9, 10, 4, 1.77777777778, 0.5);
pub const Q15: QuantClass = QuantClass::plain(15, 4, 1.06666666666, 0.125);
pub const Q31: QuantClass = QuantClass::plain(31, 5, 1.03225806452, 0.0625);
pub const Q63: QuantClass = QuantClass::plain(63, 6, 1.01587301587, 0.03125);
pub const Q127: QuantClass = QuantClass::plain(127, 7, 1.00787401575, 0.015625);
pub const Q255: QuantClass = QuantClass::plain(255, 8, 1.00392156863, 0.0078125);
pub const Q511: QuantClass = QuantClass::plain(511, 9, 1.00195694716, 0.00390625);
pub const Q1023: QuantClass = QuantClass::plain(1023, 10, 1.00097751711, 0.001953125);
pub const Q2047: QuantClass = QuantClass::plain(2047, 11, 1.00048851979, 0.0009765625);
pub const Q4095: QuantClass = QuantClass::plain(4095, 12, 1.00024420024, 0.00048828125);
pub const Q8191: QuantClass = QuantClass::plain(8191, 13, 1.00012208522, 0.00024414063);
pub const Q16383: QuantClass = QuantClass::plain(16383, 14, 1.00006103888, 0.00012207031);
pub const Q32767: QuantClass = QuantClass::plain(32767, 15, 1.00003051851, 0.00006103516);
pub const Q65535: QuantClass = QuantClass::plain(65535, 16, 1.00001525902, 0.00003051758);

/// Layer I has no grouping: allocation code n selects n + 1 bits per sample.
/// Code 0 means no data, code 15 is forbidden.
pub const LAYER1_CLASSES: [Option<QuantClass>; 15] = [
    None,
    Some(QuantClass::plain(3, 2, 1.33333333333, 0.5)),
    Some(Q7),
    Some(Q15),
    Some(Q31),
    Some(Q63),
    Some(Q127),
    Some(Q255),
    Some(Q511),
    Some(Q1023),
    Some(Q2047),
    Some(Q4095),
    Some(Q8191),
    Some(Q16383),
    Some(Q32767),
];

/// One allocation row: quantization class per allocation code
pub type AllocationRow = [Option<QuantClass>];

/// Table B.2a/b, subbands 0-2
const ROW_LOW_BANDS: [Option<QuantClass>; 16] = [
    None, Some(Q3), Some(Q7), Some(Q15), Some(Q31), Some(Q63), Some(Q127), Some(Q255),
    Some(Q511), Some(Q1023), Some(Q2047), Some(Q4095), Some(Q8191), Some(Q16383),
    Some(Q32767), Some(Q65535),
];

/// Table B.2a/b, subbands 3-10
const ROW_MID_BANDS: [Option<QuantClass>; 16] = [
    None, Some(Q3), Some(Q5), Some(Q7), Some(Q9), Some(Q15), Some(Q31), Some(Q63),
    Some(Q127), Some(Q255), Some(Q511), Some(Q1023), Some(Q2047), Some(Q4095),
    Some(Q8191), Some(Q65535),
];

/// Table B.2a/b, subbands 11-22
const ROW_HIGH_BANDS: [Option<QuantClass>; 8] = [
    None, Some(Q3), Some(Q5), Some(Q7), Some(Q9), Some(Q15), Some(Q31), Some(Q65535),
];

/// Table B.2a/b, subbands 23-29
const ROW_TOP_BANDS: [Option<QuantClass>; 4] = [None, Some(Q3), Some(Q5), Some(Q65535)];

/// Table B.2c/d, and the LSF table above subband 3 (truncated by allocation width)
const ROW_LOW_RATE: [Option<QuantClass>; 16] = [
    None, Some(Q3), Some(Q5), Some(Q9), Some(Q15), Some(Q31), Some(Q63), Some(Q127),
    Some(Q255), Some(Q511), Some(Q1023), Some(Q2047), Some(Q4095), Some(Q8191),
    Some(Q16383), Some(Q32767),
];

/// ISO/IEC 13818-3 Table B.1, subbands 0-3
const ROW_LSF_LOW_BANDS: [Option<QuantClass>; 16] = [
    None, Some(Q3), Some(Q5), Some(Q7), Some(Q9), Some(Q15), Some(Q31), Some(Q63),
    Some(Q127), Some(Q255), Some(Q511), Some(Q1023), Some(Q2047), Some(Q4095),
    Some(Q8191), Some(Q16383),
];

/// A run of consecutive subbands sharing an allocation width and row
#[derive(Debug, Clone, Copy)]
pub struct AllocationBand {
    /// Number of consecutive subbands in the run
    pub subbands: usize,
    /// Width in bits of the allocation code
    pub nbal: u32,
    /// Quantization class per allocation code
    pub row: &'static AllocationRow,
}

/// A complete Layer II bit allocation table
#[derive(Debug, Clone, Copy)]
pub struct AllocationTable {
    /// Number of subbands that carry data
    pub sblimit: usize,
    pub bands: &'static [AllocationBand],
}

impl AllocationTable {
    /// Allocation width and row of subband `sb`, `None` at or above the limit
    pub fn band(&self, sb: usize) -> Option<(u32, &'static AllocationRow)> {
        if sb >= self.sblimit {
            return None;
        }
        let mut first = 0;
        for band in self.bands {
            if sb < first + band.subbands {
                return Some((band.nbal, &band.row[..1 << band.nbal]));
            }
            first += band.subbands;
        }
        None
    }
}

/// Table B.2a: 48 kHz at 56 kbps/channel and above, 44.1/32 kHz at 56-80 kbps/channel
pub const ALLOC_TABLE_B2A: AllocationTable = AllocationTable {
    sblimit: 27,
    bands: &[
        AllocationBand { subbands: 3, nbal: 4, row: &ROW_LOW_BANDS },
        AllocationBand { subbands: 8, nbal: 4, row: &ROW_MID_BANDS },
        AllocationBand { subbands: 12, nbal: 3, row: &ROW_HIGH_BANDS },
        AllocationBand { subbands: 4, nbal: 2, row: &ROW_TOP_BANDS },
    ],
};

/// Table B.2b: 44.1/32 kHz at 96 kbps/channel and above
pub const ALLOC_TABLE_B2B: AllocationTable = AllocationTable {
    sblimit: 30,
    bands: &[
        AllocationBand { subbands: 3, nbal: 4, row: &ROW_LOW_BANDS },
        AllocationBand { subbands: 8, nbal: 4, row: &ROW_MID_BANDS },
        AllocationBand { subbands: 12, nbal: 3, row: &ROW_HIGH_BANDS },
        AllocationBand { subbands: 7, nbal: 2, row: &ROW_TOP_BANDS },
    ],
};

/// Table B.2c: 48/44.1 kHz below 56 kbps/channel
pub const ALLOC_TABLE_B2C: AllocationTable = AllocationTable {
    sblimit: 8,
    bands: &[
        AllocationBand { subbands: 2, nbal: 4, row: &ROW_LOW_RATE },
        AllocationBand { subbands: 6, nbal: 3, row: &ROW_LOW_RATE },
    ],
};

/// Table B.2d: 32 kHz below 56 kbps/channel
pub const ALLOC_TABLE_B2D: AllocationTable = AllocationTable {
    sblimit: 12,
    bands: &[
        AllocationBand { subbands: 2, nbal: 4, row: &ROW_LOW_RATE },
        AllocationBand { subbands: 10, nbal: 3, row: &ROW_LOW_RATE },
    ],
};

/// ISO/IEC 13818-3 Table B.1 for the lower sampling frequencies
pub const ALLOC_TABLE_LSF: AllocationTable = AllocationTable {
    sblimit: 30,
    bands: &[
        AllocationBand { subbands: 4, nbal: 4, row: &ROW_LSF_LOW_BANDS },
        AllocationBand { subbands: 7, nbal: 3, row: &ROW_LOW_RATE },
        AllocationBand { subbands: 19, nbal: 2, row: &ROW_LOW_RATE },
    ],
};

/// Synthesis window D[i] of Table B.3
#[allow(clippy::unreadable_literal)]
#[rustfmt::skip]
pub const SYNTHESIS_WINDOW: [f32; 512] = [
     0.000000000, -0.000015259, -0.000015259, -0.000015259, -0.000015259, -0.000015259, -0.000015259, -0.000030518,
    -0.000030518, -0.000030518, -0.000030518, -0.000045776, -0.000045776, -0.000061035, -0.000061035, -0.000076294,
    -0.000076294, -0.000091553, -0.000106812, -0.000106812, -0.000122070, -0.000137329, -0.000152588, -0.000167847,
    -0.000198364, -0.000213623, -0.000244141, -0.000259399, -0.000289917, -0.000320435, -0.000366211, -0.000396729,
    -0.000442505, -0.000473022, -0.000534058, -0.000579834, -0.000625610, -0.000686646, -0.000747681, -0.000808716,
    -0.000885010, -0.000961304, -0.001037598, -0.001113892, -0.001205444, -0.001296997, -0.001388550, -0.001480103,
    -0.001586914, -0.001693726, -0.001785278, -0.001907349, -0.002014160, -0.002120972, -0.002243042, -0.002349854,
    -0.002456665, -0.002578735, -0.002685547, -0.002792358, -0.002899170, -0.002990723, -0.003082275, -0.003173828,
     0.003250122,  0.003326416,  0.003387451,  0.003433228,  0.003463745,  0.003479004,  0.003479004,  0.003463745,
     0.003417969,  0.003372192,  0.003280640,  0.003173828,  0.003051758,  0.002883911,  0.002700806,  0.002487183,
     0.002227783,  0.001937866,  0.001617432,  0.001266479,  0.000869751,  0.000442505, -0.000030518, -0.000549316,
    -0.001098633, -0.001693726, -0.002334595, -0.003005981, -0.003723145, -0.004486084, -0.005294800, -0.006118774,
    -0.007003784, -0.007919312, -0.008865356, -0.009841919, -0.010848999, -0.011886597, -0.012939453, -0.014022827,
    -0.015121460, -0.016235352, -0.017349243, -0.018463135, -0.019577026, -0.020690918, -0.021789551, -0.022857666,
    -0.023910522, -0.024932861, -0.025909424, -0.026840210, -0.027725220, -0.028533936, -0.029281616, -0.029937744,
    -0.030532837, -0.031005859, -0.031387329, -0.031661987, -0.031814575, -0.031845093, -0.031738281, -0.031478882,
     0.031082153,  0.030517578,  0.029785156,  0.028884888,  0.027801514,  0.026535034,  0.025085449,  0.023422241,
     0.021575928,  0.019531250,  0.017257690,  0.014801025,  0.012115479,  0.009231567,  0.006134033,  0.002822876,
    -0.000686646, -0.004394531, -0.008316040, -0.012420654, -0.016708374, -0.021179199, -0.025817871, -0.030609131,
    -0.035552979, -0.040634155, -0.045837402, -0.051132202, -0.056533813, -0.061996460, -0.067520142, -0.073059082,
    -0.078628540, -0.084182739, -0.089706421, -0.095169067, -0.100540161, -0.105819702, -0.110946655, -0.115921021,
    -0.120697021, -0.125259399, -0.129562378, -0.133590698, -0.137298584, -0.140670776, -0.143676758, -0.146255493,
    -0.148422241, -0.150115967, -0.151306152, -0.151962280, -0.152069092, -0.151596069, -0.150497437, -0.148773193,
    -0.146362305, -0.143264771, -0.139450073, -0.134887695, -0.129577637, -0.123474121, -0.116577148, -0.108856201,
     0.100311279,  0.090927124,  0.080688477,  0.069595337,  0.057617187,  0.044784546,  0.031082153,  0.016510010,
     0.001068115, -0.015228271, -0.032379150, -0.050354004, -0.069168091, -0.088775635, -0.109161377, -0.130310059,
    -0.152206421, -0.174789429, -0.198059082, -0.221984863, -0.246505737, -0.271591187, -0.297210693, -0.323318481,
    -0.349868774, -0.376800537, -0.404083252, -0.431655884, -0.459472656, -0.487472534, -0.515609741, -0.543823242,
    -0.572036743, -0.600219727, -0.628295898, -0.656219482, -0.683914185, -0.711318970, -0.738372803, -0.765029907,
    -0.791213989, -0.816864014, -0.841949463, -0.866363525, -0.890090942, -0.913055420, -0.935195923, -0.956481934,
    -0.976852417, -0.996246338, -1.014617920, -1.031936646, -1.048156738, -1.063217163, -1.077117920, -1.089782715,
    -1.101211548, -1.111373901, -1.120223999, -1.127746582, -1.133926392, -1.138763428, -1.142211914, -1.144287109,
     1.144989014,  1.144287109,  1.142211914,  1.138763428,  1.133926392,  1.127746582,  1.120223999,  1.111373901,
     1.101211548,  1.089782715,  1.077117920,  1.063217163,  1.048156738,  1.031936646,  1.014617920,  0.996246338,
     0.976852417,  0.956481934,  0.935195923,  0.913055420,  0.890090942,  0.866363525,  0.841949463,  0.816864014,
     0.791213989,  0.765029907,  0.738372803,  0.711318970,  0.683914185,  0.656219482,  0.628295898,  0.600219727,
     0.572036743,  0.543823242,  0.515609741,  0.487472534,  0.459472656,  0.431655884,  0.404083252,  0.376800537,
     0.349868774,  0.323318481,  0.297210693,  0.271591187,  0.246505737,  0.221984863,  0.198059082,  0.174789429,
     0.152206421,  0.130310059,  0.109161377,  0.088775635,  0.069168091,  0.050354004,  0.032379150,  0.015228271,
    -0.001068115, -0.016510010, -0.031082153, -0.044784546, -0.057617187, -0.069595337, -0.080688477, -0.090927124,
     0.100311279,  0.108856201,  0.116577148,  0.123474121,  0.129577637,  0.134887695,  0.139450073,  0.143264771,
     0.146362305,  0.148773193,  0.150497437,  0.151596069,  0.152069092,  0.151962280,  0.151306152,  0.150115967,
     0.148422241,  0.146255493,  0.143676758,  0.140670776,  0.137298584,  0.133590698,  0.129562378,  0.125259399,
     0.120697021,  0.115921021,  0.110946655,  0.105819702,  0.100540161,  0.095169067,  0.089706421,  0.084182739,
     0.078628540,  0.073059082,  0.067520142,  0.061996460,  0.056533813,  0.051132202,  0.045837402,  0.040634155,
     0.035552979,  0.030609131,  0.025817871,  0.021179199,  0.016708374,  0.012420654,  0.008316040,  0.004394531,
     0.000686646, -0.002822876, -0.006134033, -0.009231567, -0.012115479, -0.014801025, -0.017257690, -0.019531250,
    -0.021575928, -0.023422241, -0.025085449, -0.026535034, -0.027801514, -0.028884888, -0.029785156, -0.030517578,
     0.031082153,  0.031478882,  0.031738281,  0.031845093,  0.031814575,  0.031661987,  0.031387329,  0.031005859,
     0.030532837,  0.029937744,  0.029281616,  0.028533936,  0.027725220,  0.026840210,  0.025909424,  0.024932861,
     0.023910522,  0.022857666,  0.021789551,  0.020690918,  0.019577026,  0.018463135,  0.017349243,  0.016235352,
     0.015121460,  0.014022827,  0.012939453,  0.011886597,  0.010848999,  0.009841919,  0.008865356,  0.007919312,
     0.007003784,  0.006118774,  0.005294800,  0.004486084,  0.003723145,  0.003005981,  0.002334595,  0.001693726,
     0.001098633,  0.000549316,  0.000030518, -0.000442505, -0.000869751, -0.001266479, -0.001617432, -0.001937866,
    -0.002227783, -0.002487183, -0.002700806, -0.002883911, -0.003051758, -0.003173828, -0.003280640, -0.003372192,
    -0.003417969, -0.003463745, -0.003479004, -0.003479004, -0.003463745, -0.003433228, -0.003387451, -0.003326416,
     0.003250122,  0.003173828,  0.003082275,  0.002990723,  0.002899170,  0.002792358,  0.002685547,  0.002578735,
     0.002456665,  0.002349854,  0.002243042,  0.002120972,  0.002014160,  0.001907349,  0.001785278,  0.001693726,
     0.001586914,  0.001480103,  0.001388550,  0.001296997,  0.001205444,  0.001113892,  0.001037598,  0.000961304,
     0.000885010,  0.000808716,  0.000747681,  0.000686646,  0.000625610,  0.000579834,  0.000534058,  0.000473022,
     0.000442505,  0.000396729,  0.000366211,  0.000320435,  0.000289917,  0.000259399,  0.000244141,  0.000213623,
     0.000198364,  0.000167847,  0.000152588,  0.000137329,  0.000122070,  0.000106812,  0.000106812,  0.000091553,
     0.000076294,  0.000076294,  0.000061035,  0.000061035,  0.000045776,  0.000045776,  0.000030518,  0.000030518,
     0.000030518,  0.000030518,  0.000015259,  0.000015259,  0.000015259,  0.000015259,  0.000015259,  0.000015259,
];
