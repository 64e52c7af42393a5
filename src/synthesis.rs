//! Polyphase synthesis filterbank
//!
//! Turns 32 subband samples into 32 PCM samples per pass, following the
//! ISO/IEC 11172-3 reference procedure: matrixing into a 1024-entry V
//! history, building U from V, windowing with table D and summing the 16
//! partial products of each output sample. The history is what carries one
//! frame into the next, so a filter is only reset when a stream is opened.

use std::f64::consts::PI;

use lazy_static::lazy_static;

use crate::tables::{SBLIMIT, SYNTHESIS_WINDOW};

/// Length of the V history
const HISTORY_LEN: usize = 1024;

/// Largest magnitude a PCM sample may take
pub const PCM_LIMIT: f32 = 32767.0;

/// Scale from the nominal [-1, 1) range to 16-bit PCM
const PCM_SCALE: f32 = 32768.0;

lazy_static! {
    /// Matrixing coefficients N[i][k] = cos((16 + i)(2k + 1)π / 64)
    static ref MATRIX: Box<[[f32; SBLIMIT]; 64]> = {
        let mut n = Box::new([[0.0f32; SBLIMIT]; 64]);
        for (i, row) in n.iter_mut().enumerate() {
            for (k, coef) in row.iter_mut().enumerate() {
                *coef = ((16 + i) as f64 * (2 * k + 1) as f64 * PI / 64.0).cos() as f32;
            }
        }
        n
    };
}

/// Clamp a scaled PCM value to ±32767
#[inline]
pub fn clamp_pcm(value: f32) -> f32 {
    value.clamp(-PCM_LIMIT, PCM_LIMIT)
}

/// Per-subband gain factors applied on the way into the synthesis filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Equalizer {
    factors: [f32; SBLIMIT],
}

impl Equalizer {
    /// Every band at unity gain
    pub fn flat() -> Self {
        Self {
            factors: [1.0; SBLIMIT],
        }
    }

    /// Build from per-band settings; missing bands stay flat
    pub fn from_settings(settings: &[f32]) -> Self {
        let mut eq = Self::flat();
        for (band, &setting) in settings.iter().enumerate().take(SBLIMIT) {
            eq.set_band(band, setting);
        }
        eq
    }

    /// Set one band. Settings in [-1, 1] map to 2^setting, `NEG_INFINITY` silences the band.
    /// Out-of-range bands are ignored.
    pub fn set_band(&mut self, band: usize, setting: f32) {
        if let Some(factor) = self.factors.get_mut(band) {
            *factor = if setting == f32::NEG_INFINITY {
                0.0
            } else {
                setting.clamp(-1.0, 1.0).exp2()
            };
        }
    }

    /// Set a raw gain factor for one band
    pub fn set_factor(&mut self, band: usize, factor: f32) {
        if let Some(slot) = self.factors.get_mut(band) {
            *slot = factor;
        }
    }

    pub fn factor(&self, band: usize) -> f32 {
        self.factors.get(band).copied().unwrap_or(1.0)
    }

    pub fn factors(&self) -> &[f32; SBLIMIT] {
        &self.factors
    }

    pub fn is_flat(&self) -> bool {
        self.factors.iter().all(|&f| f == 1.0)
    }
}

impl Default for Equalizer {
    fn default() -> Self {
        Self::flat()
    }
}

/// Synthesis filter for one output channel
#[derive(Debug, Clone)]
pub struct SynthesisFilter {
    /// Subband samples collected for the next pass
    samples: [f32; SBLIMIT],
    /// V history ring
    history: Box<[f32; HISTORY_LEN]>,
    /// Start of the newest 64-entry block in history
    offset: usize,
    equalizer: [f32; SBLIMIT],
}

impl SynthesisFilter {
    pub fn new() -> Self {
        Self::with_equalizer(&Equalizer::flat())
    }

    pub fn with_equalizer(equalizer: &Equalizer) -> Self {
        Self {
            samples: [0.0; SBLIMIT],
            history: Box::new([0.0; HISTORY_LEN]),
            offset: 0,
            equalizer: *equalizer.factors(),
        }
    }

    pub fn set_equalizer(&mut self, equalizer: &Equalizer) {
        self.equalizer = *equalizer.factors();
    }

    /// Store the sample of `subband` for the next pass
    #[inline]
    pub fn input_sample(&mut self, value: f32, subband: usize) {
        if subband < SBLIMIT {
            self.samples[subband] = value * self.equalizer[subband];
        }
    }

    /// Store all 32 subband samples at once
    pub fn input_samples(&mut self, values: &[f32; SBLIMIT]) {
        for (sb, &value) in values.iter().enumerate() {
            self.input_sample(value, sb);
        }
    }

    /// Samples collected since the last pass
    pub fn pending_samples(&self) -> &[f32; SBLIMIT] {
        &self.samples
    }

    /// Run one synthesis pass over the collected samples.
    ///
    /// Returns 32 PCM values scaled to the 16-bit range and clamped to ±32767.
    /// The collected samples are cleared so that subbands without data in the
    /// next pass contribute silence.
    pub fn calculate_pcm_samples(&mut self) -> [f32; SBLIMIT] {
        self.offset = (self.offset + HISTORY_LEN - 64) % HISTORY_LEN;
        self.matrix();
        let pcm = self.window();
        self.samples = [0.0; SBLIMIT];
        pcm
    }

    /// V[i] = Σ N[i][k] · S[k] into the newest history block
    fn matrix(&mut self) {
        let base = self.offset;
        for (i, row) in MATRIX.iter().enumerate() {
            let mut sum = 0.0f32;
            for (coef, sample) in row.iter().zip(self.samples.iter()) {
                sum += coef * sample;
            }
            self.history[base + i] = sum;
        }
    }

    fn window(&self) -> [f32; SBLIMIT] {
        let mut pcm = [0.0f32; SBLIMIT];
        for (j, out) in pcm.iter_mut().enumerate() {
            let mut sum = 0.0f32;
            for i in 0..8 {
                // U[64i + j] = V[128i + j], U[64i + 32 + j] = V[128i + 96 + j]
                let v_low = self.history[(self.offset + 128 * i + j) % HISTORY_LEN];
                let v_high = self.history[(self.offset + 128 * i + 96 + j) % HISTORY_LEN];
                sum += v_low * SYNTHESIS_WINDOW[64 * i + j];
                sum += v_high * SYNTHESIS_WINDOW[64 * i + 32 + j];
            }
            *out = clamp_pcm(sum * PCM_SCALE);
        }
        pcm
    }

    /// Clear the history. Only for a newly opened stream.
    pub fn reset(&mut self) {
        self.samples = [0.0; SBLIMIT];
        self.history.fill(0.0);
        self.offset = 0;
    }
}

impl Default for SynthesisFilter {
    fn default() -> Self {
        Self::new()
    }
}
