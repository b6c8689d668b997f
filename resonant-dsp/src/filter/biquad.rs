//! Biquad filters (RBJ audio EQ cookbook)

use std::f32::consts::PI;

use super::{FilterCore, FilterType};
use crate::modulation::{ModulationMatrix, VoiceId};
use crate::util::{q_from_bandwidth, underflow_clamp};

const Q_RANGE: (f32, f32) = (0.05, 40.0);

/// Normalised (a0 = 1) biquad coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BiquadCoefficients {
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Cookbook coefficients. `gain_db` only affects EQ and shelf types.
    pub fn new(filter_type: FilterType, sample_rate: f32, frequency: f32, q: f32, gain_db: f32) -> Self {
        let omega = 2.0 * PI * frequency / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * q.max(Q_RANGE.0));
        let a = 10.0f32.powf(gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match filter_type {
            FilterType::LowPass => {
                let b1 = 1.0 - cos_omega;
                (0.5 * b1, b1, 0.5 * b1, 1.0 + alpha, -2.0 * cos_omega, 1.0 - alpha)
            }
            FilterType::HighPass => {
                let b1 = -(1.0 + cos_omega);
                (-0.5 * b1, b1, -0.5 * b1, 1.0 + alpha, -2.0 * cos_omega, 1.0 - alpha)
            }
            FilterType::BandPass => (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_omega, 1.0 - alpha),
            FilterType::BandStop => (
                1.0,
                -2.0 * cos_omega,
                1.0,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
            FilterType::AllPass => (
                1.0 - alpha,
                -2.0 * cos_omega,
                1.0 + alpha,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
            FilterType::ParametricEq => (
                1.0 + alpha * a,
                -2.0 * cos_omega,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_omega,
                1.0 - alpha / a,
            ),
            FilterType::LowShelf => {
                let sq = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_omega + sq),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega),
                    a * ((a + 1.0) - (a - 1.0) * cos_omega - sq),
                    (a + 1.0) + (a - 1.0) * cos_omega + sq,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_omega),
                    (a + 1.0) + (a - 1.0) * cos_omega - sq,
                )
            }
            FilterType::HighShelf => {
                let sq = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_omega + sq),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega),
                    a * ((a + 1.0) + (a - 1.0) * cos_omega - sq),
                    (a + 1.0) - (a - 1.0) * cos_omega + sq,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_omega),
                    (a + 1.0) - (a - 1.0) * cos_omega - sq,
                )
            }
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Single-channel direct form I biquad section
#[derive(Debug, Clone, Copy, Default)]
pub struct Biquad {
    pub coeffs: BiquadCoefficients,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    pub fn new(coeffs: BiquadCoefficients) -> Self {
        Self {
            coeffs,
            ..Self::default()
        }
    }

    #[inline]
    pub fn process_audio(&mut self, input: f32) -> f32 {
        let c = &self.coeffs;
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = underflow_clamp(output);

        output
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// Multichannel modulatable biquad
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    pub(super) core: FilterCore,
    filter_type: FilterType,
    gain_db: f32,
    enabled: bool,
    sections: Vec<Biquad>,
}

impl BiquadFilter {
    pub fn new(sample_rate: f32, num_channels: usize) -> Self {
        let core = FilterCore::new(sample_rate, num_channels);
        let mut filter = Self {
            sections: vec![Biquad::default(); core.num_channels],
            core,
            filter_type: FilterType::LowPass,
            gain_db: 0.0,
            enabled: true,
        };
        filter.update(None);
        filter
    }

    pub fn init(
        &mut self,
        sample_rate: f32,
        num_channels: usize,
        voice_id: VoiceId,
        mod_matrix: Option<&mut ModulationMatrix>,
    ) {
        self.core.init(sample_rate, num_channels, voice_id, mod_matrix);
        self.sections = vec![Biquad::default(); self.core.num_channels];
        self.update(None);
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.core.set_frequency(frequency);
    }

    pub fn set_frequency_mod(&mut self, semitones: f32) {
        self.core.set_frequency_mod(semitones);
    }

    pub fn set_q(&mut self, q: f32) {
        self.core.set_q(q, Q_RANGE);
    }

    pub fn set_q_mod(&mut self, q_mod: f32) {
        self.core.set_q_mod(q_mod);
    }

    /// Set bandwidth in octaves (converted to Q)
    pub fn set_bandwidth(&mut self, octaves: f32) {
        self.set_q(q_from_bandwidth(octaves));
    }

    /// Set boost/cut for EQ and shelf types
    pub fn set_gain_db(&mut self, gain_db: f32) {
        let gain_db = gain_db.clamp(-48.0, 48.0);
        if gain_db != self.gain_db {
            self.gain_db = gain_db;
            self.core.dirty = true;
        }
    }

    pub fn set_filter_type(&mut self, filter_type: FilterType) {
        if filter_type != self.filter_type {
            self.filter_type = filter_type;
            self.core.dirty = true;
        }
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    /// Disabled filters copy input to output
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn update(&mut self, mod_matrix: Option<&ModulationMatrix>) {
        if self.core.resolve(mod_matrix, Q_RANGE) {
            let coeffs = BiquadCoefficients::new(
                self.filter_type,
                self.core.sample_rate,
                self.core.frequency,
                self.core.q,
                self.gain_db,
            );
            for section in &mut self.sections {
                section.coeffs = coeffs;
            }
        }
    }

    pub fn process_audio(&mut self, input: &[f32], output: &mut [f32]) {
        if !self.enabled {
            let n = input.len().min(output.len());
            output[..n].copy_from_slice(&input[..n]);
            return;
        }
        let num_channels = self.core.num_channels;
        for (in_frame, out_frame) in input
            .chunks_exact(num_channels)
            .zip(output.chunks_exact_mut(num_channels))
        {
            for ((out, &x), section) in out_frame.iter_mut().zip(in_frame).zip(&mut self.sections) {
                *out = section.process_audio(x);
            }
        }
    }

    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::sine_gain;
    use super::*;
    use crate::util::convert_to_decibels;

    fn gain_db(filter_type: FilterType, frequency: f32, gain: f32, probe: f32) -> f32 {
        let mut filter = BiquadFilter::new(48000.0, 1);
        filter.set_filter_type(filter_type);
        filter.set_frequency(frequency);
        filter.set_q(0.707);
        filter.set_gain_db(gain);
        filter.update(None);
        convert_to_decibels(sine_gain(
            |x| {
                let mut out = [0.0];
                filter.process_audio(&[x], &mut out);
                out[0]
            },
            48000.0,
            probe,
        ))
    }

    #[test]
    fn test_parametric_eq_boosts_centre() {
        let g = gain_db(FilterType::ParametricEq, 1000.0, 6.0, 1000.0);
        assert!((g - 6.0).abs() < 0.3, "gain {}", g);
        assert!(gain_db(FilterType::ParametricEq, 1000.0, 6.0, 40.0).abs() < 0.5);
    }

    #[test]
    fn test_shelves() {
        assert!((gain_db(FilterType::LowShelf, 500.0, -12.0, 30.0) + 12.0).abs() < 0.5);
        assert!(gain_db(FilterType::LowShelf, 500.0, -12.0, 15000.0).abs() < 0.5);
        assert!((gain_db(FilterType::HighShelf, 2000.0, 9.0, 18000.0) - 9.0).abs() < 0.7);
    }

    #[test]
    fn test_all_pass_is_flat() {
        for probe in [100.0, 1000.0, 8000.0] {
            assert!(gain_db(FilterType::AllPass, 1000.0, 0.0, probe).abs() < 0.1);
        }
    }

    #[test]
    fn test_band_stop_notch() {
        assert!(gain_db(FilterType::BandStop, 1000.0, 0.0, 1000.0) < -30.0);
    }

    #[test]
    fn test_disabled_is_bypass() {
        let mut filter = BiquadFilter::new(48000.0, 2);
        filter.set_enabled(false);
        let input = [0.3, -0.2, 0.9, 0.1];
        let mut output = [0.0; 4];
        filter.process_audio(&input, &mut output);
        assert_eq!(input, output);
    }

    #[test]
    fn test_bandwidth_maps_to_q() {
        let mut filter = BiquadFilter::new(48000.0, 1);
        filter.set_bandwidth(1.0);
        filter.update(None);
        assert!((filter.core.q - std::f32::consts::SQRT_2).abs() < 1e-3);
    }
}
