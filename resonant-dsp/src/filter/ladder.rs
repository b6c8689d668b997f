//! Moog-style 4-pole ladder filter
//!
//! Four cascaded TPT one-pole stages with a zero-delay resonance feedback
//! loop. Mixing the stage outputs gives 2/4-pole low, band and high pass
//! responses from the same ladder.

use std::f32::consts::PI;

use super::{FilterCore, FilterType};
use crate::modulation::{ModulationMatrix, VoiceId};
use crate::util::{fast_tanh, underflow_clamp};

/// Ladder Q range; Q = 10 reaches self-oscillation (K = 4)
const Q_RANGE: (f32, f32) = (1.0, 10.0);

/// Stage output mix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LadderMode {
    LowPass2,
    #[default]
    LowPass4,
    BandPass2,
    BandPass4,
    HighPass2,
    HighPass4,
}

impl LadderMode {
    /// Weights for [input, stage1, stage2, stage3, stage4]
    const fn weights(self) -> [f32; 5] {
        match self {
            LadderMode::LowPass2 => [0.0, 0.0, 1.0, 0.0, 0.0],
            LadderMode::LowPass4 => [0.0, 0.0, 0.0, 0.0, 1.0],
            LadderMode::BandPass2 => [0.0, 2.0, -2.0, 0.0, 0.0],
            LadderMode::BandPass4 => [0.0, 0.0, 4.0, -8.0, 4.0],
            LadderMode::HighPass2 => [1.0, -2.0, 1.0, 0.0, 0.0],
            LadderMode::HighPass4 => [1.0, -4.0, 6.0, -4.0, 1.0],
        }
    }

    fn filter_type(self) -> FilterType {
        match self {
            LadderMode::LowPass2 | LadderMode::LowPass4 => FilterType::LowPass,
            LadderMode::BandPass2 | LadderMode::BandPass4 => FilterType::BandPass,
            LadderMode::HighPass2 | LadderMode::HighPass4 => FilterType::HighPass,
        }
    }
}

/// Moog-style ladder filter
#[derive(Debug, Clone)]
pub struct LadderFilter {
    pub(super) core: FilterCore,
    mode: LadderMode,
    /// Passband gain compensation (0-1)
    passband_gain_compensation: f32,
    /// Input saturation (0-1)
    drive: f32,

    // Coefficients (recalculated in update)
    big_g: f32,
    /// Weights of each stage state in the feedback estimate
    betas: [f32; 4],
    alpha0: f32,
    k: f32,

    /// Per-channel integrator state of the four stages
    states: Vec<[f32; 4]>,
}

impl LadderFilter {
    pub fn new(sample_rate: f32, num_channels: usize) -> Self {
        let core = FilterCore::new(sample_rate, num_channels);
        let mut filter = Self {
            states: vec![[0.0; 4]; core.num_channels],
            core,
            mode: LadderMode::LowPass4,
            passband_gain_compensation: 0.0,
            drive: 0.0,
            big_g: 0.0,
            betas: [0.0; 4],
            alpha0: 1.0,
            k: 0.0,
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
        self.states = vec![[0.0; 4]; self.core.num_channels];
        self.update(None);
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.core.set_frequency(frequency);
    }

    pub fn set_frequency_mod(&mut self, semitones: f32) {
        self.core.set_frequency_mod(semitones);
    }

    /// Set Q (clamped to 1-10)
    pub fn set_q(&mut self, q: f32) {
        self.core.set_q(q, Q_RANGE);
    }

    pub fn set_q_mod(&mut self, q_mod: f32) {
        self.core.set_q_mod(q_mod);
    }

    /// Map a generic type onto the 4-pole mix of that shape
    pub fn set_filter_type(&mut self, filter_type: FilterType) {
        self.mode = match filter_type {
            FilterType::HighPass => LadderMode::HighPass4,
            FilterType::BandPass => LadderMode::BandPass4,
            _ => LadderMode::LowPass4,
        };
    }

    pub fn filter_type(&self) -> FilterType {
        self.mode.filter_type()
    }

    pub fn set_mode(&mut self, mode: LadderMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> LadderMode {
        self.mode
    }

    /// Restore passband level lost to resonance (0-1)
    pub fn set_passband_gain_compensation(&mut self, amount: f32) {
        self.passband_gain_compensation = amount.clamp(0.0, 1.0);
    }

    /// Set drive (input saturation, 0.0-1.0)
    pub fn set_drive(&mut self, drive: f32) {
        self.drive = drive.clamp(0.0, 1.0);
    }

    /// Resonance feedback gain derived from the current Q
    pub fn feedback_k(&self) -> f32 {
        self.k
    }

    pub fn update(&mut self, mod_matrix: Option<&ModulationMatrix>) {
        if !self.core.resolve(mod_matrix, Q_RANGE) {
            return;
        }
        let g = (PI * self.core.frequency / self.core.sample_rate).tan();
        let big_g = g / (1.0 + g);
        let one_over = 1.0 / (1.0 + g);

        self.big_g = big_g;
        self.betas = [
            big_g * big_g * big_g * one_over,
            big_g * big_g * one_over,
            big_g * one_over,
            one_over,
        ];
        self.k = 4.0 * (self.core.q - 1.0) / 9.0;
        self.alpha0 = 1.0 / (1.0 + self.k * big_g * big_g * big_g * big_g);
    }

    #[inline]
    fn tick(&mut self, channel: usize, input: f32) -> f32 {
        let big_g = self.big_g;
        let state = &mut self.states[channel];

        let input = if self.drive > 0.001 {
            fast_tanh(input * (1.0 + self.drive * 3.0))
        } else {
            input
        };

        // Zero-delay feedback estimate from current stage states
        let sigma: f32 = self
            .betas
            .iter()
            .zip(state.iter())
            .map(|(beta, s)| beta * s)
            .sum();

        let compensated = input * (1.0 + self.passband_gain_compensation * self.k);
        let u = (compensated - self.k * sigma) * self.alpha0;

        let mut stage_in = u;
        let mut stages = [0.0f32; 4];
        for (out, s) in stages.iter_mut().zip(state.iter_mut()) {
            let vn = (stage_in - *s) * big_g;
            let lpf = vn + *s;
            *s = underflow_clamp(vn + lpf);
            *out = lpf;
            stage_in = lpf;
        }

        let w = self.mode.weights();
        w[0] * u + w[1] * stages[0] + w[2] * stages[1] + w[3] * stages[2] + w[4] * stages[3]
    }

    pub fn process_audio(&mut self, input: &[f32], output: &mut [f32]) {
        let num_channels = self.core.num_channels;
        for (in_frame, out_frame) in input
            .chunks_exact(num_channels)
            .zip(output.chunks_exact_mut(num_channels))
        {
            for channel in 0..num_channels {
                out_frame[channel] = self.tick(channel, in_frame[channel]);
            }
        }
    }

    pub fn reset(&mut self) {
        self.states.fill([0.0; 4]);
    }
}
