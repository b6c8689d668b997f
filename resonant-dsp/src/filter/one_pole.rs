//! One-pole filters
//!
//! [`OnePoleFilter`] is the multichannel, modulatable member of the filter
//! family. [`OnePoleLowPass`] is a bare single-channel smoother used inside
//! feedback loops (reverb damping, chorus feedback, delay tone).

use std::f32::consts::PI;

use super::{FilterCore, FilterType};
use crate::modulation::{ModulationMatrix, VoiceId};
use crate::util::underflow_clamp;

/// Q is meaningless for a one-pole; accepted and ignored within this range
const Q_RANGE: (f32, f32) = (0.001, 100.0);

/// 6 dB/oct topology-preserving-transform low/high pass
#[derive(Debug, Clone)]
pub struct OnePoleFilter {
    pub(super) core: FilterCore,
    filter_type: FilterType,
    /// G / (1 + G) with G the prewarped cutoff
    a0: f32,
    /// Integrator state per channel
    z1: Vec<f32>,
}

impl OnePoleFilter {
    pub fn new(sample_rate: f32, num_channels: usize) -> Self {
        let core = FilterCore::new(sample_rate, num_channels);
        let mut filter = Self {
            z1: vec![0.0; core.num_channels],
            core,
            filter_type: FilterType::LowPass,
            a0: 0.0,
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
        self.z1 = vec![0.0; self.core.num_channels];
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

    /// LowPass or HighPass; anything else selects LowPass
    pub fn set_filter_type(&mut self, filter_type: FilterType) {
        self.filter_type = match filter_type {
            FilterType::HighPass => FilterType::HighPass,
            _ => FilterType::LowPass,
        };
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn update(&mut self, mod_matrix: Option<&ModulationMatrix>) {
        if self.core.resolve(mod_matrix, Q_RANGE) {
            let g = (PI * self.core.frequency / self.core.sample_rate).tan();
            self.a0 = g / (1.0 + g);
        }
    }

    #[inline]
    fn tick(&mut self, channel: usize, input: f32) -> f32 {
        let z1 = &mut self.z1[channel];
        let vn = (input - *z1) * self.a0;
        let lpf = vn + *z1;
        *z1 = underflow_clamp(vn + lpf);
        match self.filter_type {
            FilterType::HighPass => input - lpf,
            _ => lpf,
        }
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
        self.z1.fill(0.0);
    }
}

/// Single-channel one-pole low pass `y = (1 - g) x + g y[n-1]`
#[derive(Debug, Clone, Copy, Default)]
pub struct OnePoleLowPass {
    /// Feedback coefficient in [0, 1): 0 is a wire
    g: f32,
    z1: f32,
}

impl OnePoleLowPass {
    pub fn new(g: f32) -> Self {
        Self {
            g: g.clamp(0.0, 0.9999),
            z1: 0.0,
        }
    }

    /// Set the pole directly. Larger values darken the signal.
    pub fn set_g(&mut self, g: f32) {
        self.g = g.clamp(0.0, 0.9999);
    }

    /// Place the -3 dB point near `frequency`
    pub fn set_frequency(&mut self, frequency: f32, sample_rate: f32) {
        let g = (-2.0 * PI * frequency.max(0.0) / sample_rate.max(1.0)).exp();
        self.set_g(g);
    }

    pub fn g(&self) -> f32 {
        self.g
    }

    #[inline]
    pub fn process_audio(&mut self, input: f32) -> f32 {
        self.z1 = underflow_clamp((1.0 - self.g) * input + self.g * self.z1);
        self.z1
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
    }
}
