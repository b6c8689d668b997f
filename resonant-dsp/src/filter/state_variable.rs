//! State Variable Filter (SVF)
//!
//! Zavalishin's trapezoidal-integration SVF: stable under fast modulation,
//! with LP/HP/BP outputs computed together and a band stop blended from the
//! LP and HP outputs.

use std::f32::consts::PI;

use super::{FilterCore, FilterType};
use crate::modulation::{ModulationMatrix, VoiceId};
use crate::util::{fast_tanh, underflow_clamp};

const Q_RANGE: (f32, f32) = (0.5, 20.0);

#[derive(Debug, Clone, Copy, Default)]
struct SvfState {
    z1_1: f32,
    z1_2: f32,
}

/// Two-integrator TPT filter
#[derive(Debug, Clone)]
pub struct StateVariableFilter {
    pub(super) core: FilterCore,
    filter_type: FilterType,
    /// Blend for the band stop output: 0 = all LP, 1 = all HP
    band_stop_control: f32,
    /// Soft-clip the band-pass integrator input
    saturation: bool,

    // Coefficients (recalculated in update)
    g: f32,
    r: f32,
    input_scale: f32,

    states: Vec<SvfState>,
}

impl StateVariableFilter {
    pub fn new(sample_rate: f32, num_channels: usize) -> Self {
        let core = FilterCore::new(sample_rate, num_channels);
        let mut filter = Self {
            states: vec![SvfState::default(); core.num_channels],
            core,
            filter_type: FilterType::LowPass,
            band_stop_control: 0.5,
            saturation: false,
            g: 0.0,
            r: 0.0,
            input_scale: 0.0,
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
        self.states = vec![SvfState::default(); self.core.num_channels];
        self.update(None);
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.core.set_frequency(frequency);
    }

    pub fn set_frequency_mod(&mut self, semitones: f32) {
        self.core.set_frequency_mod(semitones);
    }

    /// Set Q (0.5-20)
    pub fn set_q(&mut self, q: f32) {
        self.core.set_q(q, Q_RANGE);
    }

    pub fn set_q_mod(&mut self, q_mod: f32) {
        self.core.set_q_mod(q_mod);
    }

    /// LowPass, HighPass, BandPass or BandStop; anything else selects LowPass
    pub fn set_filter_type(&mut self, filter_type: FilterType) {
        self.filter_type = match filter_type {
            FilterType::HighPass | FilterType::BandPass | FilterType::BandStop => filter_type,
            _ => FilterType::LowPass,
        };
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    /// Band stop blend (0-1)
    pub fn set_band_stop_control(&mut self, control: f32) {
        self.band_stop_control = control.clamp(0.0, 1.0);
    }

    pub fn band_stop_control(&self) -> f32 {
        self.band_stop_control
    }

    pub fn set_saturation(&mut self, enabled: bool) {
        self.saturation = enabled;
    }

    pub fn update(&mut self, mod_matrix: Option<&ModulationMatrix>) {
        if self.core.resolve(mod_matrix, Q_RANGE) {
            self.g = (PI * self.core.frequency / self.core.sample_rate).tan();
            self.r = 1.0 / (2.0 * self.core.q);
            self.input_scale = 1.0 / (1.0 + 2.0 * self.r * self.g + self.g * self.g);
        }
    }

    #[inline]
    fn tick(&mut self, channel: usize, input: f32) -> f32 {
        let (g, r) = (self.g, self.r);
        let state = &mut self.states[channel];

        let hpf = self.input_scale * (input - (2.0 * r + g) * state.z1_1 - state.z1_2);

        let mut bpf = g * hpf + state.z1_1;
        if self.saturation {
            bpf = fast_tanh(bpf);
        }
        let lpf = g * bpf + state.z1_2;

        state.z1_1 = underflow_clamp(g * hpf + bpf);
        state.z1_2 = underflow_clamp(g * bpf + lpf);

        match self.filter_type {
            FilterType::HighPass => hpf,
            FilterType::BandPass => bpf,
            FilterType::BandStop => {
                self.band_stop_control * hpf + (1.0 - self.band_stop_control) * lpf
            }
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
        self.states.fill(SvfState::default());
    }
}
