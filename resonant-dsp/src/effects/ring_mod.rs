//! Ring modulation against an internal oscillator

use super::{clamp_channels, Effect};
use crate::osc::{Osc, OscType};

/// Multiplies the input with a modulator oscillator.
///
/// `out = x * (1 - |depth|) + x * m * depth`
pub struct RingModulation {
    num_channels: usize,
    osc: Osc,
    /// Modulation depth (-1.0 - 1.0)
    depth: f32,
}

impl RingModulation {
    pub fn new(sample_rate: f32, num_channels: usize) -> Self {
        let mut osc = Osc::new(sample_rate, OscType::Sine);
        osc.set_frequency(100.0);
        osc.update(None);
        osc.start();
        Self {
            num_channels: clamp_channels(num_channels),
            osc,
            depth: 0.5,
        }
    }

    /// Set modulator waveform
    pub fn set_modulator_type(&mut self, osc_type: OscType) {
        self.osc.set_type(osc_type);
    }

    /// Set modulator frequency in Hz
    pub fn set_modulator_frequency(&mut self, frequency: f32) {
        self.osc.set_frequency(frequency.max(0.0));
        self.osc.update(None);
    }

    pub fn modulator_frequency(&self) -> f32 {
        self.osc.base.frequency()
    }

    /// Set modulation depth (-1.0 - 1.0)
    pub fn set_depth(&mut self, depth: f32) {
        self.depth = depth.clamp(-1.0, 1.0);
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }
}

impl Effect for RingModulation {
    fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
        let modulator = self.osc.generate();
        let dry = 1.0 - self.depth.abs();
        for (out, &x) in output.iter_mut().zip(input).take(self.num_channels) {
            *out = x * dry + x * modulator * self.depth;
        }
    }

    fn reset(&mut self) {
        self.osc.reset();
    }

    fn num_channels(&self) -> usize {
        self.num_channels
    }

    fn name(&self) -> &'static str {
        "RingModulation"
    }
}
