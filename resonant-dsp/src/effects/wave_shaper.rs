//! Arctangent waveshaper

use super::{clamp_channels, Effect};

/// Shaper amount range
const MIN_AMOUNT: f32 = 0.0001;
const MAX_AMOUNT: f32 = 500.0;

/// `out = gain * atan(a x) / atan(a)`
///
/// Normalised so a full-scale input stays at full scale for every amount.
pub struct WaveShaper {
    num_channels: usize,
    amount: f32,
    /// 1 / atan(amount), cached
    normalize: f32,
    output_gain: f32,
}

impl WaveShaper {
    pub fn new(num_channels: usize) -> Self {
        let mut shaper = Self {
            num_channels: clamp_channels(num_channels),
            amount: 1.0,
            normalize: 1.0,
            output_gain: 1.0,
        };
        shaper.set_amount(1.0);
        shaper
    }

    /// Set drive amount (0.0001 - 500)
    pub fn set_amount(&mut self, amount: f32) {
        self.amount = amount.clamp(MIN_AMOUNT, MAX_AMOUNT);
        self.normalize = 1.0 / self.amount.atan();
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    /// Set linear output gain
    pub fn set_output_gain(&mut self, gain: f32) {
        self.output_gain = gain.max(0.0);
    }

    #[inline]
    pub fn process_sample(&self, x: f32) -> f32 {
        self.output_gain * (self.amount * x).atan() * self.normalize
    }
}

impl Effect for WaveShaper {
    fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
        for (out, &x) in output.iter_mut().zip(input).take(self.num_channels) {
            *out = self.process_sample(x);
        }
    }

    fn reset(&mut self) {}

    fn num_channels(&self) -> usize {
        self.num_channels
    }

    fn name(&self) -> &'static str {
        "WaveShaper"
    }
}
