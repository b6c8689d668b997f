//! Foldback distortion: signal above the threshold is reflected back down

use super::{clamp_channels, Effect};
use crate::util::convert_to_linear;

pub struct FoldbackDistortion {
    num_channels: usize,
    threshold: f32,
    input_gain: f32,
    output_gain: f32,
}

impl FoldbackDistortion {
    pub fn new(num_channels: usize) -> Self {
        Self {
            num_channels: clamp_channels(num_channels),
            threshold: 0.5,
            input_gain: 1.0,
            output_gain: 1.0,
        }
    }

    /// Set fold threshold in dB (at most 0 dB)
    pub fn set_threshold_db(&mut self, db: f32) {
        self.threshold = convert_to_linear(db.min(0.0)).max(1.0e-4);
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_input_gain_db(&mut self, db: f32) {
        self.input_gain = convert_to_linear(db);
    }

    pub fn set_output_gain_db(&mut self, db: f32) {
        self.output_gain = convert_to_linear(db);
    }

    #[inline]
    pub fn process_sample(&self, x: f32) -> f32 {
        let t = self.threshold;
        let x = x * self.input_gain;
        let y = if x > t || x < -t {
            ((x - t).rem_euclid(4.0 * t) - 2.0 * t).abs() - t
        } else {
            x
        };
        y * self.output_gain
    }
}

impl Effect for FoldbackDistortion {
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
        "Foldback"
    }
}
