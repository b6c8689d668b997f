//! Six-stage stereo phaser
//!
//! Each channel runs a cascade of all-pass biquads whose centre frequencies
//! are swept together by one LFO. Every stage sweeps its own log-spaced
//! range, and the stage coefficients are only recomputed once every
//! [`CONTROL_RATE`] samples. With quadrature on, the right channel follows
//! the LFO's quarter-cycle output for a wider image.

use std::sync::Arc;

use super::Effect;
use crate::filter::{Biquad, BiquadCoefficients, FilterType};
use crate::osc::{Lfo, LfoType};
use crate::util::{log_frequency_clamped, underflow_clamp, unipolar, Params};

/// All-pass stages per channel
pub const NUM_STAGES: usize = 6;

/// Samples between coefficient updates
pub const CONTROL_RATE: usize = 256;

/// Sweep range of each stage in Hz
const STAGE_FREQUENCY_RANGES: [(f32, f32); NUM_STAGES] = [
    (16.0, 1600.0),
    (33.0, 3300.0),
    (48.0, 4800.0),
    (98.0, 9800.0),
    (160.0, 16000.0),
    (260.0, 20480.0),
];

/// All-pass stage Q
const STAGE_Q: f32 = 0.707;

const MAX_FEEDBACK: f32 = 0.99;
const MAX_LFO_FREQUENCY: f32 = 5.0;

/// Control-thread settings for [`Phaser`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaserSettings {
    /// LFO rate in Hz (0 - 5)
    pub frequency: f32,
    /// Sweep depth (0.0 - 1.0)
    pub depth: f32,
    /// Feedback from the last stage (0.0 - 0.99)
    pub feedback: f32,
    /// Level of the phased signal added to the dry input (0.0 - 1.0)
    pub wet_level: f32,
    pub quadrature: bool,
}

impl Default for PhaserSettings {
    fn default() -> Self {
        Self {
            frequency: 0.2,
            depth: 0.8,
            feedback: 0.4,
            wet_level: 0.5,
            quadrature: false,
        }
    }
}

/// Stereo phaser effect
pub struct Phaser {
    sample_rate: f32,
    stages: [[Biquad; NUM_STAGES]; 2],
    feedback_state: [f32; 2],
    lfo: Lfo,
    /// Latest (normal, quadrature) LFO values
    lfo_values: (f32, f32),
    control_counter: usize,
    settings: PhaserSettings,
    params: Arc<Params<PhaserSettings>>,
}

impl Phaser {
    /// Create a new phaser with default settings
    pub fn new(sample_rate: f32) -> Self {
        let sample_rate = sample_rate.max(1.0);
        let mut lfo = Lfo::new(sample_rate);
        lfo.set_type(LfoType::Sine);
        lfo.start();

        let mut phaser = Self {
            sample_rate,
            stages: [[Biquad::default(); NUM_STAGES]; 2],
            feedback_state: [0.0; 2],
            lfo,
            lfo_values: (0.0, 0.0),
            control_counter: 0,
            settings: PhaserSettings::default(),
            params: Arc::new(Params::new()),
        };
        phaser.apply_settings(PhaserSettings::default());
        phaser
    }

    /// Handle for pushing settings from another thread
    pub fn params_handle(&self) -> Arc<Params<PhaserSettings>> {
        Arc::clone(&self.params)
    }

    pub fn settings(&self) -> &PhaserSettings {
        &self.settings
    }

    /// Apply settings on this thread
    pub fn apply_settings(&mut self, settings: PhaserSettings) {
        self.settings = PhaserSettings {
            frequency: settings.frequency.clamp(0.0, MAX_LFO_FREQUENCY),
            depth: settings.depth.clamp(0.0, 1.0),
            feedback: settings.feedback.clamp(0.0, MAX_FEEDBACK),
            wet_level: settings.wet_level.clamp(0.0, 1.0),
            quadrature: settings.quadrature,
        };
        self.lfo.set_frequency(self.settings.frequency);
        self.lfo.update(None);
        // Pick up new depth on the next sample
        self.control_counter = 0;
    }

    /// Set LFO rate in Hz (0 - 5)
    pub fn set_frequency(&mut self, frequency: f32) {
        self.apply_settings(PhaserSettings { frequency, ..self.settings });
    }

    /// Set sweep depth (0.0 - 1.0)
    pub fn set_depth(&mut self, depth: f32) {
        self.apply_settings(PhaserSettings { depth, ..self.settings });
    }

    /// Set feedback (0.0 - 0.99)
    pub fn set_feedback(&mut self, feedback: f32) {
        self.apply_settings(PhaserSettings { feedback, ..self.settings });
    }

    /// Set wet level (0.0 - 1.0)
    pub fn set_wet_level(&mut self, wet_level: f32) {
        self.apply_settings(PhaserSettings { wet_level, ..self.settings });
    }

    pub fn set_quadrature(&mut self, quadrature: bool) {
        self.apply_settings(PhaserSettings { quadrature, ..self.settings });
    }

    /// Centre frequency of one stage for a bipolar LFO value
    fn stage_frequency(&self, stage: usize, lfo_value: f32) -> f32 {
        let sweep = unipolar(lfo_value) * self.settings.depth;
        let (lo, hi) = STAGE_FREQUENCY_RANGES[stage];
        let max = 0.45 * self.sample_rate;
        log_frequency_clamped(sweep, (0.0, 1.0), (lo.min(max), hi.min(max)))
    }

    /// Current centre frequency of `stage` on `channel`
    pub fn current_stage_frequency(&self, channel: usize, stage: usize) -> f32 {
        let value = if channel == 1 && self.settings.quadrature {
            self.lfo_values.1
        } else {
            self.lfo_values.0
        };
        self.stage_frequency(stage, value)
    }

    fn update_coefficients(&mut self) {
        for channel in 0..2 {
            for stage in 0..NUM_STAGES {
                let frequency = self.current_stage_frequency(channel, stage);
                self.stages[channel][stage].coeffs =
                    BiquadCoefficients::new(FilterType::AllPass, self.sample_rate, frequency, STAGE_Q, 0.0);
            }
        }
    }
}

impl Effect for Phaser {
    fn prepare_block(&mut self) {
        if let Some(settings) = self.params.get_if_changed() {
            self.apply_settings(settings);
        }
    }

    fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
        self.lfo_values = self.lfo.generate_with_quad();
        if self.control_counter == 0 {
            self.update_coefficients();
        }
        self.control_counter = (self.control_counter + 1) % CONTROL_RATE;

        let feedback = self.settings.feedback;
        let wet = self.settings.wet_level;
        for channel in 0..2 {
            let x = input[channel];
            let mut y = x + feedback * self.feedback_state[channel];
            for stage in &mut self.stages[channel] {
                y = stage.process_audio(y);
            }
            self.feedback_state[channel] = underflow_clamp(y);
            output[channel] = x + wet * y;
        }
    }

    fn reset(&mut self) {
        for stage in self.stages.iter_mut().flatten() {
            stage.reset();
        }
        self.feedback_state = [0.0; 2];
        self.control_counter = 0;
    }

    fn num_channels(&self) -> usize {
        2
    }

    fn name(&self) -> &'static str {
        "Phaser"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_frequencies_within_ranges() {
        let mut phaser = Phaser::new(48000.0);
        phaser.set_depth(1.0);
        phaser.set_frequency(2.0);
        let mut out = [0.0; 2];
        for n in 0..24000 {
            phaser.process_frame(&[0.0, 0.0], &mut out);
            if n % CONTROL_RATE == 0 {
                for stage in 0..NUM_STAGES {
                    let f = phaser.current_stage_frequency(0, stage);
                    let (lo, hi) = STAGE_FREQUENCY_RANGES[stage];
                    assert!(f >= lo - 1e-2 && f <= hi.min(21600.0) + 1.0, "stage {} at {}", stage, f);
                }
            }
        }
    }

    #[test]
    fn test_zero_depth_pins_lowest_frequencies() {
        let mut phaser = Phaser::new(48000.0);
        phaser.set_depth(0.0);
        let mut out = [0.0; 2];
        phaser.process_frame(&[0.0, 0.0], &mut out);
        for stage in 0..NUM_STAGES {
            let f = phaser.current_stage_frequency(0, stage);
            assert!((f - STAGE_FREQUENCY_RANGES[stage].0).abs() < 1e-2);
        }
    }

    #[test]
    fn test_allpass_cascade_preserves_energy() {
        let mut phaser = Phaser::new(48000.0);
        phaser.set_feedback(0.0);
        phaser.set_wet_level(1.0);
        phaser.set_frequency(0.0);
        let mut input = vec![0.0f32; 2 * 8192];
        input[0] = 1.0;
        let mut output = vec![0.0f32; input.len()];
        phaser.process(&input, &mut output);
        // Remove the dry impulse, leaving the all-pass response
        output[0] -= 1.0;
        let energy: f32 = output.iter().step_by(2).map(|s| s * s).sum();
        assert!((energy - 1.0).abs() < 0.01, "{}", energy);
    }

    #[test]
    fn test_quadrature_separates_channels() {
        let mut phaser = Phaser::new(48000.0);
        phaser.set_quadrature(true);
        let mut out = [0.0; 2];
        phaser.process_frame(&[0.0, 0.0], &mut out);
        let left = phaser.current_stage_frequency(0, 0);
        let right = phaser.current_stage_frequency(1, 0);
        assert!((left - right).abs() > 1.0);
    }
}
