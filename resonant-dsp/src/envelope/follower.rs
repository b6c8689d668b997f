//! Envelope follower for level detection

use crate::util::{msec_to_samples, underflow_clamp};

/// Time-constant log for analog mode: reach 63.2% in the set time
const ANALOG_TIME_CONSTANT: f32 = -0.999_672_3; // ln(0.368)
/// Time-constant log for digital mode: reach 99% in the set time
const DIGITAL_TIME_CONSTANT: f32 = -4.605_17; // ln(0.01)

/// What the follower tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeakMode {
    MeanSquared,
    RootMeanSquared,
    #[default]
    Peak,
}

/// One-pole attack/release level detector
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    sample_rate: f32,
    attack_msec: f32,
    release_msec: f32,
    attack_coeff: f32,
    release_coeff: f32,
    mode: PeakMode,
    analog: bool,
    /// Smoothed detector state (squared for the MS/RMS modes)
    state: f32,
    current_value: f32,
}

impl EnvelopeFollower {
    pub fn new(sample_rate: f32, attack_msec: f32, release_msec: f32, mode: PeakMode, analog: bool) -> Self {
        let mut follower = Self {
            sample_rate: sample_rate.max(1.0),
            attack_msec,
            release_msec,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            mode,
            analog,
            state: 0.0,
            current_value: 0.0,
        };
        follower.update_coefficients();
        follower
    }

    pub fn init(&mut self, sample_rate: f32, attack_msec: f32, release_msec: f32, mode: PeakMode, analog: bool) {
        *self = Self::new(sample_rate, attack_msec, release_msec, mode, analog);
    }

    fn time_to_coeff(&self, msec: f32) -> f32 {
        let samples = msec_to_samples(msec, self.sample_rate);
        if samples < 1.0 {
            return 0.0;
        }
        let tc = if self.analog {
            ANALOG_TIME_CONSTANT
        } else {
            DIGITAL_TIME_CONSTANT
        };
        (tc / samples).exp()
    }

    fn update_coefficients(&mut self) {
        self.attack_coeff = self.time_to_coeff(self.attack_msec);
        self.release_coeff = self.time_to_coeff(self.release_msec);
    }

    pub fn set_attack_time(&mut self, msec: f32) {
        self.attack_msec = msec.max(0.0);
        self.attack_coeff = self.time_to_coeff(self.attack_msec);
    }

    pub fn set_release_time(&mut self, msec: f32) {
        self.release_msec = msec.max(0.0);
        self.release_coeff = self.time_to_coeff(self.release_msec);
    }

    pub fn set_mode(&mut self, mode: PeakMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> PeakMode {
        self.mode
    }

    pub fn set_analog(&mut self, analog: bool) {
        if analog != self.analog {
            self.analog = analog;
            self.update_coefficients();
        }
    }

    /// Feed one sample, return the tracked level
    #[inline]
    pub fn process_audio(&mut self, input: f32) -> f32 {
        let x = match self.mode {
            PeakMode::MeanSquared | PeakMode::RootMeanSquared => input * input,
            PeakMode::Peak => input.abs(),
        };
        let coeff = if x > self.state {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.state = underflow_clamp(coeff * (self.state - x) + x);
        self.current_value = match self.mode {
            PeakMode::RootMeanSquared => self.state.sqrt(),
            _ => self.state,
        };
        self.current_value
    }

    pub fn current_value(&self) -> f32 {
        self.current_value
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
        self.current_value = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_tracks_step() {
        let mut follower = EnvelopeFollower::new(1000.0, 10.0, 100.0, PeakMode::Peak, true);
        let mut value = 0.0;
        for _ in 0..10 {
            value = follower.process_audio(-1.0);
        }
        // One time constant: ~63%
        assert!((value - 0.632).abs() < 0.01, "value {}", value);
    }

    #[test]
    fn test_digital_reaches_99_percent() {
        let mut follower = EnvelopeFollower::new(1000.0, 10.0, 100.0, PeakMode::Peak, false);
        let mut value = 0.0;
        for _ in 0..10 {
            value = follower.process_audio(1.0);
        }
        assert!((value - 0.99).abs() < 0.002, "value {}", value);
    }

    #[test]
    fn test_rms_of_sine() {
        let mut follower = EnvelopeFollower::new(48000.0, 50.0, 50.0, PeakMode::RootMeanSquared, true);
        for n in 0..48000 {
            follower.process_audio((2.0 * std::f32::consts::PI * 1000.0 * n as f32 / 48000.0).sin());
        }
        assert!((follower.current_value() - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.05);
    }

    #[test]
    fn test_release_slower_than_attack() {
        let mut follower = EnvelopeFollower::new(1000.0, 1.0, 200.0, PeakMode::Peak, true);
        for _ in 0..50 {
            follower.process_audio(1.0);
        }
        for _ in 0..20 {
            follower.process_audio(0.0);
        }
        assert!(follower.current_value() > 0.85);
        follower.reset();
        assert_eq!(follower.current_value(), 0.0);
    }

    #[test]
    fn test_zero_time_is_instant() {
        let mut follower = EnvelopeFollower::new(48000.0, 0.0, 0.0, PeakMode::Peak, true);
        assert_eq!(follower.process_audio(0.5), 0.5);
        assert_eq!(follower.process_audio(0.1), 0.1);
    }
}
