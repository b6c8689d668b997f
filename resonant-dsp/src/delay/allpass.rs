//! Delay-based all-pass diffuser

use super::DelayLine;
use crate::util::{msec_to_samples, underflow_clamp};

/// Schroeder all-pass built on a [`DelayLine`]:
///
/// ```text
/// w(n) = x(n) + g * w(n - D)
/// y(n) = -g * w(n) + w(n - D)
/// ```
#[derive(Debug, Clone)]
pub struct DelayApf {
    delay: DelayLine,
    g: f32,
}

impl DelayApf {
    pub fn new(sample_rate: f32, max_length_sec: f32, g: f32) -> Self {
        Self {
            delay: DelayLine::new(sample_rate, max_length_sec),
            g: g.clamp(-0.999, 0.999),
        }
    }

    pub fn set_g(&mut self, g: f32) {
        self.g = g.clamp(-0.999, 0.999);
    }

    pub fn g(&self) -> f32 {
        self.g
    }

    /// Set the loop delay. Zero makes the all-pass a wire; any other delay
    /// is raised to at least one sample, the shortest loop `w(n - D)` can
    /// read before `w(n)` is written.
    pub fn set_delay_samples(&mut self, samples: f32) {
        let samples = if samples > 0.0 { samples.max(1.0) } else { 0.0 };
        self.delay.set_delay_samples(samples);
    }

    pub fn set_delay_msec(&mut self, msec: f32) {
        self.set_delay_samples(msec_to_samples(msec, self.delay.sample_rate()));
    }

    pub fn delay_samples(&self) -> f32 {
        self.delay.delay_samples()
    }

    /// Tap the internal `w` line without disturbing it
    pub fn read_delay_at_samples(&self, samples: f32) -> f32 {
        self.delay.read_delay_at_samples(samples)
    }

    pub fn reset(&mut self) {
        self.delay.reset();
    }

    #[inline]
    pub fn process_audio(&mut self, input: f32) -> f32 {
        // Zero-length all-pass is a wire
        if self.delay.delay_samples() == 0.0 {
            self.delay.write_delay_and_inc(input);
            return input;
        }

        let wn_d = self.delay.read();
        let wn = input + self.g * wn_d;
        let yn = -self.g * wn + wn_d;

        self.delay.write_delay_and_inc(underflow_clamp(wn));
        yn
    }

    pub fn process_audio_block(&mut self, input: &[f32], output: &mut [f32]) {
        for (out, &sample) in output.iter_mut().zip(input) {
            *out = self.process_audio(sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_delay_passes_input() {
        let mut apf = DelayApf::new(1000.0, 0.1, 0.0);
        apf.set_delay_samples(0.0);
        for x in [0.1, -0.5, 0.9, 0.0] {
            assert_eq!(apf.process_audio(x), x);
        }
    }

    #[test]
    fn test_sub_sample_delay_is_not_a_wire() {
        let mut apf = DelayApf::new(1000.0, 0.1, 0.5);
        apf.set_delay_samples(0.5);
        assert_eq!(apf.delay_samples(), 1.0);

        // Same response as a one-sample all-pass: -g, then 1 - g^2
        assert!((apf.process_audio(1.0) + 0.5).abs() < 1e-6);
        assert!((apf.process_audio(0.0) - 0.75).abs() < 1e-6);

        apf.set_delay_msec(0.0);
        assert_eq!(apf.delay_samples(), 0.0);
        assert_eq!(apf.process_audio(0.3), 0.3);
    }

    #[test]
    fn test_zero_gain_is_pure_delay() {
        let mut apf = DelayApf::new(1000.0, 0.1, 0.0);
        apf.set_delay_samples(7.0);
        let input: Vec<f32> = (0..40).map(|i| (i as f32 * 0.3).sin()).collect();
        for (n, &x) in input.iter().enumerate() {
            let y = apf.process_audio(x);
            let expected = if n >= 7 { input[n - 7] } else { 0.0 };
            assert_eq!(y, expected);
        }
    }

    #[test]
    fn test_all_pass_preserves_energy() {
        let mut apf = DelayApf::new(1000.0, 0.1, 0.6);
        apf.set_delay_samples(5.0);
        let mut energy = 0.0;
        for n in 0..4000 {
            let x = if n == 0 { 1.0 } else { 0.0 };
            let y = apf.process_audio(x);
            energy += y * y;
        }
        assert!((energy - 1.0).abs() < 1e-3, "impulse energy {}", energy);
    }

    #[test]
    fn test_impulse_first_tap_is_minus_g() {
        let mut apf = DelayApf::new(1000.0, 0.1, 0.5);
        apf.set_delay_samples(3.0);
        assert!((apf.process_audio(1.0) + 0.5).abs() < 1e-6);
        assert_eq!(apf.process_audio(0.0), 0.0);
        assert_eq!(apf.process_audio(0.0), 0.0);
        // 1 - g^2
        assert!((apf.process_audio(0.0) - 0.75).abs() < 1e-6);
    }
}
