//! Bitcrusher effect - lo-fi digital degradation
//!
//! Quantizes amplitude to `2^bits` levels and resamples with a
//! sample-and-hold running at the crush rate.

use super::{clamp_channels, Effect, MAX_CHANNELS};

/// Bitcrusher with bit depth and sample rate reduction
pub struct BitCrusher {
    sample_rate: f32,
    num_channels: usize,

    /// Bit depth (1 - 32, fractional allowed)
    bit_depth: f32,
    /// Quantization step: 2 / 2^bits over [-1, 1]
    bit_delta: f32,

    /// Hold rate in Hz (1 - sample rate)
    crush_rate: f32,
    /// Phase accumulator increment: crush_rate / sample_rate
    phase_inc: f32,
    phase: f32,

    /// Held sample values
    hold: [f32; MAX_CHANNELS],

    /// Wet/dry mix (0.0 - 1.0)
    mix: f32,

    /// Optional dither amount in quantization steps (0.0 - 1.0)
    jitter: f32,

    /// Simple LFSR for noise
    noise_state: u32,
}

impl BitCrusher {
    pub fn new(sample_rate: f32, num_channels: usize) -> Self {
        let mut crusher = Self {
            sample_rate: sample_rate.max(1.0),
            num_channels: clamp_channels(num_channels),
            bit_depth: 16.0,
            bit_delta: 0.0,
            crush_rate: sample_rate,
            phase_inc: 1.0,
            // Start wrapped so the first sample is captured
            phase: 1.0,
            hold: [0.0; MAX_CHANNELS],
            mix: 1.0,
            jitter: 0.0,
            noise_state: 0x1234_5678,
        };
        crusher.set_bit_depth_crush(16.0);
        crusher.set_sample_rate_crush(sample_rate);
        crusher
    }

    /// Set bit depth (1 - 32)
    pub fn set_bit_depth_crush(&mut self, bits: f32) {
        self.bit_depth = bits.clamp(1.0, 32.0);
        self.bit_delta = 2.0 / 2.0f32.powf(self.bit_depth);
    }

    pub fn bit_depth(&self) -> f32 {
        self.bit_depth
    }

    /// Set hold rate in Hz (1 - sample rate)
    pub fn set_sample_rate_crush(&mut self, rate: f32) {
        self.crush_rate = rate.clamp(1.0, self.sample_rate);
        self.phase_inc = self.crush_rate / self.sample_rate;
    }

    pub fn sample_rate_crush(&self) -> f32 {
        self.crush_rate
    }

    /// Set wet/dry mix (0.0 - 1.0)
    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    /// Set jitter/noise amount (0.0 - 1.0)
    pub fn set_jitter(&mut self, jitter: f32) {
        self.jitter = jitter.clamp(0.0, 1.0);
    }

    /// Quantize to the current bit depth
    #[inline]
    fn crush(&self, sample: f32) -> f32 {
        (self.bit_delta * (sample / self.bit_delta + 0.5).floor()).clamp(-1.0, 1.0)
    }

    /// Galois LFSR noise in [-1, 1]
    #[inline]
    fn next_noise(&mut self) -> f32 {
        let lsb = self.noise_state & 1;
        self.noise_state >>= 1;
        if lsb == 1 {
            self.noise_state ^= 0xB400_0000;
        }
        (self.noise_state as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

impl Effect for BitCrusher {
    fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
        let n = self.num_channels;

        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
            for channel in 0..n {
                let dither = if self.jitter > 0.0 {
                    self.next_noise() * self.jitter * self.bit_delta
                } else {
                    0.0
                };
                self.hold[channel] = self.crush(input[channel] + dither);
            }
        }

        for channel in 0..n {
            output[channel] = input[channel] * (1.0 - self.mix) + self.hold[channel] * self.mix;
        }
    }

    fn reset(&mut self) {
        self.hold = [0.0; MAX_CHANNELS];
        self.phase = 1.0;
    }

    fn num_channels(&self) -> usize {
        self.num_channels
    }

    fn name(&self) -> &'static str {
        "Bitcrusher"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_clamping() {
        let mut bc = BitCrusher::new(48000.0, 2);
        bc.set_bit_depth_crush(0.0);
        assert_eq!(bc.bit_depth(), 1.0);
        bc.set_bit_depth_crush(64.0);
        assert_eq!(bc.bit_depth(), 32.0);
        bc.set_sample_rate_crush(0.0);
        assert_eq!(bc.sample_rate_crush(), 1.0);
        bc.set_sample_rate_crush(96000.0);
        assert_eq!(bc.sample_rate_crush(), 48000.0);
    }

    #[test]
    fn test_one_bit_has_two_steps() {
        let mut bc = BitCrusher::new(48000.0, 1);
        bc.set_bit_depth_crush(1.0);
        assert_eq!(bc.crush(0.3), 0.0);
        assert_eq!(bc.crush(0.7), 1.0);
        assert_eq!(bc.crush(-0.7), -1.0);
    }

    #[test]
    fn test_full_rate_high_depth_is_transparent() {
        let mut bc = BitCrusher::new(48000.0, 1);
        bc.set_bit_depth_crush(24.0);
        for n in 0..100 {
            let x = (n as f32 * 0.1).sin() * 0.9;
            let mut out = [0.0];
            bc.process_frame(&[x], &mut out);
            assert!((out[0] - x).abs() < 1e-6);
        }
    }

    #[test]
    fn test_mix_blends_dry() {
        let mut bc = BitCrusher::new(48000.0, 1);
        bc.set_bit_depth_crush(1.0);
        bc.set_mix(0.0);
        let mut out = [0.0];
        bc.process_frame(&[0.3], &mut out);
        assert_eq!(out[0], 0.3);
    }
}
