//! Noise generators
//!
//! Both generators run on an inline xorshift64 state: no allocation, no
//! locking, deterministic for a given seed.

const DEFAULT_SEED: u64 = 0xDEAD_BEEF_CAFE_BABE;

/// xorshift64 PRNG state
#[derive(Debug, Clone, Copy)]
pub(crate) struct XorShift {
    state: u64,
}

impl XorShift {
    pub fn new(seed: u64) -> Self {
        // Zero is a fixed point of xorshift
        Self {
            state: if seed == 0 { DEFAULT_SEED } else { seed },
        }
    }

    /// Uniform value in [0, 1]
    #[inline]
    pub fn next_unipolar(&mut self) -> f32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        (self.state as f32) / (u64::MAX as f32)
    }

    /// Uniform value in [-1, 1]
    #[inline]
    pub fn next_bipolar(&mut self) -> f32 {
        self.next_unipolar() * 2.0 - 1.0
    }
}

impl Default for XorShift {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

/// Uniform white noise in [-scale, scale]
#[derive(Debug, Clone)]
pub struct WhiteNoise {
    rng: XorShift,
    scale: f32,
    add: f32,
}

impl Default for WhiteNoise {
    fn default() -> Self {
        Self::new(1.0, 0.0)
    }
}

impl WhiteNoise {
    pub fn new(scale: f32, add: f32) -> Self {
        Self {
            rng: XorShift::default(),
            scale,
            add,
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: XorShift::new(seed),
            ..Self::default()
        }
    }

    pub fn set_scale_add(&mut self, scale: f32, add: f32) {
        self.scale = scale;
        self.add = add;
    }

    #[inline]
    pub fn generate(&mut self) -> f32 {
        self.add + self.scale * self.rng.next_bipolar()
    }
}

/// Pink (-3 dB/oct) noise from Paul Kellet's economy filter
#[derive(Debug, Clone, Default)]
pub struct PinkNoise {
    white: WhiteNoise,
    b0: f32,
    b1: f32,
    b2: f32,
}

impl PinkNoise {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            white: WhiteNoise::with_seed(seed),
            ..Self::default()
        }
    }

    #[inline]
    pub fn generate(&mut self) -> f32 {
        let white = self.white.generate();

        self.b0 = 0.99886 * self.b0 + white * 0.055_517_9;
        self.b1 = 0.99332 * self.b1 + white * 0.075_075_9;
        self.b2 = 0.96900 * self.b2 + white * 0.153_852;

        let pink = self.b0 + self.b1 + self.b2 + white * 0.5362;

        // Roughly back to the white noise level
        pink * 0.11
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(samples: &[f32]) -> (f32, f32) {
        let mean = samples.iter().sum::<f32>() / samples.len() as f32;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / samples.len() as f32;
        (mean, variance)
    }

    #[test]
    fn test_white_noise_range_and_mean() {
        let mut noise = WhiteNoise::default();
        let samples: Vec<f32> = (0..20000).map(|_| noise.generate()).collect();
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
        let (mean, variance) = stats(&samples);
        assert!(mean.abs() < 0.05);
        // Uniform [-1, 1] has variance 1/3
        assert!((variance - 1.0 / 3.0).abs() < 0.03);
    }

    #[test]
    fn test_seeded_noise_is_deterministic() {
        let mut a = WhiteNoise::with_seed(42);
        let mut b = WhiteNoise::with_seed(42);
        for _ in 0..100 {
            assert_eq!(a.generate(), b.generate());
        }
    }

    #[test]
    fn test_pink_noise_distribution() {
        let mut noise = PinkNoise::new();
        let samples: Vec<f32> = (0..10000).map(|_| noise.generate()).collect();
        let (mean, variance) = stats(&samples);
        assert!(mean.abs() < 0.1);
        assert!(variance > 0.001);
    }

    #[test]
    fn test_zero_seed_is_remapped() {
        let mut rng = XorShift::new(0);
        assert_ne!(rng.next_unipolar(), 0.0);
    }
}
