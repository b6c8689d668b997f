//! Parameter smoothing primitives

/// Linear ramp from the current value to a target over a fixed duration
#[derive(Debug, Clone)]
pub struct LinearEase {
    sample_rate: f32,
    start_value: f32,
    current_value: f32,
    delta: f32,
    samples_remaining: u32,
}

impl Default for LinearEase {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            start_value: 0.0,
            current_value: 0.0,
            delta: 0.0,
            samples_remaining: 0,
        }
    }
}

impl LinearEase {
    pub fn new(sample_rate: f32, initial: f32) -> Self {
        let mut ease = Self::default();
        ease.init(sample_rate);
        ease.set_value_immediate(initial);
        ease
    }

    pub fn init(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
        self.samples_remaining = 0;
    }

    /// Ramp to `target` over `time_sec`. Zero time jumps immediately.
    pub fn set_value(&mut self, target: f32, time_sec: f32) {
        let samples = (time_sec.max(0.0) * self.sample_rate) as u32;
        if samples == 0 {
            self.set_value_immediate(target);
            return;
        }
        self.start_value = self.current_value;
        self.delta = (target - self.current_value) / samples as f32;
        self.samples_remaining = samples;
    }

    pub fn set_value_immediate(&mut self, value: f32) {
        self.start_value = value;
        self.current_value = value;
        self.delta = 0.0;
        self.samples_remaining = 0;
    }

    #[inline]
    pub fn next_value(&mut self) -> f32 {
        if self.samples_remaining > 0 {
            self.current_value += self.delta;
            self.samples_remaining -= 1;
        }
        self.current_value
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.current_value
    }

    pub fn start_value(&self) -> f32 {
        self.start_value
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.samples_remaining == 0
    }
}

/// One-pole exponential approach towards a target
#[derive(Debug, Clone)]
pub struct ExponentialEase {
    current_value: f32,
    target_value: f32,
    ease_factor: f32,
    threshold: f32,
}

impl Default for ExponentialEase {
    fn default() -> Self {
        Self::new(0.0, 0.001)
    }
}

impl ExponentialEase {
    /// Ease factor in (0, 1]; 1.0 jumps immediately
    pub fn new(initial: f32, ease_factor: f32) -> Self {
        Self {
            current_value: initial,
            target_value: initial,
            ease_factor: ease_factor.clamp(1.0e-6, 1.0),
            threshold: 1.0e-5,
        }
    }

    pub fn init(&mut self, initial: f32, ease_factor: f32) {
        *self = Self::new(initial, ease_factor);
    }

    pub fn set_ease_factor(&mut self, ease_factor: f32) {
        self.ease_factor = ease_factor.clamp(1.0e-6, 1.0);
    }

    /// Set a new target. `is_init` snaps the current value to it.
    pub fn set_value(&mut self, target: f32, is_init: bool) {
        self.target_value = target;
        if is_init {
            self.current_value = target;
        }
    }

    #[inline]
    pub fn next_value(&mut self) -> f32 {
        if self.is_done() {
            self.current_value = self.target_value;
            return self.current_value;
        }
        self.current_value += self.ease_factor * (self.target_value - self.current_value);
        self.current_value
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.current_value
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        (self.current_value - self.target_value).abs() < self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_ease_reaches_target() {
        let mut ease = LinearEase::new(1000.0, 0.0);
        ease.set_value(1.0, 0.01); // 10 samples
        let mut last = 0.0;
        for _ in 0..10 {
            last = ease.next_value();
        }
        assert!((last - 1.0).abs() < 1e-5);
        assert!(ease.is_done());
        assert!((ease.next_value() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_linear_ease_zero_time_is_immediate() {
        let mut ease = LinearEase::new(48000.0, 0.25);
        ease.set_value(0.75, 0.0);
        assert_eq!(ease.value(), 0.75);
        assert!(ease.is_done());
    }

    #[test]
    fn test_exponential_ease_converges() {
        let mut ease = ExponentialEase::new(0.0, 0.1);
        ease.set_value(1.0, false);
        for _ in 0..500 {
            ease.next_value();
        }
        assert!(ease.is_done());
        assert!((ease.value() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_exponential_ease_init_snaps() {
        let mut ease = ExponentialEase::new(0.0, 0.01);
        ease.set_value(5.0, true);
        assert_eq!(ease.value(), 5.0);
        assert!(ease.is_done());
    }
}
