//! Circular-buffer delay line with fractional (linearly interpolated) reads.
//!
//! Every time-based unit in the crate is built on [`DelayLine`]:
//! - `read` / `write_delay_and_inc` for hand-rolled feedback topologies
//! - `process_audio` for the canonical one-in/one-out case
//! - `read_delay_at` for multi-tap reads that leave the cursors alone
//! - eased delay-time changes for click-free modulation

mod allpass;

pub use allpass::DelayApf;

use crate::util::{convert_to_linear, lerp, msec_to_samples, ExponentialEase};

/// Default ease factor for `set_eased_delay_msec` changes
const DEFAULT_EASE_FACTOR: f32 = 0.0001;

/// Mono delay line
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    sample_rate: f32,
    /// Slot that the next input sample is written to
    write_index: usize,
    /// Slot holding the sample `floor(delay_in_samples)` behind the write cursor
    read_index: usize,
    /// Delay in fractional samples, always within [0, buffer_len - 1]
    delay_in_samples: f32,
    /// Eased delay time in milliseconds
    ease_delay_msec: ExponentialEase,
    /// Linear gain applied by `process_audio`
    output_attenuation: f32,
}

impl DelayLine {
    /// Create a delay line able to hold `max_length_sec` of audio
    pub fn new(sample_rate: f32, max_length_sec: f32) -> Self {
        let mut delay = Self {
            buffer: Vec::new(),
            sample_rate,
            write_index: 0,
            read_index: 0,
            delay_in_samples: 0.0,
            ease_delay_msec: ExponentialEase::new(0.0, DEFAULT_EASE_FACTOR),
            output_attenuation: 1.0,
        };
        delay.init(sample_rate, max_length_sec);
        delay
    }

    /// (Re)allocate the buffer: `max_length_sec * sample_rate + 1` samples
    pub fn init(&mut self, sample_rate: f32, max_length_sec: f32) {
        debug_assert!(sample_rate > 0.0, "delay line needs a positive sample rate");
        self.sample_rate = sample_rate.max(1.0);
        let len = (max_length_sec.max(0.0) * self.sample_rate) as usize + 1;
        self.buffer = vec![0.0; len.max(2)];
        self.reset();
    }

    /// Clear audio history and rewind both cursors
    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_index = 0;
        self.update();
    }

    #[inline]
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Largest representable delay in samples
    #[inline]
    pub fn max_delay_samples(&self) -> f32 {
        (self.buffer.len() - 1) as f32
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Set delay time in milliseconds (clamped to the buffer)
    pub fn set_delay_msec(&mut self, msec: f32) {
        let samples = msec_to_samples(msec, self.sample_rate);
        self.set_delay_samples(samples);
        self.ease_delay_msec.set_value(self.delay_msec(), true);
    }

    /// Set delay time in fractional samples (clamped to the buffer)
    pub fn set_delay_samples(&mut self, samples: f32) {
        self.delay_in_samples = if samples.is_finite() {
            samples.clamp(0.0, self.max_delay_samples())
        } else {
            0.0
        };
        self.update();
    }

    /// Glide towards a new delay time; `is_init` jumps straight to it
    pub fn set_eased_delay_msec(&mut self, msec: f32, is_init: bool) {
        let max_msec = self.max_delay_samples() * 1000.0 / self.sample_rate;
        let msec = msec.clamp(0.0, max_msec);
        self.ease_delay_msec.set_value(msec, is_init);
        if is_init {
            self.set_delay_samples(msec_to_samples(msec, self.sample_rate));
        }
    }

    pub fn set_ease_factor(&mut self, ease_factor: f32) {
        self.ease_delay_msec.set_ease_factor(ease_factor);
    }

    pub fn set_output_attenuation_db(&mut self, db: f32) {
        self.output_attenuation = convert_to_linear(db.min(0.0));
    }

    #[inline]
    pub fn delay_samples(&self) -> f32 {
        self.delay_in_samples
    }

    pub fn delay_msec(&self) -> f32 {
        self.delay_in_samples * 1000.0 / self.sample_rate
    }

    /// Recompute the integer read cursor from the write cursor and delay
    #[inline]
    fn update(&mut self) {
        let int_delay = self.delay_in_samples as usize;
        self.read_index = self.wrap_back(self.write_index, int_delay);
    }

    #[inline(always)]
    fn wrap_back(&self, index: usize, offset: usize) -> usize {
        let len = self.buffer.len();
        (index + len - offset % len) % len
    }

    /// Read at the current fractional delay without moving either cursor
    #[inline]
    pub fn read(&self) -> f32 {
        let yn = self.buffer[self.read_index];
        let yn_1 = self.buffer[self.wrap_back(self.read_index, 1)];
        lerp(yn, yn_1, self.delay_in_samples.fract())
    }

    /// Multi-tap read `msec` behind the write cursor
    #[inline]
    pub fn read_delay_at(&self, msec: f32) -> f32 {
        self.read_delay_at_samples(msec_to_samples(msec, self.sample_rate))
    }

    /// Multi-tap read `samples` behind the write cursor.
    ///
    /// An offset of 1.0 is the most recently written sample.
    #[inline]
    pub fn read_delay_at_samples(&self, samples: f32) -> f32 {
        let samples = samples.clamp(1.0, self.max_delay_samples());
        let int_delay = samples as usize;
        let index = self.wrap_back(self.write_index, int_delay);
        let yn = self.buffer[index];
        let yn_1 = self.buffer[self.wrap_back(index, 1)];
        lerp(yn, yn_1, samples.fract())
    }

    /// Write one sample and advance both cursors
    #[inline]
    pub fn write_delay_and_inc(&mut self, input: f32) {
        let len = self.buffer.len();
        self.buffer[self.write_index] = input;
        self.write_index = (self.write_index + 1) % len;
        self.read_index = (self.read_index + 1) % len;
    }

    /// Whether the read and write cursors coincide (delay below one sample)
    #[inline]
    pub fn is_sub_sample(&self) -> bool {
        self.read_index == self.write_index
    }

    /// Advance any pending eased delay change by one sample.
    ///
    /// `process_audio` does this itself; callers driving `read` and
    /// `write_delay_and_inc` by hand call it once per sample.
    #[inline]
    pub fn advance_ease(&mut self) {
        if !self.ease_delay_msec.is_done() {
            let msec = self.ease_delay_msec.next_value();
            self.delay_in_samples =
                msec_to_samples(msec, self.sample_rate).clamp(0.0, self.max_delay_samples());
            self.update();
        }
    }

    /// Read-before-write: returns the delayed sample, then stores `input`
    #[inline]
    pub fn process_audio(&mut self, input: f32) -> f32 {
        self.advance_ease();

        let output = if self.is_sub_sample() {
            // The newest "stored" sample is the input itself
            let previous = self.buffer[self.wrap_back(self.write_index, 1)];
            lerp(input, previous, self.delay_in_samples.fract())
        } else {
            self.read()
        };

        self.write_delay_and_inc(input);
        output * self.output_attenuation
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

    fn ramp(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32 + 1.0).collect()
    }

    #[test]
    fn test_buffer_allocation() {
        let delay = DelayLine::new(1000.0, 0.5);
        assert_eq!(delay.buffer_len(), 501);
        assert_eq!(delay.max_delay_samples(), 500.0);
    }

    #[test]
    fn test_integer_delays_return_past_input() {
        let input = ramp(64);
        for d in 0..=20usize {
            let mut delay = DelayLine::new(1000.0, 0.02);
            delay.set_delay_samples(d as f32);
            for (n, &x) in input.iter().enumerate() {
                let y = delay.process_audio(x);
                let expected = if n >= d { input[n - d] } else { 0.0 };
                assert_eq!(y, expected, "delay {} at sample {}", d, n);
            }
        }
    }

    #[test]
    fn test_fractional_delay_interpolates() {
        let input = ramp(32);
        let mut delay = DelayLine::new(1000.0, 0.02);
        delay.set_delay_samples(3.25);
        for (n, &x) in input.iter().enumerate() {
            let y = delay.process_audio(x);
            if n >= 4 {
                let expected = lerp(input[n - 3], input[n - 4], 0.25);
                assert!((y - expected).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_sub_sample_delay_uses_input() {
        let mut delay = DelayLine::new(1000.0, 0.01);
        delay.set_delay_samples(0.5);
        assert_eq!(delay.process_audio(2.0), 1.0);
        // Half way between 4.0 (now) and 2.0 (one sample ago)
        assert_eq!(delay.process_audio(4.0), 3.0);
    }

    #[test]
    fn test_maximum_delay() {
        let mut delay = DelayLine::new(100.0, 0.1);
        let max = delay.max_delay_samples() as usize;
        delay.set_delay_samples(1.0e6);
        assert_eq!(delay.delay_samples(), max as f32);

        let input = ramp(40);
        for (n, &x) in input.iter().enumerate() {
            let y = delay.process_audio(x);
            let expected = if n >= max { input[n - max] } else { 0.0 };
            assert_eq!(y, expected);
        }
    }

    #[test]
    fn test_delay_clamps_negative_and_nan() {
        let mut delay = DelayLine::new(1000.0, 0.1);
        delay.set_delay_samples(-5.0);
        assert_eq!(delay.delay_samples(), 0.0);
        delay.set_delay_samples(f32::NAN);
        assert_eq!(delay.delay_samples(), 0.0);
    }

    #[test]
    fn test_read_delay_at_does_not_move_cursors() {
        let mut delay = DelayLine::new(1000.0, 0.1);
        delay.set_delay_msec(10.0);
        for x in ramp(50) {
            delay.write_delay_and_inc(x);
        }
        // Newest sample is 50, one behind is 49...
        assert_eq!(delay.read_delay_at_samples(1.0), 50.0);
        assert_eq!(delay.read_delay_at_samples(5.0), 46.0);
        assert_eq!(delay.read_delay_at(5.0), 46.0);
        assert!((delay.read_delay_at_samples(5.5) - 45.5).abs() < 1e-5);
        // Cursor-based read is unaffected: 10 samples behind the write cursor
        assert_eq!(delay.read(), 41.0);
    }

    #[test]
    fn test_eased_delay_moves_gradually() {
        let mut delay = DelayLine::new(1000.0, 1.0);
        delay.set_eased_delay_msec(10.0, true);
        assert!((delay.delay_samples() - 10.0).abs() < 1e-3);

        delay.set_ease_factor(0.01);
        delay.set_eased_delay_msec(100.0, false);
        delay.process_audio(0.0);
        let after_one = delay.delay_samples();
        assert!(after_one > 10.0 && after_one < 20.0);

        for _ in 0..5000 {
            delay.process_audio(0.0);
        }
        assert!((delay.delay_samples() - 100.0).abs() < 0.1);
    }

    #[test]
    fn test_output_attenuation() {
        let mut delay = DelayLine::new(1000.0, 0.1);
        delay.set_output_attenuation_db(-6.0206);
        assert!((delay.process_audio(1.0) - 0.5).abs() < 1e-4);
    }
}
