//! Flexiverb: a compact feedback delay network reverb
//!
//! 4 or 8 delay lines of mutually prime lengths are scattered into each other
//! through a Householder matrix (`y = x - 2/N * sum(x)`), which is lossless,
//! so all decay comes from the per-line RT60 gain and the one-pole damping
//! inside the loop. Even lines feed the left output, odd lines the right.

use std::sync::Arc;

use super::Effect;
use crate::delay::DelayLine;
use crate::filter::OnePoleLowPass;
use crate::util::{msec_to_samples, underflow_clamp, Params};

/// Line lengths in samples at the reference rate
const REFERENCE_LENGTHS: [usize; MAX_LINES] = [1109, 1277, 1447, 1613, 1783, 1949, 2113, 2287];
const REFERENCE_SAMPLE_RATE: f32 = 44100.0;

const MAX_LINES: usize = 8;

const MAX_PRE_DELAY_MSEC: f32 = 500.0;
const MIN_RT60_SEC: f32 = 0.05;
const MAX_RT60_SEC: f32 = 30.0;
/// Loop gain ceiling
const MAX_LINE_GAIN: f32 = 0.9999;

/// Number of lines in the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum FlexiverbComplexity {
    /// 4 lines
    #[default]
    Low,
    /// 8 lines
    High,
}

impl FlexiverbComplexity {
    pub fn num_lines(self) -> usize {
        match self {
            FlexiverbComplexity::Low => 4,
            FlexiverbComplexity::High => 8,
        }
    }
}

/// Control-thread settings for [`Flexiverb`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlexiverbSettings {
    pub complexity: FlexiverbComplexity,
    /// Time for the tail to fall 60 dB, in seconds
    pub decay_rt60_sec: f32,
    /// Loop damping (0.0 = bright, 1.0 = dark)
    pub damping: f32,
    pub pre_delay_msec: f32,
    pub wet_level: f32,
    pub dry_level: f32,
}

impl Default for FlexiverbSettings {
    fn default() -> Self {
        Self {
            complexity: FlexiverbComplexity::Low,
            decay_rt60_sec: 2.0,
            damping: 0.3,
            pre_delay_msec: 10.0,
            wet_level: 0.3,
            dry_level: 1.0,
        }
    }
}

/// Householder FDN reverb
pub struct Flexiverb {
    sample_rate: f32,
    pre_delay: DelayLine,
    lines: [DelayLine; MAX_LINES],
    line_lengths: [usize; MAX_LINES],
    line_gains: [f32; MAX_LINES],
    damping: [OnePoleLowPass; MAX_LINES],
    num_lines: usize,
    settings: FlexiverbSettings,
    params: Arc<Params<FlexiverbSettings>>,
}

impl Flexiverb {
    /// Create a new reverb with default settings
    pub fn new(sample_rate: f32) -> Self {
        let sample_rate = sample_rate.max(1.0);
        let line_lengths = scaled_prime_lengths(sample_rate);
        let lines = std::array::from_fn(|i| {
            let mut line = DelayLine::new(sample_rate, (line_lengths[i] + 1) as f32 / sample_rate);
            line.set_delay_samples(line_lengths[i] as f32);
            line
        });

        let mut reverb = Self {
            sample_rate,
            pre_delay: DelayLine::new(sample_rate, MAX_PRE_DELAY_MSEC / 1000.0),
            lines,
            line_lengths,
            line_gains: [0.0; MAX_LINES],
            damping: [OnePoleLowPass::default(); MAX_LINES],
            num_lines: FlexiverbComplexity::default().num_lines(),
            settings: FlexiverbSettings::default(),
            params: Arc::new(Params::new()),
        };
        reverb.apply_settings(FlexiverbSettings::default());
        reverb
    }

    /// Handle for pushing settings from another thread
    pub fn params_handle(&self) -> Arc<Params<FlexiverbSettings>> {
        Arc::clone(&self.params)
    }

    pub fn settings(&self) -> &FlexiverbSettings {
        &self.settings
    }

    /// Apply settings on this thread
    pub fn apply_settings(&mut self, settings: FlexiverbSettings) {
        let settings = FlexiverbSettings {
            complexity: settings.complexity,
            decay_rt60_sec: settings.decay_rt60_sec.clamp(MIN_RT60_SEC, MAX_RT60_SEC),
            damping: settings.damping.clamp(0.0, 1.0),
            pre_delay_msec: settings.pre_delay_msec.clamp(0.0, MAX_PRE_DELAY_MSEC),
            wet_level: settings.wet_level.max(0.0),
            dry_level: settings.dry_level.max(0.0),
        };

        let num_lines = settings.complexity.num_lines();
        if num_lines != self.num_lines {
            // Lines dropping out of the network must not replay stale audio later
            for line in &mut self.lines[num_lines.min(self.num_lines)..] {
                line.reset();
            }
            self.num_lines = num_lines;
        }

        for i in 0..MAX_LINES {
            self.line_gains[i] = line_gain(self.line_lengths[i], settings.decay_rt60_sec, self.sample_rate);
            self.damping[i].set_g(0.95 * settings.damping);
        }
        self.pre_delay
            .set_delay_samples(msec_to_samples(settings.pre_delay_msec, self.sample_rate));
        self.settings = settings;
    }

    pub fn set_complexity(&mut self, complexity: FlexiverbComplexity) {
        self.apply_settings(FlexiverbSettings { complexity, ..self.settings });
    }

    /// Set RT60 decay time in seconds
    pub fn set_decay_time(&mut self, rt60_sec: f32) {
        self.apply_settings(FlexiverbSettings {
            decay_rt60_sec: rt60_sec,
            ..self.settings
        });
    }

    /// Set damping (0.0 - 1.0)
    pub fn set_damping(&mut self, damping: f32) {
        self.apply_settings(FlexiverbSettings { damping, ..self.settings });
    }

    /// Set pre-delay in milliseconds (0 - 500)
    pub fn set_pre_delay_msec(&mut self, msec: f32) {
        self.apply_settings(FlexiverbSettings {
            pre_delay_msec: msec,
            ..self.settings
        });
    }

    pub fn set_wet_level(&mut self, wet_level: f32) {
        self.settings.wet_level = wet_level.max(0.0);
    }

    pub fn set_dry_level(&mut self, dry_level: f32) {
        self.settings.dry_level = dry_level.max(0.0);
    }

    /// Delay lengths of the active lines in samples
    pub fn line_lengths(&self) -> &[usize] {
        &self.line_lengths[..self.num_lines]
    }

    /// Loop gains of the active lines
    pub fn line_gains(&self) -> &[f32] {
        &self.line_gains[..self.num_lines]
    }
}

impl Effect for Flexiverb {
    fn prepare_block(&mut self) {
        if let Some(settings) = self.params.get_if_changed() {
            self.apply_settings(settings);
        }
    }

    fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
        let (in_l, in_r) = (input[0], input[1]);
        let n = self.num_lines;
        let x = self.pre_delay.process_audio(0.5 * (in_l + in_r));

        let mut taps = [0.0f32; MAX_LINES];
        let mut sum = 0.0;
        for i in 0..n {
            let damped = self.damping[i].process_audio(self.lines[i].read());
            taps[i] = damped * self.line_gains[i];
            sum += taps[i];
        }

        let scatter = 2.0 / n as f32 * sum;
        let (mut wet_l, mut wet_r) = (0.0, 0.0);
        for i in 0..n {
            if i % 2 == 0 {
                wet_l += taps[i];
            } else {
                wet_r += taps[i];
            }
            self.lines[i].write_delay_and_inc(underflow_clamp(x + taps[i] - scatter));
        }

        let norm = 2.0 / n as f32;
        let dry = self.settings.dry_level;
        let wet = self.settings.wet_level * norm;
        output[0] = dry * in_l + wet * wet_l;
        output[1] = dry * in_r + wet * wet_r;
    }

    fn reset(&mut self) {
        self.pre_delay.reset();
        for line in &mut self.lines {
            line.reset();
        }
        for filter in &mut self.damping {
            filter.reset();
        }
    }

    fn num_channels(&self) -> usize {
        2
    }

    fn name(&self) -> &'static str {
        "Flexiverb"
    }
}

/// Gain per pass for a line of `length` samples to reach -60 dB after `rt60_sec`
fn line_gain(length: usize, rt60_sec: f32, sample_rate: f32) -> f32 {
    10.0f32
        .powf(-3.0 * length as f32 / (rt60_sec * sample_rate))
        .min(MAX_LINE_GAIN)
}

/// Reference lengths scaled to `sample_rate`, each bumped to the next prime
fn scaled_prime_lengths(sample_rate: f32) -> [usize; MAX_LINES] {
    let ratio = sample_rate / REFERENCE_SAMPLE_RATE;
    let mut lengths = [0usize; MAX_LINES];
    let mut previous = 1;
    for (length, reference) in lengths.iter_mut().zip(REFERENCE_LENGTHS) {
        let scaled = ((reference as f32 * ratio) as usize).max(previous + 1);
        *length = next_prime(scaled);
        previous = *length;
    }
    lengths
}

fn next_prime(mut n: usize) -> usize {
    n = n.max(2);
    while !is_prime(n) {
        n += 1;
    }
    n
}

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    let mut d = 2;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gcd(a: usize, b: usize) -> usize {
        if b == 0 {
            a
        } else {
            gcd(b, a % b)
        }
    }

    #[test]
    fn test_line_lengths_mutually_prime() {
        for sample_rate in [22050.0, 44100.0, 48000.0, 96000.0] {
            let lengths = scaled_prime_lengths(sample_rate);
            for i in 0..MAX_LINES {
                for j in (i + 1)..MAX_LINES {
                    assert_eq!(gcd(lengths[i], lengths[j]), 1, "{:?}", lengths);
                }
            }
        }
    }

    #[test]
    fn test_line_gain_follows_rt60() {
        // A 1 second line with RT60 of 1 second loses 60 dB per pass
        let g = line_gain(48000, 1.0, 48000.0);
        assert!((g - 0.001).abs() < 1e-6);
        assert!(line_gain(1, 1000.0, 48000.0) < 1.0);
    }

    #[test]
    fn test_complexity_switches_line_count() {
        let mut reverb = Flexiverb::new(48000.0);
        assert_eq!(reverb.line_lengths().len(), 4);
        reverb.set_complexity(FlexiverbComplexity::High);
        assert_eq!(reverb.line_lengths().len(), 8);
    }

    #[test]
    fn test_tail_decays() {
        let mut reverb = Flexiverb::new(48000.0);
        reverb.set_decay_time(0.5);
        reverb.set_pre_delay_msec(0.0);
        reverb.set_dry_level(0.0);
        reverb.set_wet_level(1.0);

        let frames = 48000;
        let mut input = vec![0.0f32; frames * 2];
        input[0] = 1.0;
        input[1] = 1.0;
        let mut output = vec![0.0f32; frames * 2];
        reverb.process(&input, &mut output);

        let energy = |range: std::ops::Range<usize>| -> f32 { output[range].iter().map(|s| s * s).sum() };
        let early = energy(0..9600 * 2);
        let late = energy(38400 * 2..48000 * 2);
        assert!(early > 0.0);
        assert!(late < early * 1e-3, "early {} late {}", early, late);
        assert!(output.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_pre_delay_holds_back_tail() {
        let mut reverb = Flexiverb::new(1000.0);
        reverb.set_pre_delay_msec(100.0);
        reverb.set_dry_level(0.0);
        let mut input = vec![0.0f32; 2 * 200];
        input[0] = 1.0;
        let mut output = vec![0.0f32; input.len()];
        reverb.process(&input, &mut output);
        assert!(output[..2 * 100].iter().all(|s| *s == 0.0));
    }
}
