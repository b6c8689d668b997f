//! Three-voice stereo chorus
//!
//! Left, center and right delay lines are each swept by their own LFO
//! between [`MIN_DELAY_MSEC`] and [`MAX_DELAY_MSEC`]. The center line is fed
//! the mono sum and shared by both outputs. `spread` pushes the left and
//! right LFO rates apart so the two sides drift against each other.

use std::sync::Arc;

use super::Effect;
use crate::delay::DelayLine;
use crate::osc::{Lfo, LfoMode, LfoType};
use crate::util::{msec_to_samples, underflow_clamp, unipolar, Params};

/// Shortest swept delay
pub const MIN_DELAY_MSEC: f32 = 5.0;
/// Longest swept delay
pub const MAX_DELAY_MSEC: f32 = 30.0;

/// Largest per-line feedback amount accepted
const MAX_FEEDBACK: f32 = 0.95;
/// Highest LFO rate accepted
const MAX_LFO_FREQUENCY: f32 = 20.0;

/// Chorus delay line selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChorusLine {
    Left = 0,
    Center = 1,
    Right = 2,
}

const NUM_LINES: usize = 3;

/// Control-thread settings for [`Chorus`], indexed by [`ChorusLine`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChorusSettings {
    /// Sweep depth per line (0.0 - 1.0)
    pub depth: [f32; NUM_LINES],
    /// LFO rate per line in Hz
    pub frequency: [f32; NUM_LINES],
    /// Feedback per line (0.0 - 0.95)
    pub feedback: [f32; NUM_LINES],
    pub wet_level: f32,
    pub dry_level: f32,
    /// Left/right rate spread (0.0 - 1.0)
    pub spread: f32,
}

impl Default for ChorusSettings {
    fn default() -> Self {
        Self {
            depth: [0.5; NUM_LINES],
            frequency: [0.8, 0.6, 0.7],
            feedback: [0.0; NUM_LINES],
            wet_level: 0.5,
            dry_level: 0.5,
            spread: 0.0,
        }
    }
}

/// Stereo chorus effect
pub struct Chorus {
    delays: [DelayLine; NUM_LINES],
    lfos: [Lfo; NUM_LINES],
    min_delay_samples: f32,
    max_delay_samples: f32,
    settings: ChorusSettings,
    params: Arc<Params<ChorusSettings>>,
}

impl Chorus {
    /// Create a new chorus with default settings
    pub fn new(sample_rate: f32) -> Self {
        let sample_rate = sample_rate.max(1.0);
        let max_secs = 2.0 * MAX_DELAY_MSEC / 1000.0;
        let mut chorus = Self {
            delays: std::array::from_fn(|_| DelayLine::new(sample_rate, max_secs)),
            lfos: std::array::from_fn(|_| Lfo::new(sample_rate)),
            min_delay_samples: msec_to_samples(MIN_DELAY_MSEC, sample_rate),
            max_delay_samples: msec_to_samples(MAX_DELAY_MSEC, sample_rate),
            settings: ChorusSettings::default(),
            params: Arc::new(Params::new()),
        };

        for (i, lfo) in chorus.lfos.iter_mut().enumerate() {
            lfo.set_type(LfoType::Triangle);
            lfo.set_mode(LfoMode::Free);
            lfo.set_unipolar(false);
            lfo.start();
            // Spread the three sweeps a third of a cycle apart
            lfo.base.set_phase(i as f32 / NUM_LINES as f32);
        }
        chorus.apply_settings(ChorusSettings::default());
        chorus
    }

    /// Handle for pushing settings from another thread
    pub fn params_handle(&self) -> Arc<Params<ChorusSettings>> {
        Arc::clone(&self.params)
    }

    pub fn settings(&self) -> &ChorusSettings {
        &self.settings
    }

    /// Apply settings on this thread
    pub fn apply_settings(&mut self, settings: ChorusSettings) {
        let mut settings = settings;
        for i in 0..NUM_LINES {
            settings.depth[i] = settings.depth[i].clamp(0.0, 1.0);
            settings.frequency[i] = settings.frequency[i].clamp(0.0, MAX_LFO_FREQUENCY);
            settings.feedback[i] = settings.feedback[i].clamp(0.0, MAX_FEEDBACK);
        }
        settings.wet_level = settings.wet_level.max(0.0);
        settings.dry_level = settings.dry_level.max(0.0);
        settings.spread = settings.spread.clamp(0.0, 1.0);
        self.settings = settings;
        self.update_lfo_frequencies();
    }

    fn update_lfo_frequencies(&mut self) {
        let spread = 1.0 + self.settings.spread;
        let frequencies = [
            self.settings.frequency[ChorusLine::Left as usize] * spread,
            self.settings.frequency[ChorusLine::Center as usize],
            self.settings.frequency[ChorusLine::Right as usize] / spread,
        ];
        for (lfo, frequency) in self.lfos.iter_mut().zip(frequencies) {
            lfo.set_frequency(frequency);
            lfo.update(None);
        }
    }

    /// Set sweep depth of one line (0.0 - 1.0)
    pub fn set_depth(&mut self, line: ChorusLine, depth: f32) {
        self.settings.depth[line as usize] = depth.clamp(0.0, 1.0);
    }

    /// Set LFO rate of one line in Hz
    pub fn set_frequency(&mut self, line: ChorusLine, frequency: f32) {
        self.settings.frequency[line as usize] = frequency.clamp(0.0, MAX_LFO_FREQUENCY);
        self.update_lfo_frequencies();
    }

    /// Set feedback of one line (0.0 - 0.95)
    pub fn set_feedback(&mut self, line: ChorusLine, feedback: f32) {
        self.settings.feedback[line as usize] = feedback.clamp(0.0, MAX_FEEDBACK);
    }

    pub fn set_wet_level(&mut self, wet_level: f32) {
        self.settings.wet_level = wet_level.max(0.0);
    }

    pub fn set_dry_level(&mut self, dry_level: f32) {
        self.settings.dry_level = dry_level.max(0.0);
    }

    /// Set left/right rate spread (0.0 - 1.0)
    pub fn set_spread(&mut self, spread: f32) {
        self.settings.spread = spread.clamp(0.0, 1.0);
        self.update_lfo_frequencies();
    }

    /// Effective LFO rate of one line after spread
    pub fn lfo_frequency(&self, line: ChorusLine) -> f32 {
        self.lfos[line as usize].base.frequency()
    }

    /// Current delay of one line in milliseconds
    pub fn delay_msec(&self, line: ChorusLine) -> f32 {
        self.delays[line as usize].delay_msec()
    }

    #[inline]
    fn process_line(&mut self, line: usize, input: f32) -> f32 {
        let sweep = unipolar(self.lfos[line].generate()) * self.settings.depth[line];
        let delay_samples = self.min_delay_samples + sweep * (self.max_delay_samples - self.min_delay_samples);

        let delay = &mut self.delays[line];
        delay.set_delay_samples(delay_samples);
        let out = delay.read();
        delay.write_delay_and_inc(underflow_clamp(input + self.settings.feedback[line] * out));
        out
    }
}

impl Effect for Chorus {
    fn prepare_block(&mut self) {
        if let Some(settings) = self.params.get_if_changed() {
            self.apply_settings(settings);
        }
    }

    fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
        let (in_l, in_r) = (input[0], input[1]);

        let left = self.process_line(ChorusLine::Left as usize, in_l);
        let center = self.process_line(ChorusLine::Center as usize, 0.5 * (in_l + in_r));
        let right = self.process_line(ChorusLine::Right as usize, in_r);

        let dry = self.settings.dry_level;
        let wet = self.settings.wet_level;
        output[0] = dry * in_l + wet * (left + 0.5 * center);
        output[1] = dry * in_r + wet * (right + 0.5 * center);
    }

    fn reset(&mut self) {
        for delay in &mut self.delays {
            delay.reset();
        }
    }

    fn num_channels(&self) -> usize {
        2
    }

    fn name(&self) -> &'static str {
        "Chorus"
    }
}
