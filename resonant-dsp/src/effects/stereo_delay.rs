//! Stereo delay with normal, cross-feedback and ping-pong routing
//!
//! Features:
//! - Left/right delay offset through a single ratio control
//! - Click-free delay time changes (eased per sample)
//! - Optional one-pole low-pass in the feedback path

use std::sync::Arc;

use super::Effect;
use crate::delay::DelayLine;
use crate::filter::OnePoleLowPass;
use crate::util::{underflow_clamp, Params};

/// Maximum delay time in seconds
const MAX_DELAY_SECS: f32 = 2.0;

/// Largest feedback amount accepted
const MAX_FEEDBACK: f32 = 0.99;

/// Largest left/right delay ratio accepted
const MAX_DELAY_RATIO: f32 = 0.9;

/// Feedback routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum StereoDelayMode {
    /// Each channel feeds back into itself
    #[default]
    Normal,
    /// Each channel feeds back into the other
    Cross,
    /// Inputs swap sides and feedback crosses over, so echoes bounce L/R
    PingPong,
}

/// Control-thread settings for [`StereoDelay`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoDelaySettings {
    pub mode: StereoDelayMode,
    /// Delay time in milliseconds (0 - 2000)
    pub delay_time_msec: f32,
    /// Left/right offset (-0.9 - 0.9). Left = t(1 - r), right = t(1 + r)
    pub delay_ratio: f32,
    /// Feedback amount (0.0 - 0.99)
    pub feedback: f32,
    pub wet_level: f32,
    pub dry_level: f32,
    pub filter_enabled: bool,
    /// Feedback low-pass cutoff in Hz
    pub filter_frequency: f32,
}

impl Default for StereoDelaySettings {
    fn default() -> Self {
        Self {
            mode: StereoDelayMode::Normal,
            delay_time_msec: 500.0,
            delay_ratio: 0.0,
            feedback: 0.3,
            wet_level: 0.5,
            dry_level: 1.0,
            filter_enabled: false,
            filter_frequency: 8000.0,
        }
    }
}

/// Two delay lines with selectable feedback routing
pub struct StereoDelay {
    sample_rate: f32,
    delays: [DelayLine; 2],
    filters: [OnePoleLowPass; 2],
    settings: StereoDelaySettings,
    params: Arc<Params<StereoDelaySettings>>,
}

impl StereoDelay {
    /// Create a new stereo delay with default settings
    pub fn new(sample_rate: f32) -> Self {
        Self::with_settings(sample_rate, StereoDelaySettings::default())
    }

    /// Create a new stereo delay starting at `settings` (no easing)
    pub fn with_settings(sample_rate: f32, settings: StereoDelaySettings) -> Self {
        let sample_rate = sample_rate.max(1.0);
        // Room for the ratio stretching one side up to ~2x
        let max_secs = 2.0 * MAX_DELAY_SECS;
        let mut delay = Self {
            sample_rate,
            delays: [DelayLine::new(sample_rate, max_secs), DelayLine::new(sample_rate, max_secs)],
            filters: [OnePoleLowPass::default(); 2],
            settings,
            params: Arc::new(Params::new()),
        };
        delay.apply_settings(settings, true);
        delay
    }

    /// Handle for pushing settings from another thread
    pub fn params_handle(&self) -> Arc<Params<StereoDelaySettings>> {
        Arc::clone(&self.params)
    }

    pub fn settings(&self) -> &StereoDelaySettings {
        &self.settings
    }

    /// Apply settings on this thread. Delay time changes glide unless `is_init`.
    pub fn apply_settings(&mut self, settings: StereoDelaySettings, is_init: bool) {
        let mut settings = settings;
        settings.delay_time_msec = settings.delay_time_msec.clamp(0.0, MAX_DELAY_SECS * 1000.0);
        settings.delay_ratio = settings.delay_ratio.clamp(-MAX_DELAY_RATIO, MAX_DELAY_RATIO);
        settings.feedback = settings.feedback.clamp(0.0, MAX_FEEDBACK);
        settings.wet_level = settings.wet_level.max(0.0);
        settings.dry_level = settings.dry_level.max(0.0);
        settings.filter_frequency = settings.filter_frequency.clamp(20.0, 0.49 * self.sample_rate);
        self.settings = settings;

        // Reads happen before writes, so one sample is the shortest usable delay
        let min_msec = 1000.0 / self.sample_rate;
        let t = settings.delay_time_msec;
        let r = settings.delay_ratio;
        self.delays[0].set_eased_delay_msec((t * (1.0 - r)).max(min_msec), is_init);
        self.delays[1].set_eased_delay_msec((t * (1.0 + r)).max(min_msec), is_init);

        for filter in &mut self.filters {
            filter.set_frequency(settings.filter_frequency, self.sample_rate);
        }
    }

    /// Set routing mode
    pub fn set_mode(&mut self, mode: StereoDelayMode) {
        self.apply_settings(StereoDelaySettings { mode, ..self.settings }, false);
    }

    /// Set delay time in milliseconds (eased)
    pub fn set_delay_time_msec(&mut self, msec: f32) {
        self.apply_settings(StereoDelaySettings { delay_time_msec: msec, ..self.settings }, false);
    }

    /// Set left/right offset (-0.9 - 0.9)
    pub fn set_delay_ratio(&mut self, ratio: f32) {
        self.apply_settings(StereoDelaySettings { delay_ratio: ratio, ..self.settings }, false);
    }

    /// Set feedback amount (0.0 - 0.99)
    pub fn set_feedback(&mut self, feedback: f32) {
        self.apply_settings(StereoDelaySettings { feedback, ..self.settings }, false);
    }

    pub fn set_wet_level(&mut self, wet_level: f32) {
        self.settings.wet_level = wet_level.max(0.0);
    }

    pub fn set_dry_level(&mut self, dry_level: f32) {
        self.settings.dry_level = dry_level.max(0.0);
    }

    /// Enable the feedback low-pass at `frequency` Hz
    pub fn set_filter(&mut self, enabled: bool, frequency: f32) {
        self.apply_settings(
            StereoDelaySettings {
                filter_enabled: enabled,
                filter_frequency: frequency,
                ..self.settings
            },
            false,
        );
    }

    /// Current (left, right) delay times in milliseconds
    pub fn delay_times_msec(&self) -> (f32, f32) {
        (self.delays[0].delay_msec(), self.delays[1].delay_msec())
    }
}

impl Effect for StereoDelay {
    fn prepare_block(&mut self) {
        if let Some(settings) = self.params.get_if_changed() {
            self.apply_settings(settings, false);
        }
    }

    fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
        let (in_l, in_r) = (input[0], input[1]);

        for delay in &mut self.delays {
            delay.advance_ease();
        }
        let out_l = self.delays[0].read();
        let out_r = self.delays[1].read();

        let (mut fb_l, mut fb_r) = (out_l, out_r);
        if self.settings.filter_enabled {
            fb_l = self.filters[0].process_audio(fb_l);
            fb_r = self.filters[1].process_audio(fb_r);
        }
        let fb = self.settings.feedback;

        let (write_l, write_r) = match self.settings.mode {
            StereoDelayMode::Normal => (in_l + fb * fb_l, in_r + fb * fb_r),
            StereoDelayMode::Cross => (in_l + fb * fb_r, in_r + fb * fb_l),
            StereoDelayMode::PingPong => (in_r + fb * fb_r, in_l + fb * fb_l),
        };

        self.delays[0].write_delay_and_inc(underflow_clamp(write_l));
        self.delays[1].write_delay_and_inc(underflow_clamp(write_r));

        let dry = self.settings.dry_level;
        let wet = self.settings.wet_level;
        output[0] = dry * in_l + wet * out_l;
        output[1] = dry * in_r + wet * out_r;
    }

    fn reset(&mut self) {
        for delay in &mut self.delays {
            delay.reset();
        }
        for filter in &mut self.filters {
            filter.reset();
        }
    }

    fn num_channels(&self) -> usize {
        2
    }

    fn name(&self) -> &'static str {
        "StereoDelay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse_response(delay: &mut StereoDelay, frames: usize) -> Vec<f32> {
        let mut input = vec![0.0f32; frames * 2];
        input[0] = 1.0;
        let mut output = vec![0.0f32; frames * 2];
        delay.process(&input, &mut output);
        output
    }

    #[test]
    fn test_normal_mode_echoes_same_side() {
        let mut delay = StereoDelay::with_settings(
            1000.0,
            StereoDelaySettings {
                delay_time_msec: 10.0,
                feedback: 0.5,
                wet_level: 1.0,
                dry_level: 0.0,
                ..Default::default()
            },
        );
        let out = impulse_response(&mut delay, 40);
        assert!((out[10 * 2] - 1.0).abs() < 1e-6);
        assert!((out[20 * 2] - 0.5).abs() < 1e-6);
        assert!(out.iter().skip(1).step_by(2).all(|s| *s == 0.0));
    }

    #[test]
    fn test_cross_mode_alternates_feedback() {
        let mut delay = StereoDelay::with_settings(
            1000.0,
            StereoDelaySettings {
                mode: StereoDelayMode::Cross,
                delay_time_msec: 10.0,
                feedback: 0.5,
                wet_level: 1.0,
                dry_level: 0.0,
                ..Default::default()
            },
        );
        let out = impulse_response(&mut delay, 40);
        assert!((out[10 * 2] - 1.0).abs() < 1e-6);
        assert!((out[20 * 2 + 1] - 0.5).abs() < 1e-6);
        assert!((out[30 * 2] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_ratio_offsets_sides() {
        let delay = StereoDelay::with_settings(
            48000.0,
            StereoDelaySettings {
                delay_time_msec: 100.0,
                delay_ratio: 0.5,
                ..Default::default()
            },
        );
        let (l, r) = delay.delay_times_msec();
        assert!((l - 50.0).abs() < 1e-3);
        assert!((r - 150.0).abs() < 1e-3);
    }

    #[test]
    fn test_feedback_clamped() {
        let mut delay = StereoDelay::new(48000.0);
        delay.set_feedback(4.0);
        assert_eq!(delay.settings().feedback, MAX_FEEDBACK);
    }

    #[test]
    fn test_params_applied_on_next_block() {
        let mut delay = StereoDelay::new(48000.0);
        let handle = delay.params_handle();
        handle.set(&StereoDelaySettings {
            wet_level: 0.0,
            dry_level: 0.25,
            ..Default::default()
        });
        let mut output = [0.0f32; 2];
        delay.process(&[1.0, 1.0], &mut output);
        assert_eq!(output, [0.25, 0.25]);
    }

    #[test]
    fn test_eased_delay_change_glides() {
        let mut delay = StereoDelay::with_settings(
            48000.0,
            StereoDelaySettings {
                delay_time_msec: 100.0,
                ..Default::default()
            },
        );
        delay.set_delay_time_msec(200.0);
        let mut output = vec![0.0f32; 2 * 64];
        delay.process(&vec![0.0f32; 2 * 64], &mut output);
        let (l, _) = delay.delay_times_msec();
        assert!(l > 100.0 && l < 200.0, "{}", l);
    }
}
