//! Dynamics processor: compressor, limiter, expander and gate
//!
//! Features:
//! - Per-channel envelope followers (peak, MS or RMS detection)
//! - Soft knee: the slope is blended across the knee by Lagrange interpolation
//! - Optional channel linking (average or loudest channel drives all)
//! - Lookahead delay on the audio path so gain changes land before peaks
//! - Gain reduction metering

use std::sync::Arc;

use super::{clamp_channels, Effect, MAX_CHANNELS};
use crate::delay::DelayLine;
use crate::envelope::{EnvelopeFollower, PeakMode};
use crate::util::{convert_to_decibels, convert_to_linear, lagrange_interpolation, msec_to_samples, Params};

/// Longest lookahead accepted
pub const MAX_LOOKAHEAD_MSEC: f32 = 100.0;

/// Slope factor used by the gate regardless of ratio
const GATE_SLOPE_FACTOR: f32 = -10.0;

/// Deepest attenuation the expander and gate apply
const MIN_GAIN_DB: f32 = -96.0;

/// Gain law
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum ProcessingMode {
    /// Reduce level above the threshold by the ratio
    #[default]
    Compressor,
    /// Hold level at the threshold
    Limiter,
    /// Reduce level below the threshold by the ratio
    Expander,
    /// Close down below the threshold
    Gate,
}

/// How channel detectors are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum ChannelLink {
    /// Each channel is controlled by its own detector
    #[default]
    Disabled,
    /// Mean detector level drives every channel
    Average,
    /// Loudest detector drives every channel
    Peak,
}

/// Control-thread settings for [`DynamicsProcessor`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicsSettings {
    pub mode: ProcessingMode,
    pub threshold_db: f32,
    /// Ratio (1 - 20), ignored by the limiter
    pub ratio: f32,
    /// Knee width in dB (0 = hard knee)
    pub knee_db: f32,
    pub attack_msec: f32,
    pub release_msec: f32,
    pub lookahead_msec: f32,
    pub input_gain_db: f32,
    pub output_gain_db: f32,
    pub peak_mode: PeakMode,
    pub analog: bool,
    pub link: ChannelLink,
}

impl Default for DynamicsSettings {
    fn default() -> Self {
        Self {
            mode: ProcessingMode::Compressor,
            threshold_db: -6.0,
            ratio: 4.0,
            knee_db: 6.0,
            attack_msec: 10.0,
            release_msec: 100.0,
            lookahead_msec: 3.0,
            input_gain_db: 0.0,
            output_gain_db: 0.0,
            peak_mode: PeakMode::Peak,
            analog: true,
            link: ChannelLink::Disabled,
        }
    }
}

impl DynamicsSettings {
    /// Brickwall-style limiter preset
    pub fn limiter(threshold_db: f32) -> Self {
        Self {
            mode: ProcessingMode::Limiter,
            threshold_db,
            knee_db: 0.0,
            attack_msec: 1.0,
            release_msec: 50.0,
            lookahead_msec: 3.0,
            ..Self::default()
        }
    }
}

/// Multichannel dynamics processor
pub struct DynamicsProcessor {
    sample_rate: f32,
    num_channels: usize,
    followers: Vec<EnvelopeFollower>,
    lookahead: Vec<DelayLine>,
    slope_factor: f32,
    input_gain: f32,
    output_gain: f32,
    /// Smallest per-channel gain (dB) of the last frame
    gain_reduction_db: f32,
    settings: DynamicsSettings,
    params: Arc<Params<DynamicsSettings>>,
}

impl DynamicsProcessor {
    /// Create a new processor with default settings
    pub fn new(sample_rate: f32, num_channels: usize) -> Self {
        Self::with_settings(sample_rate, num_channels, DynamicsSettings::default())
    }

    pub fn with_settings(sample_rate: f32, num_channels: usize, settings: DynamicsSettings) -> Self {
        let sample_rate = sample_rate.max(1.0);
        let num_channels = clamp_channels(num_channels);
        let followers = (0..num_channels)
            .map(|_| {
                EnvelopeFollower::new(
                    sample_rate,
                    settings.attack_msec,
                    settings.release_msec,
                    settings.peak_mode,
                    settings.analog,
                )
            })
            .collect();
        let lookahead = (0..num_channels)
            .map(|_| DelayLine::new(sample_rate, MAX_LOOKAHEAD_MSEC / 1000.0))
            .collect();

        let mut processor = Self {
            sample_rate,
            num_channels,
            followers,
            lookahead,
            slope_factor: 0.0,
            input_gain: 1.0,
            output_gain: 1.0,
            gain_reduction_db: 0.0,
            settings,
            params: Arc::new(Params::new()),
        };
        processor.apply_settings(settings);
        tracing::debug!(
            "Dynamics processor: {} channels, {:?} at {} dB",
            num_channels,
            processor.settings.mode,
            processor.settings.threshold_db
        );
        processor
    }

    /// Handle for pushing settings from another thread
    pub fn params_handle(&self) -> Arc<Params<DynamicsSettings>> {
        Arc::clone(&self.params)
    }

    pub fn settings(&self) -> &DynamicsSettings {
        &self.settings
    }

    /// Apply settings on this thread
    pub fn apply_settings(&mut self, settings: DynamicsSettings) {
        let s = DynamicsSettings {
            threshold_db: settings.threshold_db.clamp(MIN_GAIN_DB, 20.0),
            ratio: settings.ratio.clamp(1.0, 20.0),
            knee_db: settings.knee_db.clamp(0.0, 20.0),
            attack_msec: settings.attack_msec.max(0.0),
            release_msec: settings.release_msec.max(0.0),
            lookahead_msec: settings.lookahead_msec.clamp(0.0, MAX_LOOKAHEAD_MSEC),
            ..settings
        };

        for follower in &mut self.followers {
            follower.set_attack_time(s.attack_msec);
            follower.set_release_time(s.release_msec);
            follower.set_mode(s.peak_mode);
            follower.set_analog(s.analog);
        }
        let lookahead_samples = msec_to_samples(s.lookahead_msec, self.sample_rate);
        for delay in &mut self.lookahead {
            delay.set_delay_samples(lookahead_samples);
        }

        self.slope_factor = match s.mode {
            ProcessingMode::Compressor => 1.0 - 1.0 / s.ratio,
            ProcessingMode::Limiter => 1.0,
            ProcessingMode::Expander => 1.0 / s.ratio - 1.0,
            ProcessingMode::Gate => GATE_SLOPE_FACTOR,
        };
        self.input_gain = convert_to_linear(s.input_gain_db);
        self.output_gain = convert_to_linear(s.output_gain_db);
        self.settings = s;
    }

    pub fn set_mode(&mut self, mode: ProcessingMode) {
        self.apply_settings(DynamicsSettings { mode, ..self.settings });
    }

    pub fn set_threshold_db(&mut self, threshold_db: f32) {
        self.apply_settings(DynamicsSettings {
            threshold_db,
            ..self.settings
        });
    }

    /// Set ratio (1 - 20)
    pub fn set_ratio(&mut self, ratio: f32) {
        self.apply_settings(DynamicsSettings { ratio, ..self.settings });
    }

    /// Set knee width in dB (0 - 20)
    pub fn set_knee_db(&mut self, knee_db: f32) {
        self.apply_settings(DynamicsSettings { knee_db, ..self.settings });
    }

    pub fn set_attack_time(&mut self, msec: f32) {
        self.apply_settings(DynamicsSettings {
            attack_msec: msec,
            ..self.settings
        });
    }

    pub fn set_release_time(&mut self, msec: f32) {
        self.apply_settings(DynamicsSettings {
            release_msec: msec,
            ..self.settings
        });
    }

    /// Set lookahead in milliseconds (0 - 100)
    pub fn set_lookahead_msec(&mut self, msec: f32) {
        self.apply_settings(DynamicsSettings {
            lookahead_msec: msec,
            ..self.settings
        });
    }

    pub fn set_input_gain_db(&mut self, db: f32) {
        self.apply_settings(DynamicsSettings {
            input_gain_db: db,
            ..self.settings
        });
    }

    pub fn set_output_gain_db(&mut self, db: f32) {
        self.apply_settings(DynamicsSettings {
            output_gain_db: db,
            ..self.settings
        });
    }

    pub fn set_peak_mode(&mut self, peak_mode: PeakMode) {
        self.apply_settings(DynamicsSettings { peak_mode, ..self.settings });
    }

    pub fn set_analog(&mut self, analog: bool) {
        self.apply_settings(DynamicsSettings { analog, ..self.settings });
    }

    pub fn set_channel_link(&mut self, link: ChannelLink) {
        self.apply_settings(DynamicsSettings { link, ..self.settings });
    }

    pub fn slope_factor(&self) -> f32 {
        self.slope_factor
    }

    /// Gain (dB, <= 0) applied on the last frame by the most reduced channel
    pub fn gain_reduction_db(&self) -> f32 {
        self.gain_reduction_db
    }

    /// Static gain curve: gain in dB for a detector level in dB
    pub fn gain_for_level_db(&self, level_db: f32) -> f32 {
        let threshold = self.settings.threshold_db;
        let half_knee = 0.5 * self.settings.knee_db;
        let mut slope = self.slope_factor;

        if half_knee > 0.0 && level_db > threshold - half_knee && level_db < threshold + half_knee {
            let knee_points = match self.settings.mode {
                ProcessingMode::Compressor | ProcessingMode::Limiter => {
                    [(threshold - half_knee, 0.0), (threshold + half_knee, slope)]
                }
                ProcessingMode::Expander | ProcessingMode::Gate => {
                    [(threshold - half_knee, slope), (threshold + half_knee, 0.0)]
                }
            };
            slope = lagrange_interpolation(&knee_points, level_db);
        }

        (slope * (threshold - level_db)).clamp(MIN_GAIN_DB, 0.0)
    }

    /// Detector level in dB for a follower output
    #[inline]
    fn level_db(&self, value: f32) -> f32 {
        match self.settings.peak_mode {
            // Power, not amplitude
            PeakMode::MeanSquared => 0.5 * convert_to_decibels(value),
            _ => convert_to_decibels(value),
        }
    }
}

impl Effect for DynamicsProcessor {
    fn prepare_block(&mut self) {
        if let Some(settings) = self.params.get_if_changed() {
            self.apply_settings(settings);
        }
    }

    fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
        let n = self.num_channels;
        let mut levels = [0.0f32; MAX_CHANNELS];

        for channel in 0..n {
            let x = input[channel] * self.input_gain;
            levels[channel] = self.followers[channel].process_audio(x);
        }

        match self.settings.link {
            ChannelLink::Disabled => {}
            ChannelLink::Average => {
                let mean = levels[..n].iter().sum::<f32>() / n as f32;
                levels[..n].fill(mean);
            }
            ChannelLink::Peak => {
                let peak = levels[..n].iter().fold(0.0f32, |m, l| m.max(*l));
                levels[..n].fill(peak);
            }
        }

        let mut min_gain_db = 0.0f32;
        for channel in 0..n {
            let gain_db = self.gain_for_level_db(self.level_db(levels[channel]));
            min_gain_db = min_gain_db.min(gain_db);

            let delayed = self.lookahead[channel].process_audio(input[channel] * self.input_gain);
            output[channel] = delayed * convert_to_linear(gain_db) * self.output_gain;
        }
        self.gain_reduction_db = min_gain_db;
    }

    fn reset(&mut self) {
        for follower in &mut self.followers {
            follower.reset();
        }
        for delay in &mut self.lookahead {
            delay.reset();
        }
        self.gain_reduction_db = 0.0;
    }

    fn num_channels(&self) -> usize {
        self.num_channels
    }

    fn name(&self) -> &'static str {
        "Dynamics"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slope_factors() {
        let mut dynamics = DynamicsProcessor::new(48000.0, 2);
        dynamics.set_ratio(4.0);
        dynamics.set_mode(ProcessingMode::Compressor);
        assert!((dynamics.slope_factor() - 0.75).abs() < 1e-6);
        dynamics.set_mode(ProcessingMode::Limiter);
        assert_eq!(dynamics.slope_factor(), 1.0);
        dynamics.set_mode(ProcessingMode::Expander);
        assert!((dynamics.slope_factor() + 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_below_threshold_outside_knee_is_unity() {
        let mut dynamics = DynamicsProcessor::new(48000.0, 2);
        dynamics.set_threshold_db(-12.0);
        dynamics.set_knee_db(6.0);
        for mode in [ProcessingMode::Compressor, ProcessingMode::Limiter] {
            dynamics.set_mode(mode);
            assert_eq!(dynamics.gain_for_level_db(-30.0), 0.0);
            assert_eq!(dynamics.gain_for_level_db(-15.5), 0.0);
        }
    }

    #[test]
    fn test_compressor_and_limiter_curves() {
        let mut dynamics = DynamicsProcessor::new(48000.0, 1);
        dynamics.set_threshold_db(-12.0);
        dynamics.set_knee_db(0.0);
        dynamics.set_ratio(4.0);
        // 12 dB over at 4:1 comes out 3 dB over: 9 dB of reduction
        assert!((dynamics.gain_for_level_db(0.0) + 9.0).abs() < 1e-4);

        dynamics.set_mode(ProcessingMode::Limiter);
        assert!((dynamics.gain_for_level_db(0.0) + 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_knee_blends_slope() {
        let mut dynamics = DynamicsProcessor::new(48000.0, 1);
        dynamics.set_threshold_db(-12.0);
        dynamics.set_knee_db(12.0);
        dynamics.set_ratio(4.0);
        // Mid-knee (at threshold) the gain is zero, just above it is gently reduced
        assert!(dynamics.gain_for_level_db(-12.0).abs() < 1e-6);
        let hard = {
            let mut d = DynamicsProcessor::new(48000.0, 1);
            d.set_threshold_db(-12.0);
            d.set_knee_db(0.0);
            d.gain_for_level_db(-9.0)
        };
        let soft = dynamics.gain_for_level_db(-9.0);
        assert!(soft < 0.0 && soft > hard);
    }

    #[test]
    fn test_expander_and_gate_below_threshold() {
        let mut dynamics = DynamicsProcessor::new(48000.0, 1);
        dynamics.set_threshold_db(-40.0);
        dynamics.set_knee_db(0.0);
        dynamics.set_ratio(2.0);
        dynamics.set_mode(ProcessingMode::Expander);
        assert!((dynamics.gain_for_level_db(-50.0) + 5.0).abs() < 1e-4);
        assert_eq!(dynamics.gain_for_level_db(-20.0), 0.0);

        dynamics.set_mode(ProcessingMode::Gate);
        assert_eq!(dynamics.gain_for_level_db(-60.0), MIN_GAIN_DB);
    }

    #[test]
    fn test_limiter_holds_loud_signal_down() {
        let mut dynamics = DynamicsProcessor::with_settings(48000.0, 1, DynamicsSettings::limiter(-6.0));
        let mut peak = 0.0f32;
        let mut out = [0.0];
        for n in 0..48000 {
            let x = (2.0 * std::f32::consts::PI * 100.0 * n as f32 / 48000.0).sin();
            dynamics.process_frame(&[x], &mut out);
            if n > 24000 {
                peak = peak.max(out[0].abs());
            }
        }
        assert!(peak < convert_to_linear(-4.0), "{}", peak);
        assert!(dynamics.gain_reduction_db() < 0.0);
    }

    #[test]
    fn test_linked_channels_share_gain() {
        let mut dynamics = DynamicsProcessor::new(48000.0, 2);
        dynamics.set_lookahead_msec(0.0);
        dynamics.set_channel_link(ChannelLink::Peak);
        let mut out = [0.0; 2];
        for _ in 0..4800 {
            dynamics.process_frame(&[1.0, 0.1], &mut out);
        }
        // The quiet side is ducked as much as the loud one
        assert!((out[1] / 0.1 - out[0]).abs() < 1e-4);
        assert!(out[0] < 0.9);
    }

    #[test]
    fn test_lookahead_delays_audio() {
        let mut dynamics = DynamicsProcessor::new(1000.0, 1);
        dynamics.set_lookahead_msec(5.0);
        dynamics.set_threshold_db(0.0);
        let mut input = vec![0.0f32; 10];
        input[0] = 0.5;
        let mut output = vec![0.0f32; 10];
        dynamics.process(&input, &mut output);
        assert!((output[5] - 0.5).abs() < 1e-4);
        assert!(output[..5].iter().all(|s| s.abs() < 1e-4));
    }
}
