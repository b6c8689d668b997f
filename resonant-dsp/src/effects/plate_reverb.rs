//! Plate reverb after Dattorro's figure-of-eight tank
//!
//! Signal path:
//! - mono input -> pre-delay -> bandwidth low-pass -> 4 input diffusers
//! - two tank halves, each: modulated all-pass -> delay -> damping -> decay
//!   -> all-pass -> delay, feeding the opposite half
//! - stereo output built from 7 signed taps per side spread across the tank
//!
//! All lengths are given at the reference rate of 29761 Hz and scaled.

use std::sync::Arc;

use super::Effect;
use crate::delay::{DelayApf, DelayLine};
use crate::filter::OnePoleLowPass;
use crate::osc::{Lfo, LfoType};
use crate::util::{msec_to_samples, underflow_clamp, Params};

const REFERENCE_SAMPLE_RATE: f32 = 29761.0;

/// Input diffuser lengths
const INPUT_DIFFUSER_LENGTHS: [f32; 4] = [142.0, 107.0, 379.0, 277.0];

/// Tank lengths: (modulated all-pass, delay, all-pass, delay) per half
const LEFT_TANK: [f32; 4] = [672.0, 4453.0, 1800.0, 3720.0];
const RIGHT_TANK: [f32; 4] = [908.0, 4217.0, 2656.0, 3163.0];

/// Peak swing of the modulated all-passes in reference samples
const EXCURSION: f32 = 16.0;

/// Output tap source within the tank
#[derive(Debug, Clone, Copy)]
enum TapNode {
    LeftDelay1,
    LeftApf,
    LeftDelay2,
    RightDelay1,
    RightApf,
    RightDelay2,
}

/// (node, reference offset, sign)
const LEFT_OUTPUT_TAPS: [(TapNode, f32, f32); 7] = [
    (TapNode::RightDelay1, 266.0, 1.0),
    (TapNode::RightDelay1, 2974.0, 1.0),
    (TapNode::RightApf, 1913.0, -1.0),
    (TapNode::RightDelay2, 1996.0, 1.0),
    (TapNode::LeftDelay1, 1990.0, -1.0),
    (TapNode::LeftApf, 187.0, -1.0),
    (TapNode::LeftDelay2, 1066.0, -1.0),
];

const RIGHT_OUTPUT_TAPS: [(TapNode, f32, f32); 7] = [
    (TapNode::LeftDelay1, 353.0, 1.0),
    (TapNode::LeftDelay1, 3627.0, 1.0),
    (TapNode::LeftApf, 1228.0, -1.0),
    (TapNode::LeftDelay2, 2673.0, 1.0),
    (TapNode::RightDelay1, 2111.0, -1.0),
    (TapNode::RightApf, 335.0, -1.0),
    (TapNode::RightDelay2, 121.0, -1.0),
];

/// Output tap sum scaling
const OUTPUT_GAIN: f32 = 0.6;

const MAX_PRE_DELAY_MSEC: f32 = 500.0;

/// Control-thread settings for [`PlateReverb`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlateReverbSettings {
    pub pre_delay_msec: f32,
    /// Input low-pass (0.0 = closed, 1.0 = open)
    pub bandwidth: f32,
    pub input_diffusion1: f32,
    pub input_diffusion2: f32,
    pub decay_diffusion1: f32,
    pub decay_diffusion2: f32,
    /// Tank damping (0.0 = bright, 1.0 = dark)
    pub damping: f32,
    /// Tank feedback (0.0 - 0.99)
    pub decay: f32,
    /// Tank all-pass modulation rate in Hz
    pub modulation_rate: f32,
    /// Tank all-pass modulation depth (0.0 - 1.0 of the full excursion)
    pub modulation_depth: f32,
    pub wet_level: f32,
    pub dry_level: f32,
}

impl Default for PlateReverbSettings {
    fn default() -> Self {
        Self {
            pre_delay_msec: 0.0,
            bandwidth: 0.9995,
            input_diffusion1: 0.75,
            input_diffusion2: 0.625,
            decay_diffusion1: 0.7,
            decay_diffusion2: 0.5,
            damping: 0.0005,
            decay: 0.5,
            modulation_rate: 1.0,
            modulation_depth: 1.0,
            wet_level: 0.3,
            dry_level: 1.0,
        }
    }
}

/// One half of the tank
struct TankHalf {
    mod_apf: DelayApf,
    /// Unmodulated length of `mod_apf` in samples
    mod_apf_length: f32,
    delay1: DelayLine,
    damping: OnePoleLowPass,
    apf: DelayApf,
    delay2: DelayLine,
}

impl TankHalf {
    fn new(sample_rate: f32, lengths: &[f32; 4], excursion: f32) -> Self {
        let scale = sample_rate / REFERENCE_SAMPLE_RATE;
        let [mod_len, delay1_len, apf_len, delay2_len] = lengths.map(|l| (l * scale).max(1.0));
        let secs = |samples: f32| (samples + 2.0) / sample_rate;

        let mut mod_apf = DelayApf::new(sample_rate, secs(mod_len + excursion), -0.7);
        mod_apf.set_delay_samples(mod_len);
        let mut delay1 = DelayLine::new(sample_rate, secs(delay1_len));
        delay1.set_delay_samples(delay1_len);
        let mut apf = DelayApf::new(sample_rate, secs(apf_len), 0.5);
        apf.set_delay_samples(apf_len);
        let mut delay2 = DelayLine::new(sample_rate, secs(delay2_len));
        delay2.set_delay_samples(delay2_len);

        Self {
            mod_apf,
            mod_apf_length: mod_len,
            delay1,
            damping: OnePoleLowPass::default(),
            apf,
            delay2,
        }
    }

    /// Output of the half from the previous sample, fed to the other half
    #[inline]
    fn tail(&self) -> f32 {
        self.delay2.read()
    }

    #[inline]
    fn process(&mut self, input: f32, modulation: f32, decay: f32) {
        self.mod_apf.set_delay_samples(self.mod_apf_length + modulation);
        let x = self.mod_apf.process_audio(input);
        let x = self.delay1.process_audio(x);
        let x = self.damping.process_audio(x) * decay;
        let x = self.apf.process_audio(x);
        self.delay2.write_delay_and_inc(underflow_clamp(x));
    }

    fn reset(&mut self) {
        self.mod_apf.reset();
        self.delay1.reset();
        self.damping.reset();
        self.apf.reset();
        self.delay2.reset();
    }
}

/// Dattorro plate reverb
pub struct PlateReverb {
    sample_rate: f32,
    pre_delay: DelayLine,
    bandwidth_filter: OnePoleLowPass,
    input_diffusers: [DelayApf; 4],
    left: TankHalf,
    right: TankHalf,
    lfo: Lfo,
    /// Excursion in samples at the running rate
    excursion: f32,
    left_taps: [(TapNode, f32, f32); 7],
    right_taps: [(TapNode, f32, f32); 7],
    settings: PlateReverbSettings,
    params: Arc<Params<PlateReverbSettings>>,
}

impl PlateReverb {
    /// Create a new plate reverb with default settings
    pub fn new(sample_rate: f32) -> Self {
        let sample_rate = sample_rate.max(1.0);
        let scale = sample_rate / REFERENCE_SAMPLE_RATE;
        let excursion = EXCURSION * scale;

        let input_diffusers = INPUT_DIFFUSER_LENGTHS.map(|len| {
            let samples = (len * scale).max(1.0);
            let mut apf = DelayApf::new(sample_rate, (samples + 2.0) / sample_rate, 0.75);
            apf.set_delay_samples(samples);
            apf
        });

        let scale_taps =
            |taps: [(TapNode, f32, f32); 7]| taps.map(|(node, offset, sign)| (node, (offset * scale).max(1.0), sign));

        let mut lfo = Lfo::new(sample_rate);
        lfo.set_type(LfoType::Sine);
        lfo.start();

        let mut reverb = Self {
            sample_rate,
            pre_delay: DelayLine::new(sample_rate, MAX_PRE_DELAY_MSEC / 1000.0),
            bandwidth_filter: OnePoleLowPass::default(),
            input_diffusers,
            left: TankHalf::new(sample_rate, &LEFT_TANK, excursion),
            right: TankHalf::new(sample_rate, &RIGHT_TANK, excursion),
            lfo,
            excursion,
            left_taps: scale_taps(LEFT_OUTPUT_TAPS),
            right_taps: scale_taps(RIGHT_OUTPUT_TAPS),
            settings: PlateReverbSettings::default(),
            params: Arc::new(Params::new()),
        };
        reverb.apply_settings(PlateReverbSettings::default());
        reverb
    }

    /// Handle for pushing settings from another thread
    pub fn params_handle(&self) -> Arc<Params<PlateReverbSettings>> {
        Arc::clone(&self.params)
    }

    pub fn settings(&self) -> &PlateReverbSettings {
        &self.settings
    }

    /// Apply settings on this thread
    pub fn apply_settings(&mut self, settings: PlateReverbSettings) {
        let diffusion = |d: f32| d.clamp(0.0, 0.99);
        let s = PlateReverbSettings {
            pre_delay_msec: settings.pre_delay_msec.clamp(0.0, MAX_PRE_DELAY_MSEC),
            bandwidth: settings.bandwidth.clamp(0.0, 1.0),
            input_diffusion1: diffusion(settings.input_diffusion1),
            input_diffusion2: diffusion(settings.input_diffusion2),
            decay_diffusion1: diffusion(settings.decay_diffusion1),
            decay_diffusion2: diffusion(settings.decay_diffusion2),
            damping: settings.damping.clamp(0.0, 0.999),
            decay: settings.decay.clamp(0.0, 0.99),
            modulation_rate: settings.modulation_rate.clamp(0.0, 10.0),
            modulation_depth: settings.modulation_depth.clamp(0.0, 1.0),
            wet_level: settings.wet_level.max(0.0),
            dry_level: settings.dry_level.max(0.0),
        };

        self.pre_delay
            .set_delay_samples(msec_to_samples(s.pre_delay_msec, self.sample_rate));
        self.bandwidth_filter.set_g(1.0 - s.bandwidth);
        self.input_diffusers[0].set_g(s.input_diffusion1);
        self.input_diffusers[1].set_g(s.input_diffusion1);
        self.input_diffusers[2].set_g(s.input_diffusion2);
        self.input_diffusers[3].set_g(s.input_diffusion2);
        for half in [&mut self.left, &mut self.right] {
            half.mod_apf.set_g(-s.decay_diffusion1);
            half.apf.set_g(s.decay_diffusion2);
            half.damping.set_g(s.damping);
        }
        self.lfo.set_frequency(s.modulation_rate);
        self.lfo.update(None);
        self.settings = s;
    }

    pub fn set_pre_delay_msec(&mut self, msec: f32) {
        self.apply_settings(PlateReverbSettings {
            pre_delay_msec: msec,
            ..self.settings
        });
    }

    /// Set input bandwidth (0.0 - 1.0)
    pub fn set_bandwidth(&mut self, bandwidth: f32) {
        self.apply_settings(PlateReverbSettings { bandwidth, ..self.settings });
    }

    /// Set tank damping (0.0 - 1.0)
    pub fn set_damping(&mut self, damping: f32) {
        self.apply_settings(PlateReverbSettings { damping, ..self.settings });
    }

    /// Set tank decay (0.0 - 0.99)
    pub fn set_decay(&mut self, decay: f32) {
        self.apply_settings(PlateReverbSettings { decay, ..self.settings });
    }

    /// Set input diffusion amounts
    pub fn set_input_diffusion(&mut self, diffusion1: f32, diffusion2: f32) {
        self.apply_settings(PlateReverbSettings {
            input_diffusion1: diffusion1,
            input_diffusion2: diffusion2,
            ..self.settings
        });
    }

    /// Set tank diffusion amounts
    pub fn set_decay_diffusion(&mut self, diffusion1: f32, diffusion2: f32) {
        self.apply_settings(PlateReverbSettings {
            decay_diffusion1: diffusion1,
            decay_diffusion2: diffusion2,
            ..self.settings
        });
    }

    pub fn set_wet_level(&mut self, wet_level: f32) {
        self.settings.wet_level = wet_level.max(0.0);
    }

    pub fn set_dry_level(&mut self, dry_level: f32) {
        self.settings.dry_level = dry_level.max(0.0);
    }

    #[inline]
    fn tap(&self, node: TapNode, offset: f32) -> f32 {
        match node {
            TapNode::LeftDelay1 => self.left.delay1.read_delay_at_samples(offset),
            TapNode::LeftApf => self.left.apf.read_delay_at_samples(offset),
            TapNode::LeftDelay2 => self.left.delay2.read_delay_at_samples(offset),
            TapNode::RightDelay1 => self.right.delay1.read_delay_at_samples(offset),
            TapNode::RightApf => self.right.apf.read_delay_at_samples(offset),
            TapNode::RightDelay2 => self.right.delay2.read_delay_at_samples(offset),
        }
    }

    #[inline]
    fn sum_taps(&self, taps: &[(TapNode, f32, f32); 7]) -> f32 {
        taps.iter()
            .map(|&(node, offset, sign)| sign * self.tap(node, offset))
            .sum::<f32>()
            * OUTPUT_GAIN
    }
}

impl Effect for PlateReverb {
    fn prepare_block(&mut self) {
        if let Some(settings) = self.params.get_if_changed() {
            self.apply_settings(settings);
        }
    }

    fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
        let (in_l, in_r) = (input[0], input[1]);

        let mut x = self.pre_delay.process_audio(0.5 * (in_l + in_r));
        x = self.bandwidth_filter.process_audio(x);
        for diffuser in &mut self.input_diffusers {
            x = diffuser.process_audio(x);
        }

        let (lfo, lfo_quad) = self.lfo.generate_with_quad();
        let depth = self.excursion * self.settings.modulation_depth;
        let decay = self.settings.decay;

        let left_tail = self.left.tail();
        let right_tail = self.right.tail();
        self.left.process(x + decay * right_tail, depth * lfo, decay);
        self.right.process(x + decay * left_tail, depth * lfo_quad, decay);

        let wet_l = self.sum_taps(&self.left_taps);
        let wet_r = self.sum_taps(&self.right_taps);

        let dry = self.settings.dry_level;
        let wet = self.settings.wet_level;
        output[0] = dry * in_l + wet * wet_l;
        output[1] = dry * in_r + wet * wet_r;
    }

    fn reset(&mut self) {
        self.pre_delay.reset();
        self.bandwidth_filter.reset();
        for diffuser in &mut self.input_diffusers {
            diffuser.reset();
        }
        self.left.reset();
        self.right.reset();
    }

    fn num_channels(&self) -> usize {
        2
    }

    fn name(&self) -> &'static str {
        "PlateReverb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse_response(reverb: &mut PlateReverb, frames: usize) -> Vec<f32> {
        let mut input = vec![0.0f32; frames * 2];
        input[0] = 1.0;
        input[1] = 1.0;
        let mut output = vec![0.0f32; frames * 2];
        reverb.process(&input, &mut output);
        output
    }

    #[test]
    fn test_dry_only_is_passthrough() {
        let mut reverb = PlateReverb::new(48000.0);
        reverb.set_wet_level(0.0);
        let mut out = [0.0; 2];
        reverb.process_frame(&[0.4, -0.1], &mut out);
        assert_eq!(out, [0.4, -0.1]);
    }

    #[test]
    fn test_tail_is_stereo_and_finite() {
        let mut reverb = PlateReverb::new(48000.0);
        reverb.set_dry_level(0.0);
        reverb.set_wet_level(1.0);
        let out = impulse_response(&mut reverb, 24000);
        assert!(out.iter().all(|s| s.is_finite()));

        let left: Vec<f32> = out.iter().step_by(2).copied().collect();
        let right: Vec<f32> = out.iter().skip(1).step_by(2).copied().collect();
        let energy = |s: &[f32]| s.iter().map(|x| x * x).sum::<f32>();
        assert!(energy(&left) > 0.0 && energy(&right) > 0.0);
        let difference: f32 = left.iter().zip(&right).map(|(l, r)| (l - r) * (l - r)).sum();
        assert!(difference > 0.1 * energy(&left));
    }

    #[test]
    fn test_higher_decay_rings_longer() {
        let late_energy = |decay: f32| {
            let mut reverb = PlateReverb::new(48000.0);
            reverb.set_dry_level(0.0);
            reverb.set_wet_level(1.0);
            reverb.set_decay(decay);
            let out = impulse_response(&mut reverb, 48000);
            out[2 * 24000..].iter().map(|s| s * s).sum::<f32>()
        };
        assert!(late_energy(0.85) > 10.0 * late_energy(0.3));
    }

    #[test]
    fn test_tail_dies_out() {
        let mut reverb = PlateReverb::new(48000.0);
        reverb.set_dry_level(0.0);
        reverb.set_wet_level(1.0);
        reverb.set_decay(0.5);
        let out = impulse_response(&mut reverb, 96000);
        let early: f32 = out[..2 * 24000].iter().map(|s| s * s).sum();
        let late: f32 = out[2 * 72000..].iter().map(|s| s * s).sum();
        assert!(late < early * 0.05, "early {} late {}", early, late);
    }
}
