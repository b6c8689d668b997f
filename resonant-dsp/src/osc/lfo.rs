//! Low-frequency oscillator

use std::f32::consts::PI;

use super::{OscBase, XorShift};
use crate::modulation::{ModulationMatrix, PatchSource, VoiceId};
use crate::util::{bipolar, unipolar};

/// Curvature of the exponential shape
const DEFAULT_EXPONENTIAL_FACTOR: f32 = 3.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LfoType {
    #[default]
    Sine,
    UpSaw,
    DownSaw,
    Square,
    Triangle,
    Exponential,
    RandomSampleHold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LfoMode {
    /// Phase restarts on every `start`
    #[default]
    Sync,
    /// One cycle, then holds its last value
    OneShot,
    /// Phase keeps running across `start` calls
    Free,
}

/// Control-rate oscillator with an optional quadrature output
#[derive(Debug, Clone)]
pub struct Lfo {
    pub base: OscBase,
    lfo_type: LfoType,
    mode: LfoMode,
    unipolar: bool,
    exponential_factor: f32,

    /// Sample-and-hold state
    rng: XorShift,
    hold_value: f32,
    hold_counter: f32,

    output: f32,
    quad_output: f32,

    mod_voice: Option<VoiceId>,
    source: Option<PatchSource>,
    quad_source: Option<PatchSource>,
}

impl Lfo {
    pub fn new(sample_rate: f32) -> Self {
        let mut lfo = Self {
            base: OscBase::new(sample_rate),
            lfo_type: LfoType::Sine,
            mode: LfoMode::Sync,
            unipolar: false,
            exponential_factor: DEFAULT_EXPONENTIAL_FACTOR,
            rng: XorShift::default(),
            hold_value: 0.0,
            hold_counter: 0.0,
            output: 0.0,
            quad_output: 0.0,
            mod_voice: None,
            source: None,
            quad_source: None,
        };
        lfo.base.set_frequency(1.0);
        lfo.base.update(None);
        lfo
    }

    /// Reset phase; optionally register normal and quadrature matrix sources
    pub fn init(&mut self, sample_rate: f32, voice_id: VoiceId, mod_matrix: Option<&mut ModulationMatrix>) {
        self.base.init(sample_rate, voice_id, None);
        self.mod_voice = None;
        self.source = None;
        self.quad_source = None;
        if let Some(matrix) = mod_matrix {
            self.source = matrix.create_patch_source(voice_id);
            self.quad_source = matrix.create_patch_source(voice_id);
            if self.source.is_some() {
                self.mod_voice = Some(voice_id);
            }
        }
        self.hold_counter = 0.0;
    }

    pub fn set_type(&mut self, lfo_type: LfoType) {
        self.lfo_type = lfo_type;
    }

    pub fn lfo_type(&self) -> LfoType {
        self.lfo_type
    }

    pub fn set_mode(&mut self, mode: LfoMode) {
        self.mode = mode;
    }

    pub fn set_unipolar(&mut self, unipolar: bool) {
        self.unipolar = unipolar;
    }

    pub fn set_exponential_factor(&mut self, factor: f32) {
        self.exponential_factor = factor.max(0.01);
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.base.set_frequency(frequency);
    }

    pub fn set_pulse_width(&mut self, pulse_width: f32) {
        self.base.set_pulse_width(pulse_width);
    }

    pub fn update(&mut self, mod_matrix: Option<&ModulationMatrix>) {
        self.base.update(mod_matrix);
    }

    pub fn start(&mut self) {
        if self.mode != LfoMode::Free {
            self.base.reset_phase();
            self.hold_counter = 0.0;
        }
        self.base.start();
    }

    pub fn stop(&mut self) {
        self.base.stop();
    }

    pub fn is_playing(&self) -> bool {
        self.base.is_playing()
    }

    pub fn mod_sources(&self) -> (Option<PatchSource>, Option<PatchSource>) {
        (self.source, self.quad_source)
    }

    /// Bipolar shape value at `phase`
    fn shape(&self, phase: f32) -> f32 {
        match self.lfo_type {
            LfoType::Sine => (2.0 * PI * phase).sin(),
            LfoType::UpSaw => bipolar(phase),
            LfoType::DownSaw => -bipolar(phase),
            LfoType::Square => {
                if phase < self.base.pulse_width() {
                    1.0
                } else {
                    -1.0
                }
            }
            LfoType::Triangle => 2.0 * bipolar(phase).abs() - 1.0,
            LfoType::Exponential => {
                let k = self.exponential_factor;
                bipolar(((k * phase).exp() - 1.0) / (k.exp() - 1.0))
            }
            LfoType::RandomSampleHold => self.hold_value,
        }
    }

    fn advance_sample_hold(&mut self) {
        let frequency = self.base.frequency().abs().max(f32::EPSILON);
        let hold_samples = self.base.sample_rate() / frequency;
        if self.hold_counter <= 0.0 {
            self.hold_value = self.rng.next_bipolar();
            self.hold_counter += hold_samples;
        }
        self.hold_counter -= 1.0;
    }

    /// Advance one sample and return the output
    #[inline]
    pub fn generate(&mut self) -> f32 {
        self.generate_with_quad().0
    }

    /// Advance one sample and return (output, quadrature output)
    pub fn generate_with_quad(&mut self) -> (f32, f32) {
        if !self.base.is_playing() {
            return (self.output, self.quad_output);
        }

        if self.lfo_type == LfoType::RandomSampleHold {
            self.advance_sample_hold();
        }

        let phase = self.base.phase();
        let mut value = self.shape(phase);
        let mut quad = self.shape((phase + 0.25).fract());

        if self.unipolar {
            value = unipolar(value);
            quad = unipolar(quad);
        }
        let gain = self.base.output_gain();
        self.output = value * gain;
        self.quad_output = quad * gain;

        if self.base.update_phase() && self.mode == LfoMode::OneShot {
            self.base.stop();
        }

        (self.output, self.quad_output)
    }

    /// Last output without advancing
    pub fn value(&self) -> f32 {
        self.output
    }

    pub fn publish(&self, mod_matrix: &mut ModulationMatrix) {
        let Some(voice) = self.mod_voice else {
            return;
        };
        if let Some(src) = self.source {
            mod_matrix.set_source_value(voice, src, self.output);
        }
        if let Some(src) = self.quad_source {
            mod_matrix.set_source_value(voice, src, self.quad_output);
        }
    }
}
