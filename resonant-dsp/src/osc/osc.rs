//! Band-limited audio oscillator

use std::f32::consts::PI;

use super::{OscBase, XorShift};
use crate::modulation::{ModulationMatrix, VoiceId};
use crate::util::{bipolar, fast_sin_precise, poly_smooth};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OscType {
    #[default]
    Sine,
    Saw,
    Square,
    Triangle,
    Noise,
}

/// Audio-rate oscillator: PolyBLEP saw/square, DPW triangle
#[derive(Debug, Clone)]
pub struct Osc {
    pub base: OscBase,
    osc_type: OscType,
    /// Previous parabola value for the DPW triangle differentiator
    dpw_z1: f32,
    noise: XorShift,
}

impl Osc {
    pub fn new(sample_rate: f32, osc_type: OscType) -> Self {
        Self {
            base: OscBase::new(sample_rate),
            osc_type,
            dpw_z1: 0.0,
            noise: XorShift::default(),
        }
    }

    pub fn init(&mut self, sample_rate: f32, voice_id: VoiceId, mod_matrix: Option<&mut ModulationMatrix>) {
        self.base.init(sample_rate, voice_id, mod_matrix);
        self.dpw_z1 = 0.0;
    }

    pub fn set_type(&mut self, osc_type: OscType) {
        if osc_type != self.osc_type {
            self.osc_type = osc_type;
            self.dpw_z1 = 0.0;
        }
    }

    pub fn osc_type(&self) -> OscType {
        self.osc_type
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.base.set_frequency(frequency);
    }

    pub fn update(&mut self, mod_matrix: Option<&ModulationMatrix>) {
        self.base.update(mod_matrix);
    }

    pub fn start(&mut self) {
        self.base.start();
    }

    pub fn stop(&mut self) {
        self.base.stop();
    }

    pub fn reset(&mut self) {
        self.base.reset_phase();
        self.dpw_z1 = 0.0;
    }

    /// Naive saw with the discontinuity at phase 0 smoothed
    #[inline]
    fn blep_saw(phase: f32, dt: f32) -> f32 {
        bipolar(phase) - poly_smooth(phase, dt)
    }

    #[inline]
    fn waveform(&mut self) -> f32 {
        let phase = self.base.phase;
        let dt = self.base.phase_inc;

        match self.osc_type {
            OscType::Sine => fast_sin_precise(PI - 2.0 * PI * phase),
            OscType::Saw => Self::blep_saw(phase, dt),
            OscType::Square => {
                // Difference of two saws offset by the pulse width
                let pw = self.base.pulse_width();
                let shifted = (phase + 1.0 - pw).fract();
                Self::blep_saw(shifted, dt) - Self::blep_saw(phase, dt) + (2.0 * pw - 1.0)
            }
            OscType::Triangle => {
                // DPW: differentiate a piecewise parabola whose slope is a triangle
                let s = bipolar((2.0 * phase).fract());
                let hump = 1.0 - s * s;
                let parabola = if phase < 0.5 { hump } else { -hump };
                let out = if dt.abs() > f32::EPSILON {
                    (parabola - self.dpw_z1) / (8.0 * dt.abs())
                } else {
                    0.0
                };
                self.dpw_z1 = parabola;
                out.clamp(-1.0, 1.0)
            }
            OscType::Noise => self.noise.next_bipolar(),
        }
    }

    /// Render one sample and report whether the phase wrapped
    #[inline]
    pub fn tick(&mut self) -> (f32, bool) {
        if !self.base.is_playing() {
            return (0.0, false);
        }
        let sample = self.waveform() * self.base.output_gain();
        let wrapped = self.base.update_phase();
        (sample, wrapped)
    }

    /// Render one sample
    #[inline]
    pub fn generate(&mut self) -> f32 {
        self.tick().0
    }

    /// Render one sample, hard-syncing `slave` whenever this oscillator wraps
    #[inline]
    pub fn generate_synced(&mut self, slave: &mut Osc) -> (f32, f32) {
        let (master, wrapped) = self.tick();
        if wrapped {
            slave.base.reset_phase();
        }
        (master, slave.generate())
    }

    /// Fill `output` with consecutive samples
    pub fn generate_block(&mut self, output: &mut [f32]) {
        for sample in output.iter_mut() {
            *sample = self.generate();
        }
    }
}
