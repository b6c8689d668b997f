//! ADSR envelope generator
//!
//! Analog-style exponential segments: each stage approaches a target that
//! overshoots its end level by a time-constant overshoot (TCO), so the stage
//! ends at a well-defined sample count instead of approaching forever.

mod follower;

pub use follower::{EnvelopeFollower, PeakMode};

use crate::modulation::{ModulationMatrix, PatchSource, VoiceId};
use crate::util::msec_to_samples;

/// Attack overshoot in analog mode (RC charge curve)
const ANALOG_ATTACK_TCO: f32 = 0.223_130_16; // exp(-1.5)
/// Decay/release overshoot in analog mode
const ANALOG_DECAY_TCO: f32 = 0.007_083_57; // exp(-4.95)
/// Attack overshoot in digital mode (nearly linear)
const DIGITAL_ATTACK_TCO: f32 = 0.99999;
/// Decay/release overshoot in digital mode (-96 dB)
const DIGITAL_DECAY_TCO: f32 = 1.585_37e-5; // exp(-11.05)

const DEFAULT_SHUTDOWN_MSEC: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeState {
    #[default]
    Off,
    Attack,
    Decay,
    Sustain,
    Release,
    Shutdown,
}

/// One exponential segment: `value = offset + value * coefficient`
#[derive(Debug, Clone, Copy, Default)]
struct Segment {
    time_samples: f32,
    coefficient: f32,
    offset: f32,
    tco: f32,
}

impl Segment {
    fn coefficient_for(time_samples: f32, tco: f32) -> f32 {
        if time_samples <= 0.0 {
            return 0.0;
        }
        (-((1.0 + tco) / tco).ln() / time_samples).exp()
    }
}

/// ADSR envelope with legato, retrigger and fast shutdown
#[derive(Debug, Clone)]
pub struct Envelope {
    sample_rate: f32,
    state: EnvelopeState,
    current_value: f32,

    attack: Segment,
    decay: Segment,
    release: Segment,
    sustain_gain: f32,

    shutdown_msec: f32,
    shutdown_delta: f32,

    analog: bool,
    legato: bool,
    retrigger: bool,
    invert: bool,
    bias_invert: bool,
    depth: f32,
    bias_depth: f32,

    /// Last outputs of `generate`
    output: f32,
    bias_output: f32,

    mod_voice: Option<VoiceId>,
    env_source: Option<PatchSource>,
    bias_source: Option<PatchSource>,
}

impl Envelope {
    pub fn new(sample_rate: f32) -> Self {
        let mut env = Self {
            sample_rate,
            state: EnvelopeState::Off,
            current_value: 0.0,
            attack: Segment::default(),
            decay: Segment::default(),
            release: Segment::default(),
            sustain_gain: 0.7,
            shutdown_msec: DEFAULT_SHUTDOWN_MSEC,
            shutdown_delta: 0.0,
            analog: true,
            legato: false,
            retrigger: false,
            invert: false,
            bias_invert: false,
            depth: 1.0,
            bias_depth: 1.0,
            output: 0.0,
            bias_output: 0.0,
            mod_voice: None,
            env_source: None,
            bias_source: None,
        };
        env.init(sample_rate, 0, None);
        env
    }

    /// Reset to Off with default times and optionally register matrix sources
    pub fn init(&mut self, sample_rate: f32, voice_id: VoiceId, mod_matrix: Option<&mut ModulationMatrix>) {
        debug_assert!(sample_rate > 0.0, "envelope needs a positive sample rate");
        self.sample_rate = sample_rate.max(1.0);
        self.state = EnvelopeState::Off;
        self.current_value = 0.0;
        self.mod_voice = None;
        self.env_source = None;
        self.bias_source = None;

        if let Some(matrix) = mod_matrix {
            self.env_source = matrix.create_patch_source(voice_id);
            self.bias_source = matrix.create_patch_source(voice_id);
            if self.env_source.is_some() {
                self.mod_voice = Some(voice_id);
            }
        }

        self.update_tco();
        self.set_attack_time(100.0);
        self.set_decay_time(100.0);
        self.set_release_time(500.0);
    }

    fn update_tco(&mut self) {
        if self.analog {
            self.attack.tco = ANALOG_ATTACK_TCO;
            self.decay.tco = ANALOG_DECAY_TCO;
            self.release.tco = ANALOG_DECAY_TCO;
        } else {
            self.attack.tco = DIGITAL_ATTACK_TCO;
            self.decay.tco = DIGITAL_DECAY_TCO;
            self.release.tco = DIGITAL_DECAY_TCO;
        }
    }

    fn recompute_attack(&mut self) {
        let seg = &mut self.attack;
        seg.coefficient = Segment::coefficient_for(seg.time_samples, seg.tco);
        seg.offset = (1.0 + seg.tco) * (1.0 - seg.coefficient);
    }

    fn recompute_decay(&mut self) {
        let seg = &mut self.decay;
        seg.coefficient = Segment::coefficient_for(seg.time_samples, seg.tco);
        seg.offset = (self.sustain_gain - seg.tco) * (1.0 - seg.coefficient);
    }

    fn recompute_release(&mut self) {
        let seg = &mut self.release;
        seg.coefficient = Segment::coefficient_for(seg.time_samples, seg.tco);
        seg.offset = -seg.tco * (1.0 - seg.coefficient);
    }

    fn recompute_all(&mut self) {
        self.recompute_attack();
        self.recompute_decay();
        self.recompute_release();
    }

    /// Attack time in milliseconds (0 = instant)
    pub fn set_attack_time(&mut self, msec: f32) {
        self.attack.time_samples = msec_to_samples(msec.max(0.0), self.sample_rate);
        self.recompute_attack();
    }

    /// Decay time in milliseconds (0 = instant)
    pub fn set_decay_time(&mut self, msec: f32) {
        self.decay.time_samples = msec_to_samples(msec.max(0.0), self.sample_rate);
        self.recompute_decay();
    }

    /// Sustain level (0-1)
    pub fn set_sustain_gain(&mut self, gain: f32) {
        self.sustain_gain = gain.clamp(0.0, 1.0);
        self.recompute_decay();
    }

    /// Release time in milliseconds (0 = instant)
    pub fn set_release_time(&mut self, msec: f32) {
        self.release.time_samples = msec_to_samples(msec.max(0.0), self.sample_rate);
        self.recompute_release();
    }

    /// Duration of the linear fade used by `shutdown`
    pub fn set_shutdown_time(&mut self, msec: f32) {
        self.shutdown_msec = msec.max(0.0);
    }

    /// Switch between analog (curved) and digital (near-linear attack) shapes
    pub fn set_analog(&mut self, analog: bool) {
        if analog != self.analog {
            self.analog = analog;
            self.update_tco();
            self.recompute_all();
        }
    }

    pub fn is_analog(&self) -> bool {
        self.analog
    }

    pub fn set_legato(&mut self, legato: bool) {
        self.legato = legato;
    }

    pub fn set_retrigger(&mut self, retrigger: bool) {
        self.retrigger = retrigger;
    }

    pub fn set_invert(&mut self, invert: bool) {
        self.invert = invert;
    }

    pub fn set_bias_invert(&mut self, invert: bool) {
        self.bias_invert = invert;
    }

    pub fn set_depth(&mut self, depth: f32) {
        self.depth = depth;
    }

    pub fn set_bias_depth(&mut self, depth: f32) {
        self.bias_depth = depth;
    }

    pub fn sustain_gain(&self) -> f32 {
        self.sustain_gain
    }

    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    /// Raw (unscaled) envelope level
    pub fn current_value(&self) -> f32 {
        self.current_value
    }

    pub fn is_done(&self) -> bool {
        self.state == EnvelopeState::Off
    }

    /// Matrix sources for the normal and biased outputs
    pub fn mod_sources(&self) -> (Option<PatchSource>, Option<PatchSource>) {
        (self.env_source, self.bias_source)
    }

    /// Note on. Legato keeps a sounding envelope where it is.
    pub fn start(&mut self) {
        if self.legato && self.state != EnvelopeState::Off {
            return;
        }
        if self.retrigger {
            self.current_value = 0.0;
        }
        self.state = EnvelopeState::Attack;
    }

    /// Note off: enter Release from any sounding state
    pub fn stop(&mut self) {
        if self.state != EnvelopeState::Off {
            self.state = EnvelopeState::Release;
        }
    }

    /// Fast linear fade to silence (ignored in legato mode)
    pub fn shutdown(&mut self) {
        if self.legato || self.state == EnvelopeState::Off {
            return;
        }
        let samples = msec_to_samples(self.shutdown_msec, self.sample_rate).max(1.0);
        self.shutdown_delta = self.current_value / samples;
        self.state = EnvelopeState::Shutdown;
    }

    /// Immediate silence
    pub fn kill(&mut self) {
        self.current_value = 0.0;
        self.state = EnvelopeState::Off;
    }

    /// Advance one sample and return the depth-scaled output
    #[inline]
    pub fn generate(&mut self) -> f32 {
        match self.state {
            EnvelopeState::Off => {
                self.current_value = 0.0;
            }
            EnvelopeState::Attack => {
                if self.attack.time_samples <= 0.0 {
                    self.current_value = 1.0;
                } else {
                    self.current_value = self.attack.offset + self.current_value * self.attack.coefficient;
                }
                if self.current_value >= 1.0 {
                    self.current_value = 1.0;
                    self.state = EnvelopeState::Decay;
                }
            }
            EnvelopeState::Decay => {
                if self.decay.time_samples <= 0.0 {
                    self.current_value = self.sustain_gain;
                } else {
                    self.current_value = self.decay.offset + self.current_value * self.decay.coefficient;
                }
                if self.current_value <= self.sustain_gain {
                    self.current_value = self.sustain_gain;
                    self.state = EnvelopeState::Sustain;
                }
            }
            EnvelopeState::Sustain => {
                self.current_value = self.sustain_gain;
            }
            EnvelopeState::Release => {
                if self.release.time_samples <= 0.0 {
                    self.current_value = 0.0;
                } else {
                    self.current_value =
                        self.release.offset + self.current_value * self.release.coefficient;
                }
                if self.current_value <= 0.0 {
                    self.current_value = 0.0;
                    self.state = EnvelopeState::Off;
                }
            }
            EnvelopeState::Shutdown => {
                self.current_value -= self.shutdown_delta;
                if self.current_value <= 0.0 {
                    self.current_value = 0.0;
                    self.state = EnvelopeState::Off;
                }
            }
        }

        let value = if self.invert {
            1.0 - self.current_value
        } else {
            self.current_value
        };
        self.output = value * self.depth;

        let bias = (self.current_value - self.sustain_gain) * self.bias_depth;
        self.bias_output = if self.bias_invert { -bias } else { bias };

        self.output
    }

    /// Advance one sample and return (output, biased output)
    #[inline]
    pub fn generate_with_bias(&mut self) -> (f32, f32) {
        let out = self.generate();
        (out, self.bias_output)
    }

    /// Biased output of the last `generate` call
    pub fn bias_output(&self) -> f32 {
        self.bias_output
    }

    /// Publish the last outputs into the matrix sources registered at init
    pub fn publish(&self, mod_matrix: &mut ModulationMatrix) {
        let Some(voice) = self.mod_voice else {
            return;
        };
        if let Some(src) = self.env_source {
            mod_matrix.set_source_value(voice, src, self.output);
        }
        if let Some(src) = self.bias_source {
            mod_matrix.set_source_value(voice, src, self.bias_output);
        }
    }
}
