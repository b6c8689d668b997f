//! Amp: gain and equal-power panning stage
//!
//! The final per-voice level stage. Gain is the product of the static gain,
//! external gain modulation, note velocity and the envelope gain; pan is
//! the sum of the static pan and its modulation. Both gains are slewed so
//! control-rate updates never step the output.

use crate::modulation::{ModulationMatrix, PatchDestination, VoiceId};
use crate::util::{convert_to_linear, stereo_pan, LinearEase};

/// Update stage amp destinations are created in
pub const AMP_MOD_STAGE: u32 = 1;

/// Slew time of the channel gains after an update
const GAIN_SLEW_SEC: f32 = 0.005;

/// Stereo amp with velocity, envelope gain and pan
#[derive(Debug, Clone)]
pub struct Amp {
    sample_rate: f32,

    gain: f32,
    gain_mod: f32,
    velocity_gain: f32,
    gain_env: f32,
    pan: f32,
    pan_mod: f32,

    left_gain: LinearEase,
    right_gain: LinearEase,

    mod_voice: Option<VoiceId>,
    gain_dest: Option<PatchDestination>,
    gain_env_dest: Option<PatchDestination>,
    pan_dest: Option<PatchDestination>,
}

impl Amp {
    pub fn new(sample_rate: f32) -> Self {
        let mut amp = Self {
            sample_rate,
            gain: 1.0,
            gain_mod: 1.0,
            velocity_gain: 1.0,
            gain_env: 1.0,
            pan: 0.0,
            pan_mod: 0.0,
            left_gain: LinearEase::default(),
            right_gain: LinearEase::default(),
            mod_voice: None,
            gain_dest: None,
            gain_env_dest: None,
            pan_dest: None,
        };
        amp.init(sample_rate, 0, None);
        amp
    }

    /// Reset and optionally create gain, envelope-gain and pan destinations
    pub fn init(&mut self, sample_rate: f32, voice_id: VoiceId, mod_matrix: Option<&mut ModulationMatrix>) {
        debug_assert!(sample_rate > 0.0, "amp needs a positive sample rate");
        self.sample_rate = sample_rate.max(1.0);
        self.mod_voice = None;
        self.gain_dest = None;
        self.gain_env_dest = None;
        self.pan_dest = None;

        if let Some(matrix) = mod_matrix {
            self.gain_dest = matrix.create_patch_destination(voice_id, AMP_MOD_STAGE, 1.0);
            self.gain_env_dest = matrix.create_patch_destination(voice_id, AMP_MOD_STAGE, 1.0);
            self.pan_dest = matrix.create_patch_destination(voice_id, AMP_MOD_STAGE, 1.0);
            if self.gain_dest.is_some() {
                self.mod_voice = Some(voice_id);
            }
        }

        let (l, r) = self.target_gains(None);
        self.left_gain = LinearEase::new(self.sample_rate, l);
        self.right_gain = LinearEase::new(self.sample_rate, r);
    }

    /// Set gain in dB
    pub fn set_gain_db(&mut self, db: f32) {
        self.gain = convert_to_linear(db);
    }

    /// Set linear gain
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.max(0.0);
    }

    /// Multiplier on gain
    pub fn set_gain_mod(&mut self, gain_mod: f32) {
        self.gain_mod = gain_mod;
    }

    /// MIDI velocity (0-127), square-law
    pub fn set_velocity(&mut self, velocity: f32) {
        let v = velocity.clamp(0.0, 127.0) / 127.0;
        self.velocity_gain = v * v;
    }

    /// Envelope gain, usually the voice ADSR output
    pub fn set_gain_envelope(&mut self, gain: f32) {
        self.gain_env = gain;
    }

    /// Pan (-1 = left, 1 = right)
    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
    }

    pub fn set_pan_mod(&mut self, pan_mod: f32) {
        self.pan_mod = pan_mod;
    }

    pub fn gain_destination(&self) -> Option<PatchDestination> {
        self.gain_dest
    }

    pub fn gain_envelope_destination(&self) -> Option<PatchDestination> {
        self.gain_env_dest
    }

    pub fn pan_destination(&self) -> Option<PatchDestination> {
        self.pan_dest
    }

    fn target_gains(&self, mod_matrix: Option<&ModulationMatrix>) -> (f32, f32) {
        let mut gain = self.gain * self.gain_mod * self.velocity_gain * self.gain_env;
        let mut pan = self.pan + self.pan_mod;

        if let (Some(matrix), Some(voice)) = (mod_matrix, self.mod_voice) {
            let value = |dest: Option<PatchDestination>| dest.and_then(|d| matrix.get_destination_value(voice, d));
            if let Some(v) = value(self.gain_dest) {
                gain *= v;
            }
            if let Some(v) = value(self.gain_env_dest) {
                gain *= v;
            }
            if let Some(v) = value(self.pan_dest) {
                pan += v;
            }
        }

        let (l, r) = stereo_pan(pan);
        (l * gain, r * gain)
    }

    /// Recompute channel gains and slew towards them
    pub fn update(&mut self, mod_matrix: Option<&ModulationMatrix>) {
        let (l, r) = self.target_gains(mod_matrix);
        self.left_gain.set_value(l, GAIN_SLEW_SEC);
        self.right_gain.set_value(r, GAIN_SLEW_SEC);
    }

    /// Jump to the current targets without slewing
    pub fn update_immediate(&mut self, mod_matrix: Option<&ModulationMatrix>) {
        let (l, r) = self.target_gains(mod_matrix);
        self.left_gain.set_value_immediate(l);
        self.right_gain.set_value_immediate(r);
    }

    /// Current (left, right) gains
    pub fn gains(&self) -> (f32, f32) {
        (self.left_gain.value(), self.right_gain.value())
    }

    /// Mono in, panned stereo out
    #[inline]
    pub fn process_mono(&mut self, input: f32) -> (f32, f32) {
        (input * self.left_gain.next_value(), input * self.right_gain.next_value())
    }

    /// Stereo in, balance-panned stereo out
    #[inline]
    pub fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        (left * self.left_gain.next_value(), right * self.right_gain.next_value())
    }

    /// Process interleaved stereo frames in place
    pub fn process_stereo_block(&mut self, samples: &mut [f32]) {
        for frame in samples.chunks_exact_mut(2) {
            let (l, r) = self.process_stereo(frame[0], frame[1]);
            frame[0] = l;
            frame[1] = r;
        }
    }
}
