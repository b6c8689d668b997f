//! Oscillators
//!
//! All oscillators share [`OscBase`]: a normalised phase accumulator in
//! [0, 1) plus the pitch/gain/pulse-width modulation stack.
//! - [`Osc`]: band-limited audio oscillator (PolyBLEP/DPW)
//! - [`Lfo`]: control-rate shapes with sync/one-shot modes
//! - [`WaveTableOsc`]: single-cycle table lookup
//! - [`WhiteNoise`] / [`PinkNoise`]

mod lfo;
mod noise;
#[allow(clippy::module_inception)]
mod osc;
mod wavetable;

pub use lfo::{Lfo, LfoMode, LfoType};
pub use noise::{PinkNoise, WhiteNoise};
pub(crate) use noise::XorShift;
pub use osc::{Osc, OscType};
pub use wavetable::{WaveTableOsc, WaveTableType, WAVE_TABLE_SIZE};

use crate::modulation::{ModulationMatrix, PatchDestination, VoiceId};
use crate::util::frequency_multiplier;

/// Update stage oscillator destinations are created in
pub const OSC_MOD_STAGE: u32 = 0;

const MIN_PULSE_WIDTH: f32 = 0.02;
const MAX_PULSE_WIDTH: f32 = 0.98;

/// Shared phase accumulator and modulation state
#[derive(Debug, Clone)]
pub struct OscBase {
    sample_rate: f32,
    nyquist: f32,

    base_frequency: f32,
    detune_cents: f32,
    octave: f32,
    semitones: f32,
    pitch_bend: f32,
    /// External pitch modulation in semitones
    frequency_mod: f32,

    gain: f32,
    gain_mod: f32,

    pulse_width_base: f32,
    pulse_width_mod: f32,

    // Resolved in update()
    frequency: f32,
    pulse_width: f32,
    output_gain: f32,

    pub(crate) phase: f32,
    pub(crate) phase_inc: f32,
    playing: bool,

    mod_voice: Option<VoiceId>,
    frequency_dest: Option<PatchDestination>,
    gain_dest: Option<PatchDestination>,
    pulse_width_dest: Option<PatchDestination>,
}

impl OscBase {
    pub fn new(sample_rate: f32) -> Self {
        let mut base = Self {
            sample_rate,
            nyquist: 0.5 * sample_rate,
            base_frequency: 440.0,
            detune_cents: 0.0,
            octave: 0.0,
            semitones: 0.0,
            pitch_bend: 0.0,
            frequency_mod: 0.0,
            gain: 1.0,
            gain_mod: 1.0,
            pulse_width_base: 0.5,
            pulse_width_mod: 0.0,
            frequency: 440.0,
            pulse_width: 0.5,
            output_gain: 1.0,
            phase: 0.0,
            phase_inc: 0.0,
            playing: false,
            mod_voice: None,
            frequency_dest: None,
            gain_dest: None,
            pulse_width_dest: None,
        };
        base.init(sample_rate, 0, None);
        base
    }

    /// Reset phase and optionally create pitch, gain and pulse-width destinations
    pub fn init(&mut self, sample_rate: f32, voice_id: VoiceId, mod_matrix: Option<&mut ModulationMatrix>) {
        debug_assert!(sample_rate > 0.0, "oscillator needs a positive sample rate");
        self.sample_rate = sample_rate.max(1.0);
        self.nyquist = 0.5 * self.sample_rate;
        self.phase = 0.0;
        self.mod_voice = None;
        self.frequency_dest = None;
        self.gain_dest = None;
        self.pulse_width_dest = None;

        if let Some(matrix) = mod_matrix {
            self.frequency_dest = matrix.create_patch_destination(voice_id, OSC_MOD_STAGE, 1.0);
            self.gain_dest = matrix.create_patch_destination(voice_id, OSC_MOD_STAGE, 1.0);
            self.pulse_width_dest = matrix.create_patch_destination(voice_id, OSC_MOD_STAGE, 1.0);
            if self.frequency_dest.is_some() {
                self.mod_voice = Some(voice_id);
            }
        }
        self.update(None);
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn start(&mut self) {
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Base frequency in Hz
    pub fn set_frequency(&mut self, frequency: f32) {
        self.base_frequency = frequency;
    }

    pub fn set_detune_cents(&mut self, cents: f32) {
        self.detune_cents = cents;
    }

    pub fn set_octave(&mut self, octave: f32) {
        self.octave = octave;
    }

    pub fn set_semitones(&mut self, semitones: f32) {
        self.semitones = semitones;
    }

    /// Pitch bend in semitones
    pub fn set_pitch_bend(&mut self, semitones: f32) {
        self.pitch_bend = semitones;
    }

    /// External pitch modulation in semitones
    pub fn set_frequency_mod(&mut self, semitones: f32) {
        self.frequency_mod = semitones;
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    /// Multiplier on gain
    pub fn set_gain_mod(&mut self, gain_mod: f32) {
        self.gain_mod = gain_mod;
    }

    /// Pulse width (0.02-0.98)
    pub fn set_pulse_width(&mut self, pulse_width: f32) {
        self.pulse_width_base = pulse_width.clamp(MIN_PULSE_WIDTH, MAX_PULSE_WIDTH);
    }

    /// Additive pulse-width offset
    pub fn set_pulse_width_mod(&mut self, pulse_width_mod: f32) {
        self.pulse_width_mod = pulse_width_mod;
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn pulse_width(&self) -> f32 {
        self.pulse_width
    }

    pub fn output_gain(&self) -> f32 {
        self.output_gain
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn phase_inc(&self) -> f32 {
        self.phase_inc
    }

    pub fn frequency_destination(&self) -> Option<PatchDestination> {
        self.frequency_dest
    }

    pub fn gain_destination(&self) -> Option<PatchDestination> {
        self.gain_dest
    }

    pub fn pulse_width_destination(&self) -> Option<PatchDestination> {
        self.pulse_width_dest
    }

    pub fn reset_phase(&mut self) {
        self.phase = 0.0;
    }

    /// Jump to a phase (wrapped into [0, 1))
    pub fn set_phase(&mut self, phase: f32) {
        self.phase = phase.rem_euclid(1.0);
    }

    /// Resolve modulation into frequency, gain and pulse width
    pub fn update(&mut self, mod_matrix: Option<&ModulationMatrix>) {
        let mut semitones =
            self.detune_cents * 0.01 + 12.0 * self.octave + self.semitones + self.pitch_bend + self.frequency_mod;
        let mut gain_mod = self.gain_mod;
        let mut pulse_width = self.pulse_width_base + self.pulse_width_mod;

        if let (Some(matrix), Some(voice)) = (mod_matrix, self.mod_voice) {
            let value = |dest: Option<PatchDestination>| dest.and_then(|d| matrix.get_destination_value(voice, d));
            if let Some(v) = value(self.frequency_dest) {
                semitones += v;
            }
            if let Some(v) = value(self.gain_dest) {
                gain_mod *= v;
            }
            if let Some(v) = value(self.pulse_width_dest) {
                pulse_width += v;
            }
        }

        self.frequency = (self.base_frequency * frequency_multiplier(semitones)).clamp(-self.nyquist, self.nyquist);
        self.phase_inc = self.frequency / self.sample_rate;
        self.output_gain = self.gain * gain_mod;
        self.pulse_width = pulse_width.clamp(MIN_PULSE_WIDTH, MAX_PULSE_WIDTH);
    }

    /// Wrap phase into [0, 1). Returns true when it wrapped (sync trigger).
    #[inline]
    pub fn wrap_phase(&mut self) -> bool {
        if self.phase_inc >= 0.0 && self.phase >= 1.0 {
            self.phase -= 1.0;
            true
        } else if self.phase_inc < 0.0 && self.phase < 0.0 {
            self.phase += 1.0;
            true
        } else {
            false
        }
    }

    /// Advance by one sample and wrap
    #[inline]
    pub fn update_phase(&mut self) -> bool {
        self.phase += self.phase_inc;
        self.wrap_phase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulation::Patch;

    #[test]
    fn test_pitch_stack() {
        let mut base = OscBase::new(48000.0);
        base.set_frequency(110.0);
        base.set_octave(1.0);
        base.set_semitones(12.0);
        base.set_detune_cents(-1200.0);
        base.update(None);
        assert!((base.frequency() - 220.0).abs() < 0.01);
        assert!((base.phase_inc() - 220.0 / 48000.0).abs() < 1e-7);
    }

    #[test]
    fn test_wrap_phase_reports_wrap() {
        let mut base = OscBase::new(4.0);
        base.set_frequency(1.0);
        base.update(None);
        let wraps: Vec<bool> = (0..8).map(|_| base.update_phase()).collect();
        assert_eq!(wraps, [false, false, false, true, false, false, false, true]);
    }

    #[test]
    fn test_pulse_width_clamped() {
        let mut base = OscBase::new(48000.0);
        base.set_pulse_width(0.0);
        base.set_pulse_width_mod(-0.5);
        base.update(None);
        assert_eq!(base.pulse_width(), MIN_PULSE_WIDTH);
    }

    #[test]
    fn test_frequency_limited_to_nyquist() {
        let mut base = OscBase::new(1000.0);
        base.set_frequency(5000.0);
        base.update(None);
        assert_eq!(base.frequency(), 500.0);
    }

    #[test]
    fn test_matrix_gain_and_pitch() {
        let mut matrix = ModulationMatrix::new(1);
        let mut base = OscBase::new(48000.0);
        base.init(48000.0, 0, Some(&mut matrix));
        base.set_frequency(100.0);
        let src = matrix.create_patch_source(0).unwrap();
        let pitch = base.frequency_destination().unwrap();
        let gain = base.gain_destination().unwrap();
        assert!(matrix.add_patch(0, Patch::new(
            src,
            vec![
                PatchDestination { depth: 12.0, ..pitch },
                PatchDestination { depth: 0.5, ..gain },
            ],
        )));
        matrix.set_source_value(0, src, 1.0);
        matrix.update(0, OSC_MOD_STAGE);
        base.update(Some(&matrix));
        assert!((base.frequency() - 200.0).abs() < 0.01);
        assert!((base.output_gain() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_set_phase_wraps() {
        let mut base = OscBase::new(48000.0);
        base.set_phase(1.25);
        assert!((base.phase() - 0.25).abs() < 1e-6);
        base.set_phase(-0.25);
        assert!((base.phase() - 0.75).abs() < 1e-6);
    }
}
