//! Granular synthesizer
//!
//! Grains are short windowed bursts drawn from a fixed pool. A spawn clock
//! fires every `sample_rate / grains_per_second` frames; each tick rolls
//! against the grain probability to decide whether a grain actually starts.
//! In synthesis mode a grain is an oscillator burst, in granulation mode it
//! reads the source buffer from the current playhead position.
//!
//! Signal flow per frame: sum of active grains -> [`Amp`] -> safety limiter
//! -> note ADSR.

mod envelope;
mod grain;

pub use envelope::{GrainEnvelope, GrainEnvelopeType};
pub use grain::{GrainData, GrainId, GrainParam};

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::amp::Amp;
use crate::effects::{DynamicsProcessor, DynamicsSettings, Effect};
use crate::envelope::Envelope;
use crate::osc::OscType;
use crate::sample::{SampleBuffer, SampleBufferReceiver, SeekType};
use crate::util::{frequency_from_midi, frequency_multiplier};
use grain::{Grain, GrainModulation};

/// Hard cap on simultaneously sounding grains
pub const MAX_GRAINS: usize = 256;

/// Grains preallocated at construction; the pool grows up to [`MAX_GRAINS`]
const INITIAL_POOL_SIZE: usize = 64;

const MIN_GRAINS_PER_SECOND: f32 = 0.1;
const MAX_GRAINS_PER_SECOND: f32 = 1000.0;
const MIN_GRAIN_DURATION_MSEC: f32 = 1.0;
const MAX_GRAIN_DURATION_MSEC: f32 = 2000.0;
const LIMITER_THRESHOLD_DB: f32 = -3.0;
/// Note that maps the frequency and pitch parameters to their base values
const REFERENCE_NOTE: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum GranularMode {
    /// Grains are oscillator bursts
    #[default]
    Synthesis,
    /// Grains read the loaded sample buffer
    Granulation,
}

/// In-flight playhead seek
#[derive(Debug, Clone, Copy)]
struct Seek {
    start_frame: f64,
    target_frame: f64,
    elapsed: u32,
    length: u32,
}

pub struct GranularSynth {
    sample_rate: f32,
    mode: GranularMode,

    pool: Vec<Grain>,
    free_list: Vec<usize>,
    active_list: Vec<usize>,
    envelope: GrainEnvelope,
    rng: SmallRng,

    grains_per_second: f32,
    probability: f32,
    next_spawn_frame: f32,
    current_spawn_frame_count: f32,
    spawn_opportunities: u64,
    grains_spawned: u64,

    osc_type: OscType,
    pitch: GrainParam,
    volume: GrainParam,
    pan: GrainParam,
    duration: GrainParam,
    frequency: GrainParam,
    modulation: GrainModulation,

    buffer: Option<Arc<SampleBuffer>>,
    playback_speed: f32,
    playhead_frame: f64,
    seek: Option<Seek>,
    scrub_mode: bool,

    note: Option<f32>,
    note_ratio: f64,
    note_frames_remaining: Option<u64>,

    amp: Amp,
    limiter: DynamicsProcessor,
    gain_env: Envelope,
}

impl GranularSynth {
    /// Create a synth with an entropy-seeded random source
    pub fn new(sample_rate: f32) -> Self {
        Self::with_rng(sample_rate, SmallRng::from_entropy())
    }

    /// Create a synth with a deterministic random source
    pub fn with_seed(sample_rate: f32, seed: u64) -> Self {
        Self::with_rng(sample_rate, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(sample_rate: f32, rng: SmallRng) -> Self {
        let sample_rate = sample_rate.max(1.0);
        let mut pool = Vec::with_capacity(MAX_GRAINS);
        pool.extend((0..INITIAL_POOL_SIZE).map(|i| Grain::new(GrainId(i), sample_rate)));
        let mut free_list = Vec::with_capacity(MAX_GRAINS);
        free_list.extend((0..INITIAL_POOL_SIZE).rev());

        let mut gain_env = Envelope::new(sample_rate);
        gain_env.set_attack_time(10.0);
        gain_env.set_decay_time(20.0);
        gain_env.set_sustain_gain(1.0);
        gain_env.set_release_time(500.0);

        let mut amp = Amp::new(sample_rate);
        amp.update_immediate(None);

        let grains_per_second = 20.0;
        Self {
            sample_rate,
            mode: GranularMode::Synthesis,
            pool,
            free_list,
            active_list: Vec::with_capacity(MAX_GRAINS),
            envelope: GrainEnvelope::new(),
            rng,
            grains_per_second,
            probability: 1.0,
            next_spawn_frame: sample_rate / grains_per_second,
            current_spawn_frame_count: 0.0,
            spawn_opportunities: 0,
            grains_spawned: 0,
            osc_type: OscType::Sine,
            pitch: GrainParam::new(0.0, 0.0),
            volume: GrainParam::new(1.0, 0.0),
            pan: GrainParam::new(0.0, 0.0),
            duration: GrainParam::new(100.0, 0.0),
            frequency: GrainParam::new(frequency_from_midi(REFERENCE_NOTE), 0.0),
            modulation: GrainModulation::default(),
            buffer: None,
            playback_speed: 1.0,
            playhead_frame: 0.0,
            seek: None,
            scrub_mode: false,
            note: None,
            note_ratio: 1.0,
            note_frames_remaining: None,
            amp,
            limiter: DynamicsProcessor::with_settings(sample_rate, 2, DynamicsSettings::limiter(LIMITER_THRESHOLD_DB)),
            gain_env,
        }
    }

    pub fn set_mode(&mut self, mode: GranularMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> GranularMode {
        self.mode
    }

    // Notes

    /// Start a note. A positive `duration_sec` schedules its own note-off.
    pub fn note_on(&mut self, midi_note: u8, velocity: u8, duration_sec: f32) {
        let note = midi_note.min(127) as f32;
        self.note = Some(note);
        self.note_ratio = frequency_multiplier(note - REFERENCE_NOTE) as f64;
        self.note_frames_remaining = (duration_sec > 0.0).then(|| (duration_sec * self.sample_rate) as u64);
        self.current_spawn_frame_count = self.next_spawn_frame;

        self.amp.set_velocity(velocity as f32);
        self.amp.update(None);
        self.gain_env.start();
        tracing::debug!(midi_note, velocity, duration_sec, "Granular note on");
    }

    /// Release the note. Spawning continues until the release finishes;
    /// `kill` silences immediately and clears active grains.
    pub fn note_off(&mut self, midi_note: u8, kill: bool) {
        if self.note != Some(midi_note.min(127) as f32) {
            return;
        }
        self.note = None;
        self.note_frames_remaining = None;
        if kill {
            self.gain_env.kill();
            let Self { active_list, free_list, .. } = self;
            free_list.extend(active_list.drain(..));
        } else {
            self.gain_env.stop();
        }
    }

    pub fn is_note_active(&self) -> bool {
        self.note.is_some()
    }

    /// True while the note or its release tail is still sounding
    pub fn is_sounding(&self) -> bool {
        !self.gain_env.is_done()
    }

    // Grain parameters

    pub fn set_grain_osc_type(&mut self, osc_type: OscType) {
        self.osc_type = osc_type;
    }

    pub fn set_grain_envelope_type(&mut self, envelope_type: GrainEnvelopeType) {
        self.envelope.set_type(envelope_type);
    }

    pub fn set_grains_per_second(&mut self, grains_per_second: f32) {
        self.grains_per_second = grains_per_second.clamp(MIN_GRAINS_PER_SECOND, MAX_GRAINS_PER_SECOND);
        self.next_spawn_frame = self.sample_rate / self.grains_per_second;
    }

    /// Chance (0.0 - 1.0) that a spawn tick produces a grain
    pub fn set_grain_probability(&mut self, probability: f32) {
        self.probability = probability.clamp(0.0, 1.0);
    }

    /// Pitch in semitones
    pub fn set_grain_pitch(&mut self, base: f32, range: f32) {
        self.pitch = GrainParam::new(base, range);
    }

    /// Linear volume
    pub fn set_grain_volume(&mut self, base: f32, range: f32) {
        self.volume = GrainParam::new(base.max(0.0), range);
    }

    pub fn set_grain_pan(&mut self, base: f32, range: f32) {
        self.pan = GrainParam::new(base.clamp(-1.0, 1.0), range);
    }

    /// Grain length in milliseconds
    pub fn set_grain_duration(&mut self, base_msec: f32, range_msec: f32) {
        self.duration = GrainParam::new(
            base_msec.clamp(MIN_GRAIN_DURATION_MSEC, MAX_GRAIN_DURATION_MSEC),
            range_msec,
        );
    }

    /// Oscillator frequency in Hz for synthesis grains at the reference note
    pub fn set_grain_frequency(&mut self, base_hz: f32, range_hz: f32) {
        self.frequency = GrainParam::new(base_hz.max(0.0), range_hz);
    }

    // Modulation of active grains

    /// Semitone offset applied to every active grain
    pub fn set_grain_pitch_modulation(&mut self, semitones: f32) {
        self.modulation.pitch = semitones;
        self.apply_grain_modulation();
    }

    pub fn set_grain_volume_modulation(&mut self, volume: f32) {
        self.modulation.volume = volume.max(0.0);
        self.apply_grain_modulation();
    }

    pub fn set_grain_pan_modulation(&mut self, pan: f32) {
        self.modulation.pan = pan;
        self.apply_grain_modulation();
    }

    /// Life advance per frame. 2.0 makes active grains end twice as fast.
    pub fn set_grain_duration_scale(&mut self, scale: f32) {
        self.modulation.duration_scale = scale.max(0.0);
        self.apply_grain_modulation();
    }

    /// Semitone offset on synthesis grain oscillators
    pub fn set_grain_frequency_modulation(&mut self, semitones: f32) {
        self.modulation.frequency = semitones;
        self.apply_grain_modulation();
    }

    fn apply_grain_modulation(&mut self) {
        let Self {
            pool,
            active_list,
            modulation,
            ..
        } = self;
        for &index in active_list.iter() {
            pool[index].apply_modulation(modulation);
        }
    }

    // Note envelope and output

    pub fn set_attack_time(&mut self, msec: f32) {
        self.gain_env.set_attack_time(msec);
    }

    pub fn set_decay_time(&mut self, msec: f32) {
        self.gain_env.set_decay_time(msec);
    }

    pub fn set_sustain_gain(&mut self, gain: f32) {
        self.gain_env.set_sustain_gain(gain);
    }

    pub fn set_release_time(&mut self, msec: f32) {
        self.gain_env.set_release_time(msec);
    }

    pub fn set_gain_db(&mut self, db: f32) {
        self.amp.set_gain_db(db);
        self.amp.update(None);
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.amp.set_pan(pan);
        self.amp.update(None);
    }

    // Playhead

    /// Playhead rate multiplier (negative plays backwards)
    pub fn set_playback_speed(&mut self, speed: f32) {
        self.playback_speed = speed;
    }

    /// Freeze automatic playhead movement; only seeks move it
    pub fn set_scrub_mode(&mut self, scrub_mode: bool) {
        self.scrub_mode = scrub_mode;
    }

    /// Move the playhead, gliding over `lerp_time_sec` when positive
    pub fn seek(&mut self, time_sec: f32, lerp_time_sec: f32, seek_type: SeekType) {
        let Some(buffer) = &self.buffer else {
            return;
        };
        let total = buffer.num_frames() as f64;
        if total <= 0.0 {
            return;
        }
        let rate = buffer.sample_rate() as f64;
        let frames = time_sec as f64 * rate;
        let target = match seek_type {
            SeekType::FromBeginning => frames,
            SeekType::FromCurrentPosition => self.playhead_frame + frames,
            SeekType::FromEnd => total - frames,
        }
        .rem_euclid(total);

        let length = (lerp_time_sec.max(0.0) * self.sample_rate) as u32;
        if length == 0 {
            self.playhead_frame = target;
            self.seek = None;
        } else {
            self.seek = Some(Seek {
                start_frame: self.playhead_frame,
                target_frame: target,
                elapsed: 0,
                length,
            });
        }
    }

    // Buffer hand-off

    /// Replace the source buffer on this thread. Returns the previous buffer.
    pub fn set_sample_buffer(&mut self, buffer: Arc<SampleBuffer>) -> Option<Arc<SampleBuffer>> {
        self.playhead_frame = 0.0;
        self.seek = None;
        tracing::debug!(
            frames = buffer.num_frames(),
            channels = buffer.num_channels(),
            sample_rate = buffer.sample_rate(),
            "Granular source buffer set"
        );
        self.buffer.replace(buffer)
    }

    /// Take a pending buffer from the control thread, retiring the old one
    pub fn apply_pending_buffer(&mut self, receiver: &mut SampleBufferReceiver) {
        if let Some(buffer) = receiver.try_recv() {
            if let Some(old) = self.set_sample_buffer(buffer) {
                receiver.retire(old);
            }
        }
    }

    // Queries

    pub fn num_active_grains(&self) -> usize {
        self.active_list.len()
    }

    /// Playhead position in seconds
    pub fn current_playhead_time(&self) -> f32 {
        match &self.buffer {
            Some(buffer) => (self.playhead_frame / buffer.sample_rate() as f64) as f32,
            None => 0.0,
        }
    }

    /// Length of the source buffer in seconds (0 when none is loaded)
    pub fn sample_duration(&self) -> f32 {
        self.buffer.as_ref().map(|b| b.duration_secs()).unwrap_or(0.0)
    }

    pub fn gain_reduction_db(&self) -> f32 {
        self.limiter.gain_reduction_db()
    }

    /// Render interleaved stereo frames. Silent when no note is sounding.
    pub fn generate(&mut self, output: &mut [f32]) {
        self.amp.update(None);
        self.limiter.prepare_block();

        for frame in output.chunks_exact_mut(2) {
            self.tick_note_duration();

            // Grains keep spawning through the release tail
            if !self.gain_env.is_done() {
                self.tick_spawn();
            }
            self.advance_playhead();

            let (mut left, mut right) = (0.0f32, 0.0f32);
            let Self {
                pool,
                active_list,
                free_list,
                envelope,
                buffer,
                mode,
                ..
            } = self;
            let buffer = buffer.as_deref();
            active_list.retain(|&index| {
                let grain = &mut pool[index];
                let (l, r) = grain.generate(*mode, buffer, envelope);
                left += l;
                right += r;
                if grain.is_done() {
                    free_list.push(index);
                    false
                } else {
                    true
                }
            });

            let (l, r) = self.amp.process_stereo(left, right);
            self.limiter.process_frame(&[l, r], frame);
            let gain = self.gain_env.generate();
            frame[0] *= gain;
            frame[1] *= gain;
        }
    }

    fn tick_note_duration(&mut self) {
        if let Some(remaining) = self.note_frames_remaining.as_mut() {
            if *remaining == 0 {
                if let Some(note) = self.note {
                    self.note_off(note as u8, false);
                }
            } else {
                *remaining -= 1;
            }
        }
    }

    fn tick_spawn(&mut self) {
        self.current_spawn_frame_count += 1.0;
        if self.current_spawn_frame_count < self.next_spawn_frame {
            return;
        }
        self.current_spawn_frame_count -= self.next_spawn_frame;
        self.spawn_opportunities += 1;
        if self.rng.gen::<f32>() < self.probability {
            self.spawn_grain();
        }
    }

    fn spawn_grain(&mut self) {
        let index = match self.free_list.pop() {
            Some(index) => index,
            None if self.pool.len() < MAX_GRAINS => {
                let index = self.pool.len();
                self.pool.push(Grain::new(GrainId(index), self.sample_rate));
                index
            }
            None => return,
        };

        let data = GrainData {
            duration_msec: self
                .duration
                .value(&mut self.rng)
                .clamp(MIN_GRAIN_DURATION_MSEC, MAX_GRAIN_DURATION_MSEC),
            frequency: self.frequency.value(&mut self.rng).max(0.0) * self.note_ratio as f32,
            pitch: self.pitch.value(&mut self.rng),
            volume: self.volume.value(&mut self.rng).max(0.0),
            pan: self.pan.value(&mut self.rng).clamp(-1.0, 1.0),
            buffer_seek_time: self.current_playhead_time(),
        };

        let buffer = self.buffer.as_deref();
        let read_ratio = buffer
            .map(|b| self.note_ratio * b.sample_rate() as f64 / self.sample_rate as f64)
            .unwrap_or(self.note_ratio);
        self.pool[index].start(data, self.osc_type, read_ratio, buffer, &self.modulation);
        self.active_list.push(index);
        self.grains_spawned += 1;
    }

    fn advance_playhead(&mut self) {
        let Some(buffer) = &self.buffer else {
            return;
        };
        let total = buffer.num_frames() as f64;
        if total <= 0.0 {
            return;
        }

        if let Some(seek) = self.seek.as_mut() {
            seek.elapsed += 1;
            let t = (seek.elapsed as f64 / seek.length as f64).min(1.0);
            self.playhead_frame = seek.start_frame + (seek.target_frame - seek.start_frame) * t;
            if seek.elapsed >= seek.length {
                self.seek = None;
            }
            return;
        }

        if !self.scrub_mode {
            let inc = self.playback_speed as f64 * buffer.sample_rate() as f64 / self.sample_rate as f64;
            self.playhead_frame = (self.playhead_frame + inc).rem_euclid(total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::sample_buffer_channel;

    const SR: f32 = 48000.0;

    fn render(synth: &mut GranularSynth, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames * 2];
        synth.generate(&mut out);
        out
    }

    #[test]
    fn test_silent_without_note() {
        let mut synth = GranularSynth::with_seed(SR, 1);
        let out = render(&mut synth, 4800);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(synth.num_active_grains(), 0);
    }

    #[test]
    fn test_note_spawns_grains() {
        let mut synth = GranularSynth::with_seed(SR, 2);
        synth.set_grains_per_second(100.0);
        synth.set_grain_duration(50.0, 0.0);
        synth.note_on(60, 127, 0.0);
        let out = render(&mut synth, 4800);
        assert!(synth.num_active_grains() > 0);
        assert!(out.iter().any(|s| s.abs() > 1e-3));
        assert!(out.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_spawn_rate_converges_to_probability() {
        let mut synth = GranularSynth::with_seed(SR, 42);
        synth.set_grains_per_second(1000.0);
        synth.set_grain_duration(1.0, 0.0);
        synth.set_grain_probability(0.3);
        synth.note_on(60, 100, 0.0);
        render(&mut synth, 48000 * 10);

        assert!(synth.spawn_opportunities >= 9999);
        let ratio = synth.grains_spawned as f64 / synth.spawn_opportunities as f64;
        assert!((ratio - 0.3).abs() < 0.02, "ratio {}", ratio);
    }

    #[test]
    fn test_pool_is_capped() {
        let mut synth = GranularSynth::with_seed(SR, 3);
        synth.set_grains_per_second(1000.0);
        synth.set_grain_duration(2000.0, 0.0);
        synth.note_on(60, 100, 0.0);
        render(&mut synth, 48000);
        assert_eq!(synth.num_active_grains(), MAX_GRAINS);
        assert_eq!(synth.pool.len(), MAX_GRAINS);
    }

    #[test]
    fn test_grains_return_to_free_list() {
        let mut synth = GranularSynth::with_seed(SR, 4);
        synth.set_grains_per_second(50.0);
        synth.set_grain_duration(10.0, 0.0);
        synth.set_release_time(10.0);
        synth.note_on(60, 100, 0.0);
        render(&mut synth, 4800);
        synth.note_off(60, false);
        render(&mut synth, 4800);
        assert!(!synth.is_sounding());
        assert_eq!(synth.num_active_grains(), 0);
        assert_eq!(synth.free_list.len(), synth.pool.len());
    }

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    #[test]
    fn test_release_tail_keeps_spawning() {
        let mut synth = GranularSynth::with_seed(SR, 11);
        synth.set_grains_per_second(200.0);
        synth.set_grain_duration(20.0, 0.0);
        synth.set_release_time(1000.0);
        synth.note_on(60, 127, 0.0);
        let held = peak(&render(&mut synth, 4800));
        assert!(held > 0.01);

        synth.note_off(60, false);
        assert!(!synth.is_note_active());
        assert!(synth.is_sounding());

        render(&mut synth, 4800);
        let early = peak(&render(&mut synth, 4800));
        assert!(early > 0.1 * held, "held {} early tail {}", held, early);
        assert!(synth.num_active_grains() > 0);

        render(&mut synth, 24000);
        let late = peak(&render(&mut synth, 4800));
        assert!(late < early, "early {} late {}", early, late);

        render(&mut synth, 48000 * 4);
        assert!(!synth.is_sounding());
        let spawned = synth.grains_spawned;
        let out = render(&mut synth, 4800);
        assert_eq!(synth.grains_spawned, spawned);
        assert_eq!(synth.num_active_grains(), 0);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_kill_clears_grains() {
        let mut synth = GranularSynth::with_seed(SR, 5);
        synth.set_grains_per_second(200.0);
        synth.note_on(64, 100, 0.0);
        render(&mut synth, 2400);
        synth.note_off(64, true);
        assert_eq!(synth.num_active_grains(), 0);
        let out = render(&mut synth, 480);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_auto_note_off() {
        let mut synth = GranularSynth::with_seed(SR, 6);
        synth.note_on(60, 100, 0.1);
        render(&mut synth, 4800);
        assert!(synth.is_note_active());
        render(&mut synth, 10);
        assert!(!synth.is_note_active());
    }

    #[test]
    fn test_duration_scale_shortens_active_grains() {
        let mut synth = GranularSynth::with_seed(SR, 7);
        synth.set_grains_per_second(0.1);
        synth.set_grain_duration(100.0, 0.0);
        synth.note_on(60, 100, 0.0);
        render(&mut synth, 1);
        assert_eq!(synth.num_active_grains(), 1);
        synth.set_grain_duration_scale(4.0);
        render(&mut synth, 1300);
        assert_eq!(synth.num_active_grains(), 0);
    }

    #[test]
    fn test_playhead_wraps_and_scrub_freezes() {
        let mut synth = GranularSynth::with_seed(SR, 8);
        let buffer = Arc::new(SampleBuffer::new(vec![0; 4800], 1, 48000).unwrap());
        synth.set_sample_buffer(buffer);
        assert!((synth.sample_duration() - 0.1).abs() < 1e-6);

        render(&mut synth, 7200);
        assert!((synth.current_playhead_time() - 0.05).abs() < 1e-4);

        synth.set_scrub_mode(true);
        render(&mut synth, 1000);
        assert!((synth.current_playhead_time() - 0.05).abs() < 1e-4);
    }

    #[test]
    fn test_seek_glides_to_target() {
        let mut synth = GranularSynth::with_seed(SR, 9);
        let buffer = Arc::new(SampleBuffer::new(vec![0; 48000], 1, 48000).unwrap());
        synth.set_sample_buffer(buffer);
        synth.set_scrub_mode(true);
        synth.seek(0.5, 0.1, SeekType::FromBeginning);
        render(&mut synth, 2400);
        assert!((synth.current_playhead_time() - 0.25).abs() < 1e-3);
        render(&mut synth, 2400);
        assert!((synth.current_playhead_time() - 0.5).abs() < 1e-4);

        synth.seek(0.1, 0.0, SeekType::FromEnd);
        assert!((synth.current_playhead_time() - 0.9).abs() < 1e-4);
    }

    #[test]
    fn test_granulation_plays_buffer() {
        let mut synth = GranularSynth::with_seed(SR, 10);
        let samples: Vec<f32> = (0..48000).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let (mut tx, mut rx) = sample_buffer_channel(2);
        tx.send(Arc::new(SampleBuffer::from_f32(&samples, 1, 48000).unwrap())).unwrap();

        synth.set_mode(GranularMode::Granulation);
        synth.apply_pending_buffer(&mut rx);
        assert!(synth.sample_duration() > 0.99);

        synth.set_grains_per_second(100.0);
        synth.note_on(60, 127, 0.0);
        let out = render(&mut synth, 4800);
        assert!(out.iter().any(|s| s.abs() > 1e-3));
    }
}
