//! Filter family
//!
//! Four per-channel filter designs behind one [`Filter`] enum:
//! - [`OnePoleFilter`]: 6 dB/oct TPT low/high pass
//! - [`StateVariableFilter`]: 12 dB/oct TPT SVF with blended band stop
//! - [`LadderFilter`]: 4-stage Moog-style ladder with resonance feedback
//! - [`BiquadFilter`]: RBJ cookbook biquads (EQ, shelves, all-pass...)
//!
//! Parameter setters only mark the filter dirty. Coefficients are
//! recomputed in `update()`, which callers run once per control tick before
//! `process_audio`.

mod biquad;
mod ladder;
mod one_pole;
mod state_variable;

pub use biquad::{Biquad, BiquadCoefficients, BiquadFilter};
pub use ladder::{LadderFilter, LadderMode};
pub use one_pole::{OnePoleFilter, OnePoleLowPass};
pub use state_variable::StateVariableFilter;

use crate::modulation::{ModulationMatrix, PatchDestination, VoiceId};
use crate::util::frequency_multiplier;

/// Update stage filter destinations are created in
pub const FILTER_MOD_STAGE: u32 = 1;

/// Lowest cutoff any filter accepts
pub const MIN_FILTER_FREQUENCY: f32 = 20.0;

/// Response shape. Not every design supports every shape; see each filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    #[default]
    LowPass,
    HighPass,
    BandPass,
    BandStop,
    AllPass,
    ParametricEq,
    LowShelf,
    HighShelf,
}

/// Cutoff/Q bookkeeping shared by every filter design
#[derive(Debug, Clone)]
pub(crate) struct FilterCore {
    pub sample_rate: f32,
    pub num_channels: usize,
    /// Cutoff requested by the owner (Hz)
    pub base_frequency: f32,
    /// Q requested by the owner
    pub base_q: f32,
    /// External cutoff modulation in semitones
    pub frequency_mod: f32,
    /// External additive Q modulation
    pub q_mod: f32,
    /// Effective values after modulation, used for coefficients
    pub frequency: f32,
    pub q: f32,
    /// Matrix hookup: voice plus cutoff and Q destinations
    mod_voice: Option<VoiceId>,
    frequency_dest: Option<PatchDestination>,
    q_dest: Option<PatchDestination>,
    pub dirty: bool,
}

impl FilterCore {
    pub fn new(sample_rate: f32, num_channels: usize) -> Self {
        Self {
            sample_rate,
            num_channels: num_channels.max(1),
            base_frequency: 1000.0,
            base_q: 1.0,
            frequency_mod: 0.0,
            q_mod: 0.0,
            frequency: 1000.0,
            q: 1.0,
            mod_voice: None,
            frequency_dest: None,
            q_dest: None,
            dirty: true,
        }
    }

    /// Reconfigure sample rate/channels and optionally attach to a matrix voice
    pub fn init(
        &mut self,
        sample_rate: f32,
        num_channels: usize,
        voice_id: VoiceId,
        mod_matrix: Option<&mut ModulationMatrix>,
    ) {
        debug_assert!(sample_rate > 0.0, "filter needs a positive sample rate");
        self.sample_rate = sample_rate.max(1.0);
        self.num_channels = num_channels.max(1);
        self.mod_voice = None;
        self.frequency_dest = None;
        self.q_dest = None;

        if let Some(matrix) = mod_matrix {
            self.frequency_dest = matrix.create_patch_destination(voice_id, FILTER_MOD_STAGE, 1.0);
            self.q_dest = matrix.create_patch_destination(voice_id, FILTER_MOD_STAGE, 1.0);
            if self.frequency_dest.is_some() {
                self.mod_voice = Some(voice_id);
            }
        }
        self.dirty = true;
    }

    #[inline]
    pub fn max_frequency(&self) -> f32 {
        (0.48 * self.sample_rate).min(20_000.0).max(MIN_FILTER_FREQUENCY)
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        let frequency = frequency.clamp(MIN_FILTER_FREQUENCY, self.max_frequency());
        if frequency != self.base_frequency {
            self.base_frequency = frequency;
            self.dirty = true;
        }
    }

    pub fn set_q(&mut self, q: f32, range: (f32, f32)) {
        let q = q.clamp(range.0, range.1);
        if q != self.base_q {
            self.base_q = q;
            self.dirty = true;
        }
    }

    pub fn set_frequency_mod(&mut self, semitones: f32) {
        if semitones != self.frequency_mod {
            self.frequency_mod = semitones;
            self.dirty = true;
        }
    }

    pub fn set_q_mod(&mut self, q_mod: f32) {
        if q_mod != self.q_mod {
            self.q_mod = q_mod;
            self.dirty = true;
        }
    }

    pub fn frequency_destination(&self) -> Option<PatchDestination> {
        self.frequency_dest
    }

    pub fn q_destination(&self) -> Option<PatchDestination> {
        self.q_dest
    }

    /// Fold external and matrix modulation into the effective cutoff and Q.
    ///
    /// Returns true when coefficients must be recomputed.
    pub fn resolve(&mut self, mod_matrix: Option<&ModulationMatrix>, q_range: (f32, f32)) -> bool {
        let mut semitones = self.frequency_mod;
        let mut q_offset = self.q_mod;

        if let (Some(matrix), Some(voice)) = (mod_matrix, self.mod_voice) {
            if let Some(dest) = self.frequency_dest {
                semitones += matrix.get_destination_value(voice, dest).unwrap_or(0.0);
            }
            if let Some(dest) = self.q_dest {
                q_offset += matrix.get_destination_value(voice, dest).unwrap_or(0.0);
            }
        }

        let frequency = (self.base_frequency * frequency_multiplier(semitones))
            .clamp(MIN_FILTER_FREQUENCY, self.max_frequency());
        let q = (self.base_q + q_offset).clamp(q_range.0, q_range.1);

        let changed = self.dirty || frequency != self.frequency || q != self.q;
        self.frequency = frequency;
        self.q = q;
        self.dirty = false;
        changed
    }
}

/// Any of the filter designs, dispatched by `match`
#[derive(Debug, Clone)]
pub enum Filter {
    OnePole(OnePoleFilter),
    StateVariable(StateVariableFilter),
    Ladder(LadderFilter),
    Biquad(BiquadFilter),
}

impl Filter {
    pub fn init(
        &mut self,
        sample_rate: f32,
        num_channels: usize,
        voice_id: VoiceId,
        mod_matrix: Option<&mut ModulationMatrix>,
    ) {
        match self {
            Filter::OnePole(f) => f.init(sample_rate, num_channels, voice_id, mod_matrix),
            Filter::StateVariable(f) => f.init(sample_rate, num_channels, voice_id, mod_matrix),
            Filter::Ladder(f) => f.init(sample_rate, num_channels, voice_id, mod_matrix),
            Filter::Biquad(f) => f.init(sample_rate, num_channels, voice_id, mod_matrix),
        }
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        match self {
            Filter::OnePole(f) => f.set_frequency(frequency),
            Filter::StateVariable(f) => f.set_frequency(frequency),
            Filter::Ladder(f) => f.set_frequency(frequency),
            Filter::Biquad(f) => f.set_frequency(frequency),
        }
    }

    pub fn set_frequency_mod(&mut self, semitones: f32) {
        match self {
            Filter::OnePole(f) => f.set_frequency_mod(semitones),
            Filter::StateVariable(f) => f.set_frequency_mod(semitones),
            Filter::Ladder(f) => f.set_frequency_mod(semitones),
            Filter::Biquad(f) => f.set_frequency_mod(semitones),
        }
    }

    pub fn set_q(&mut self, q: f32) {
        match self {
            Filter::OnePole(f) => f.set_q(q),
            Filter::StateVariable(f) => f.set_q(q),
            Filter::Ladder(f) => f.set_q(q),
            Filter::Biquad(f) => f.set_q(q),
        }
    }

    pub fn set_q_mod(&mut self, q_mod: f32) {
        match self {
            Filter::OnePole(f) => f.set_q_mod(q_mod),
            Filter::StateVariable(f) => f.set_q_mod(q_mod),
            Filter::Ladder(f) => f.set_q_mod(q_mod),
            Filter::Biquad(f) => f.set_q_mod(q_mod),
        }
    }

    /// Switch response shape; unsupported shapes fall back to the design's default
    pub fn set_filter_type(&mut self, filter_type: FilterType) {
        match self {
            Filter::OnePole(f) => f.set_filter_type(filter_type),
            Filter::StateVariable(f) => f.set_filter_type(filter_type),
            Filter::Ladder(f) => f.set_filter_type(filter_type),
            Filter::Biquad(f) => f.set_filter_type(filter_type),
        }
    }

    pub fn filter_type(&self) -> FilterType {
        match self {
            Filter::OnePole(f) => f.filter_type(),
            Filter::StateVariable(f) => f.filter_type(),
            Filter::Ladder(f) => f.filter_type(),
            Filter::Biquad(f) => f.filter_type(),
        }
    }

    pub fn update(&mut self, mod_matrix: Option<&ModulationMatrix>) {
        match self {
            Filter::OnePole(f) => f.update(mod_matrix),
            Filter::StateVariable(f) => f.update(mod_matrix),
            Filter::Ladder(f) => f.update(mod_matrix),
            Filter::Biquad(f) => f.update(mod_matrix),
        }
    }

    /// Filter interleaved frames of `num_channels`
    #[inline]
    pub fn process_audio(&mut self, input: &[f32], output: &mut [f32]) {
        match self {
            Filter::OnePole(f) => f.process_audio(input, output),
            Filter::StateVariable(f) => f.process_audio(input, output),
            Filter::Ladder(f) => f.process_audio(input, output),
            Filter::Biquad(f) => f.process_audio(input, output),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Filter::OnePole(f) => f.reset(),
            Filter::StateVariable(f) => f.reset(),
            Filter::Ladder(f) => f.reset(),
            Filter::Biquad(f) => f.reset(),
        }
    }

    pub fn frequency_destination(&self) -> Option<PatchDestination> {
        self.core().frequency_destination()
    }

    pub fn q_destination(&self) -> Option<PatchDestination> {
        self.core().q_destination()
    }

    /// Effective cutoff after the last `update`
    pub fn frequency(&self) -> f32 {
        self.core().frequency
    }

    fn core(&self) -> &FilterCore {
        match self {
            Filter::OnePole(f) => &f.core,
            Filter::StateVariable(f) => &f.core,
            Filter::Ladder(f) => &f.core,
            Filter::Biquad(f) => &f.core,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulation::Patch;

    fn filters() -> Vec<Filter> {
        vec![
            Filter::OnePole(OnePoleFilter::new(48000.0, 1)),
            Filter::StateVariable(StateVariableFilter::new(48000.0, 1)),
            Filter::Ladder(LadderFilter::new(48000.0, 1)),
            Filter::Biquad(BiquadFilter::new(48000.0, 1)),
        ]
    }

    #[test]
    fn test_every_design_low_passes() {
        for mut filter in filters() {
            filter.set_filter_type(FilterType::LowPass);
            filter.set_frequency(500.0);
            filter.update(None);
            let low = test_util::sine_gain(
                |x| {
                    let mut out = [0.0];
                    filter.process_audio(&[x], &mut out);
                    out[0]
                },
                48000.0,
                50.0,
            );
            filter.reset();
            let high = test_util::sine_gain(
                |x| {
                    let mut out = [0.0];
                    filter.process_audio(&[x], &mut out);
                    out[0]
                },
                48000.0,
                10000.0,
            );
            assert!(low > 0.8, "{:?} passband {}", filter.filter_type(), low);
            assert!(high < 0.2, "stopband {}", high);
        }
    }

    #[test]
    fn test_frequency_clamped() {
        for mut filter in filters() {
            filter.set_frequency(1.0);
            filter.update(None);
            assert_eq!(filter.frequency(), MIN_FILTER_FREQUENCY);
            filter.set_frequency(1.0e6);
            filter.update(None);
            assert!(filter.frequency() <= 0.48 * 48000.0);
        }
    }

    #[test]
    fn test_semitone_modulation() {
        let mut filter = Filter::StateVariable(StateVariableFilter::new(48000.0, 1));
        filter.set_frequency(1000.0);
        filter.set_frequency_mod(12.0);
        filter.update(None);
        assert!((filter.frequency() - 2000.0).abs() < 0.1);
    }

    #[test]
    fn test_matrix_cutoff_modulation() {
        let mut matrix = ModulationMatrix::new(1);
        let mut filter = Filter::Ladder(LadderFilter::new(48000.0, 2));
        filter.init(48000.0, 2, 0, Some(&mut matrix));
        filter.set_frequency(440.0);

        let src = matrix.create_patch_source(0).unwrap();
        let dest = filter.frequency_destination().unwrap();
        assert!(matrix.add_patch(0, Patch::single(src, dest, 12.0)));
        matrix.set_source_value(0, src, -1.0);
        matrix.update(0, FILTER_MOD_STAGE);

        filter.update(Some(&matrix));
        assert!((filter.frequency() - 220.0).abs() < 0.1);
    }
}
