//! A single pooled grain and its randomized parameters

use rand::Rng;

use super::envelope::GrainEnvelope;
use super::GranularMode;
use crate::osc::{Osc, OscType};
use crate::sample::SampleBuffer;
use crate::util::{frequency_multiplier, stereo_pan, underflow_clamp};

/// Index of a grain in the synth's pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GrainId(pub usize);

/// A parameter drawn once per grain: `base` plus a uniform offset in `[-range, range]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainParam {
    pub base: f32,
    pub range: f32,
}

impl GrainParam {
    pub const fn new(base: f32, range: f32) -> Self {
        Self { base, range }
    }

    pub fn value<R: Rng>(&self, rng: &mut R) -> f32 {
        let range = self.range.abs();
        if range <= 0.0 {
            return self.base;
        }
        self.base + rng.gen_range(-range..=range)
    }
}

/// Parameters frozen when a grain spawns
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GrainData {
    pub duration_msec: f32,
    /// Oscillator frequency in Hz (synthesis)
    pub frequency: f32,
    /// Pitch offset in semitones
    pub pitch: f32,
    /// Linear volume
    pub volume: f32,
    /// Pan (-1 to 1)
    pub pan: f32,
    /// Start position in the source buffer (granulation)
    pub buffer_seek_time: f32,
}

/// Live modulation applied on top of every active grain's frozen data
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GrainModulation {
    /// Semitones
    pub pitch: f32,
    /// Linear multiplier
    pub volume: f32,
    pub pan: f32,
    /// Life advance per frame
    pub duration_scale: f32,
    /// Semitones, synthesis only
    pub frequency: f32,
}

impl Default for GrainModulation {
    fn default() -> Self {
        Self {
            pitch: 0.0,
            volume: 1.0,
            pan: 0.0,
            duration_scale: 1.0,
            frequency: 0.0,
        }
    }
}

pub(crate) struct Grain {
    id: GrainId,
    data: GrainData,
    osc: Osc,
    /// Note ratio times buffer/output rate ratio, before pitch
    base_read_inc: f64,
    read_frame: f64,
    read_inc: f64,
    current_frame_count: f32,
    end_frame_count: f32,
    duration_scale: f32,
    volume: f32,
    left_gain: f32,
    right_gain: f32,
}

impl Grain {
    pub fn new(id: GrainId, sample_rate: f32) -> Self {
        Self {
            id,
            data: GrainData::default(),
            osc: Osc::new(sample_rate, OscType::Sine),
            base_read_inc: 1.0,
            read_frame: 0.0,
            read_inc: 1.0,
            current_frame_count: 0.0,
            end_frame_count: 0.0,
            duration_scale: 1.0,
            volume: 0.0,
            left_gain: 0.0,
            right_gain: 0.0,
        }
    }

    pub fn id(&self) -> GrainId {
        self.id
    }

    pub fn data(&self) -> &GrainData {
        &self.data
    }

    /// Arm the grain with freshly drawn data.
    ///
    /// `read_ratio` is the playback rate of the source before pitch: the note
    /// ratio scaled by buffer rate over output rate.
    pub fn start(
        &mut self,
        data: GrainData,
        osc_type: OscType,
        read_ratio: f64,
        buffer: Option<&SampleBuffer>,
        modulation: &GrainModulation,
    ) {
        self.data = data;
        self.current_frame_count = 0.0;
        self.end_frame_count = (data.duration_msec * 0.001 * self.osc.base.sample_rate()).max(1.0);
        self.base_read_inc = read_ratio;
        self.read_frame = buffer
            .map(|b| (data.buffer_seek_time.max(0.0) as f64 * b.sample_rate() as f64).min(b.num_frames() as f64))
            .unwrap_or(0.0);

        self.osc.set_type(osc_type);
        self.osc.reset();
        self.osc.set_frequency(data.frequency);
        self.osc.start();
        self.apply_modulation(modulation);
    }

    pub fn apply_modulation(&mut self, modulation: &GrainModulation) {
        let pitch = self.data.pitch + modulation.pitch;
        self.osc.base.set_frequency_mod(pitch + modulation.frequency);
        self.osc.update(None);
        self.read_inc = self.base_read_inc * frequency_multiplier(pitch) as f64;

        self.duration_scale = modulation.duration_scale.max(0.0);
        self.volume = self.data.volume * modulation.volume;
        let (l, r) = stereo_pan(self.data.pan + modulation.pan);
        self.left_gain = l;
        self.right_gain = r;
    }

    /// Render one stereo frame and advance the grain's life
    #[inline]
    pub fn generate(&mut self, mode: GranularMode, buffer: Option<&SampleBuffer>, envelope: &GrainEnvelope) -> (f32, f32) {
        let window = envelope.value(self.current_frame_count / self.end_frame_count);

        let sample = match (mode, buffer) {
            (GranularMode::Synthesis, _) => self.osc.generate(),
            (GranularMode::Granulation, Some(buffer)) if !buffer.is_empty() => {
                let sample = read_mono(buffer, self.read_frame);
                let total = buffer.num_frames() as f64;
                self.read_frame = (self.read_frame + self.read_inc).rem_euclid(total);
                sample
            }
            (GranularMode::Granulation, _) => 0.0,
        };

        self.current_frame_count += self.duration_scale;
        let out = underflow_clamp(sample * window * self.volume);
        (out * self.left_gain, out * self.right_gain)
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.current_frame_count >= self.end_frame_count
    }

    /// Fraction of the grain's life elapsed
    pub fn progress(&self) -> f32 {
        if self.end_frame_count > 0.0 {
            (self.current_frame_count / self.end_frame_count).min(1.0)
        } else {
            1.0
        }
    }
}

/// Linearly interpolated frame averaged across channels
#[inline]
fn read_mono(buffer: &SampleBuffer, position: f64) -> f32 {
    let index = position as usize;
    let fraction = (position - index as f64) as f32;
    let next = if index + 1 >= buffer.num_frames() { 0 } else { index + 1 };
    let channels = buffer.num_channels();
    let mut sum = 0.0;
    for channel in 0..channels {
        let a = buffer.frame_sample(index, channel);
        let b = buffer.frame_sample(next, channel);
        sum += a + fraction * (b - a);
    }
    sum / channels as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_param_draws_within_range() {
        let mut rng = SmallRng::seed_from_u64(7);
        let param = GrainParam::new(100.0, 20.0);
        for _ in 0..1000 {
            let v = param.value(&mut rng);
            assert!((80.0..=120.0).contains(&v));
        }
        assert_eq!(GrainParam::new(5.0, 0.0).value(&mut rng), 5.0);
    }

    #[test]
    fn test_grain_life_follows_duration_scale() {
        let envelope = GrainEnvelope::new();
        let mut grain = Grain::new(GrainId(0), 1000.0);
        let data = GrainData {
            duration_msec: 10.0,
            frequency: 100.0,
            volume: 1.0,
            ..Default::default()
        };
        let modulation = GrainModulation {
            duration_scale: 2.0,
            ..Default::default()
        };
        grain.start(data, OscType::Sine, 1.0, None, &modulation);
        let mut frames = 0;
        while !grain.is_done() {
            grain.generate(GranularMode::Synthesis, None, &envelope);
            frames += 1;
        }
        assert_eq!(frames, 5);
    }

    #[test]
    fn test_granulation_reads_from_seek_time() {
        let envelope = GrainEnvelope::new();
        let buffer = SampleBuffer::from_f32(&vec![0.5; 1000], 1, 1000).unwrap();
        let mut grain = Grain::new(GrainId(3), 1000.0);
        let data = GrainData {
            duration_msec: 100.0,
            volume: 1.0,
            buffer_seek_time: 0.2,
            ..Default::default()
        };
        grain.start(data, OscType::Sine, 1.0, Some(&buffer), &GrainModulation::default());
        let mut peak = 0.0f32;
        while !grain.is_done() {
            let (l, r) = grain.generate(GranularMode::Granulation, Some(&buffer), &envelope);
            assert!((l - r).abs() < 1e-6);
            peak = peak.max(l);
        }
        // Centre pan is equal power, Gaussian window peaks at 1
        assert!((peak - 0.5 * std::f32::consts::FRAC_1_SQRT_2).abs() < 0.01, "{}", peak);
    }
}
