//! Offline render: granular voice through the effects chain into a WAV file

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use resonant_dsp::effects::{
    Chorus, DynamicsProcessor, DynamicsSettings, Effect, PlateReverb, StereoDelay, StereoDelaySettings,
};
use resonant_dsp::sample::{sample_buffer_channel, SampleBuffer};
use resonant_dsp::{GranularMode, GranularSynth};

use crate::config::RenderConfig;

/// Frames rendered per block
const BLOCK_FRAMES: usize = 512;

/// Summary of a finished render
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderStats {
    pub frames: usize,
    pub peak: f32,
    pub rms: f32,
    pub max_active_grains: usize,
}

/// Render `config` to interleaved stereo. `source` switches the synth to granulation.
pub fn render(config: &RenderConfig, source: Option<Arc<SampleBuffer>>) -> (Vec<f32>, RenderStats) {
    let sample_rate = config.sample_rate as f32;
    let mut synth = build_synth(config);

    let (mut buffer_tx, mut buffer_rx) = sample_buffer_channel(1);
    if let Some(buffer) = source {
        synth.set_mode(GranularMode::Granulation);
        if buffer_tx.send(buffer).is_err() {
            tracing::warn!("Source buffer could not be queued, rendering synthesis grains");
            synth.set_mode(GranularMode::Synthesis);
        }
    }

    let mut chorus = Chorus::new(sample_rate);
    chorus.set_wet_level(config.chorus_wet);
    chorus.set_dry_level(1.0);

    let mut delay = StereoDelay::with_settings(
        sample_rate,
        StereoDelaySettings {
            mode: config.delay_mode,
            delay_time_msec: config.delay_time_msec,
            feedback: config.delay_feedback,
            wet_level: config.delay_wet,
            dry_level: 1.0,
            ..Default::default()
        },
    );

    let mut reverb = PlateReverb::new(sample_rate);
    reverb.set_decay(config.reverb_decay);
    reverb.set_wet_level(config.reverb_wet);
    reverb.set_dry_level(1.0);

    let mut limiter = DynamicsProcessor::with_settings(
        sample_rate,
        2,
        DynamicsSettings::limiter(config.limiter_threshold_db),
    );

    let mut chain: [&mut dyn Effect; 4] = [&mut chorus, &mut delay, &mut reverb, &mut limiter];
    tracing::debug!(
        "Effects chain: {}",
        chain.iter().map(|e| e.name()).collect::<Vec<_>>().join(" -> ")
    );

    let total_frames = (config.duration_secs.max(0.0) * sample_rate) as usize;
    let mut output = vec![0.0f32; total_frames * 2];
    let mut stats = RenderStats {
        frames: total_frames,
        ..Default::default()
    };

    synth.note_on(config.note, config.velocity, config.note_length_secs);

    for block in output.chunks_mut(BLOCK_FRAMES * 2) {
        synth.apply_pending_buffer(&mut buffer_rx);
        synth.generate(block);
        for effect in chain.iter_mut() {
            effect.process_in_place(block);
        }
        stats.max_active_grains = stats.max_active_grains.max(synth.num_active_grains());
    }
    buffer_tx.collect_retired();

    let mut sum_squares = 0.0f64;
    for s in &output {
        stats.peak = stats.peak.max(s.abs());
        sum_squares += (*s as f64) * (*s as f64);
    }
    if !output.is_empty() {
        stats.rms = (sum_squares / output.len() as f64).sqrt() as f32;
    }

    (output, stats)
}

fn build_synth(config: &RenderConfig) -> GranularSynth {
    let sample_rate = config.sample_rate as f32;
    let mut synth = match config.seed {
        Some(seed) => GranularSynth::with_seed(sample_rate, seed),
        None => GranularSynth::new(sample_rate),
    };

    synth.set_grains_per_second(config.grains_per_second);
    synth.set_grain_probability(config.grain_probability);
    synth.set_grain_duration(config.grain_duration_msec, config.grain_duration_range_msec);
    synth.set_grain_pitch(config.grain_pitch, config.grain_pitch_range);
    synth.set_grain_volume(config.grain_volume, config.grain_volume_range);
    synth.set_grain_pan(0.0, config.grain_pan_range);
    synth.set_grain_osc_type(config.grain_osc);
    synth.set_grain_envelope_type(config.grain_envelope);
    synth.set_playback_speed(config.playback_speed);

    synth.set_attack_time(config.attack_msec);
    synth.set_decay_time(config.decay_msec);
    synth.set_sustain_gain(config.sustain);
    synth.set_release_time(config.release_msec);
    synth.set_gain_db(config.gain_db);
    synth
}

/// Write interleaved stereo as 16-bit PCM
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create wav file: {}", path.display()))?;

    for sample in samples {
        let quantized = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
        writer.write_sample(quantized).context("failed to write sample")?;
    }

    writer.finalize().context("failed to finalize wav file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_config() -> RenderConfig {
        RenderConfig {
            sample_rate: 24000,
            duration_secs: 1.0,
            note_length_secs: 0.5,
            seed: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_synthesis_render_is_audible_and_limited() {
        let (output, stats) = render(&short_config(), None);
        assert_eq!(output.len(), 24000 * 2);
        assert_eq!(stats.frames, 24000);
        assert!(stats.peak > 0.01);
        assert!(stats.peak <= 1.0);
        assert!(stats.rms > 0.0 && stats.rms < stats.peak);
        assert!(stats.max_active_grains > 0);
        assert!(output.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_seeded_render_is_deterministic() {
        let (a, _) = render(&short_config(), None);
        let (b, _) = render(&short_config(), None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_granulation_render() {
        let samples: Vec<f32> = (0..24000).map(|i| (i as f32 * 0.03).sin() * 0.7).collect();
        let source = Arc::new(SampleBuffer::from_f32(&samples, 1, 24000).unwrap());
        let (_, stats) = render(&short_config(), Some(source));
        assert!(stats.peak > 0.01);
    }

    #[test]
    fn test_write_wav() {
        let path = std::env::temp_dir().join(format!("resonant-render-{}.wav", std::process::id()));
        let samples = [0.0f32, 0.5, -0.5, 1.5];
        write_wav(&path, &samples, 48000).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 48000);
        let written: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(written, vec![0, 16384, -16384, i16::MAX]);
        let _ = std::fs::remove_file(path);
    }
}
