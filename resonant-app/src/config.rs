//! Render configuration
//!
//! Simple `key=value` files, one setting per line, `#` starts a comment.
//! Unknown keys in a file are skipped; on the command line they are errors.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use resonant_dsp::effects::StereoDelayMode;
use resonant_dsp::{GrainEnvelopeType, OscType};

/// Everything needed to render one patch
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub output: PathBuf,
    /// Granulate this file instead of synthesizing grains
    pub source: Option<PathBuf>,
    pub sample_rate: u32,
    pub duration_secs: f32,
    pub seed: Option<u64>,

    pub note: u8,
    pub velocity: u8,
    pub note_length_secs: f32,
    pub gain_db: f32,

    pub grains_per_second: f32,
    pub grain_probability: f32,
    pub grain_duration_msec: f32,
    pub grain_duration_range_msec: f32,
    pub grain_pitch: f32,
    pub grain_pitch_range: f32,
    pub grain_volume: f32,
    pub grain_volume_range: f32,
    pub grain_pan_range: f32,
    pub grain_osc: OscType,
    pub grain_envelope: GrainEnvelopeType,
    pub playback_speed: f32,

    pub attack_msec: f32,
    pub decay_msec: f32,
    pub sustain: f32,
    pub release_msec: f32,

    pub chorus_wet: f32,
    pub delay_mode: StereoDelayMode,
    pub delay_time_msec: f32,
    pub delay_feedback: f32,
    pub delay_wet: f32,
    pub reverb_decay: f32,
    pub reverb_wet: f32,
    pub limiter_threshold_db: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("resonant.wav"),
            source: None,
            sample_rate: 48000,
            duration_secs: 6.0,
            seed: None,
            note: 60,
            velocity: 110,
            note_length_secs: 4.0,
            gain_db: -6.0,
            grains_per_second: 30.0,
            grain_probability: 0.9,
            grain_duration_msec: 120.0,
            grain_duration_range_msec: 40.0,
            grain_pitch: 0.0,
            grain_pitch_range: 0.1,
            grain_volume: 0.5,
            grain_volume_range: 0.1,
            grain_pan_range: 0.6,
            grain_osc: OscType::Sine,
            grain_envelope: GrainEnvelopeType::Hanning,
            playback_speed: 1.0,
            attack_msec: 200.0,
            decay_msec: 300.0,
            sustain: 0.8,
            release_msec: 1500.0,
            chorus_wet: 0.3,
            delay_mode: StereoDelayMode::PingPong,
            delay_time_msec: 375.0,
            delay_feedback: 0.4,
            delay_wet: 0.25,
            reverb_decay: 0.6,
            reverb_wet: 0.3,
            limiter_threshold_db: -1.0,
        }
    }
}

impl RenderConfig {
    /// Default config file location
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("resonant")
            .join("render.txt")
    }

    /// Load from a file, starting from defaults
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Save to a specific path
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize()).with_context(|| format!("failed to write config {}", path.display()))
    }

    /// Parse `key=value` lines on top of the defaults
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut config = Self::default();
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let known = config
                .set(key.trim(), value.trim())
                .with_context(|| format!("line {}", number + 1))?;
            if !known {
                tracing::warn!("Ignoring unknown setting '{}' on line {}", key.trim(), number + 1);
            }
        }
        Ok(config)
    }

    /// Apply a single `key=value` setting
    pub fn apply_override(&mut self, setting: &str) -> anyhow::Result<()> {
        let (key, value) = setting
            .split_once('=')
            .ok_or_else(|| anyhow!("expected key=value, got '{}'", setting))?;
        if !self.set(key.trim(), value.trim())? {
            bail!("unknown setting '{}'", key.trim());
        }
        Ok(())
    }

    /// Returns false for an unknown key
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<bool> {
        match key {
            "output" => self.output = PathBuf::from(value),
            "source" => self.source = (!value.is_empty()).then(|| PathBuf::from(value)),
            "sample_rate" => self.sample_rate = number(key, value)?,
            "duration" => self.duration_secs = number(key, value)?,
            "seed" => self.seed = (!value.is_empty()).then(|| number(key, value)).transpose()?,
            "note" => self.note = number(key, value)?,
            "velocity" => self.velocity = number(key, value)?,
            "note_length" => self.note_length_secs = number(key, value)?,
            "gain_db" => self.gain_db = number(key, value)?,
            "grains_per_second" => self.grains_per_second = number(key, value)?,
            "grain_probability" => self.grain_probability = number(key, value)?,
            "grain_duration" => self.grain_duration_msec = number(key, value)?,
            "grain_duration_range" => self.grain_duration_range_msec = number(key, value)?,
            "grain_pitch" => self.grain_pitch = number(key, value)?,
            "grain_pitch_range" => self.grain_pitch_range = number(key, value)?,
            "grain_volume" => self.grain_volume = number(key, value)?,
            "grain_volume_range" => self.grain_volume_range = number(key, value)?,
            "grain_pan_range" => self.grain_pan_range = number(key, value)?,
            "grain_osc" => self.grain_osc = osc_type(value)?,
            "grain_envelope" => self.grain_envelope = envelope_type(value)?,
            "playback_speed" => self.playback_speed = number(key, value)?,
            "attack" => self.attack_msec = number(key, value)?,
            "decay" => self.decay_msec = number(key, value)?,
            "sustain" => self.sustain = number(key, value)?,
            "release" => self.release_msec = number(key, value)?,
            "chorus_wet" => self.chorus_wet = number(key, value)?,
            "delay_mode" => self.delay_mode = delay_mode(value)?,
            "delay_time" => self.delay_time_msec = number(key, value)?,
            "delay_feedback" => self.delay_feedback = number(key, value)?,
            "delay_wet" => self.delay_wet = number(key, value)?,
            "reverb_decay" => self.reverb_decay = number(key, value)?,
            "reverb_wet" => self.reverb_wet = number(key, value)?,
            "limiter_threshold_db" => self.limiter_threshold_db = number(key, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Serialize to `key=value` lines
    fn serialize(&self) -> String {
        let mut lines = vec!["# Resonant render configuration".to_string()];
        lines.push(format!("output={}", self.output.display()));
        if let Some(source) = &self.source {
            lines.push(format!("source={}", source.display()));
        }
        lines.push(format!("sample_rate={}", self.sample_rate));
        lines.push(format!("duration={}", self.duration_secs));
        if let Some(seed) = self.seed {
            lines.push(format!("seed={}", seed));
        }
        lines.push(format!("note={}", self.note));
        lines.push(format!("velocity={}", self.velocity));
        lines.push(format!("note_length={}", self.note_length_secs));
        lines.push(format!("gain_db={}", self.gain_db));
        lines.push(format!("grains_per_second={}", self.grains_per_second));
        lines.push(format!("grain_probability={}", self.grain_probability));
        lines.push(format!("grain_duration={}", self.grain_duration_msec));
        lines.push(format!("grain_duration_range={}", self.grain_duration_range_msec));
        lines.push(format!("grain_pitch={}", self.grain_pitch));
        lines.push(format!("grain_pitch_range={}", self.grain_pitch_range));
        lines.push(format!("grain_volume={}", self.grain_volume));
        lines.push(format!("grain_volume_range={}", self.grain_volume_range));
        lines.push(format!("grain_pan_range={}", self.grain_pan_range));
        lines.push(format!("grain_osc={}", osc_type_name(self.grain_osc)));
        lines.push(format!("grain_envelope={:?}", self.grain_envelope).to_lowercase());
        lines.push(format!("playback_speed={}", self.playback_speed));
        lines.push(format!("attack={}", self.attack_msec));
        lines.push(format!("decay={}", self.decay_msec));
        lines.push(format!("sustain={}", self.sustain));
        lines.push(format!("release={}", self.release_msec));
        lines.push(format!("chorus_wet={}", self.chorus_wet));
        lines.push(format!("delay_mode={:?}", self.delay_mode).to_lowercase());
        lines.push(format!("delay_time={}", self.delay_time_msec));
        lines.push(format!("delay_feedback={}", self.delay_feedback));
        lines.push(format!("delay_wet={}", self.delay_wet));
        lines.push(format!("reverb_decay={}", self.reverb_decay));
        lines.push(format!("reverb_wet={}", self.reverb_wet));
        lines.push(format!("limiter_threshold_db={}", self.limiter_threshold_db));
        lines.join("\n")
    }
}

fn number<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("invalid value '{}' for {}", value, key))
}

fn osc_type(value: &str) -> anyhow::Result<OscType> {
    Ok(match value.to_ascii_lowercase().as_str() {
        "sine" => OscType::Sine,
        "saw" => OscType::Saw,
        "square" => OscType::Square,
        "triangle" => OscType::Triangle,
        "noise" => OscType::Noise,
        _ => bail!("unknown oscillator '{}'", value),
    })
}

fn osc_type_name(osc: OscType) -> &'static str {
    match osc {
        OscType::Sine => "sine",
        OscType::Saw => "saw",
        OscType::Square => "square",
        OscType::Triangle => "triangle",
        OscType::Noise => "noise",
    }
}

fn envelope_type(value: &str) -> anyhow::Result<GrainEnvelopeType> {
    let wanted = value.replace(|c: char| c == '_' || c == '-', "").to_ascii_lowercase();
    GrainEnvelopeType::ALL
        .into_iter()
        .find(|shape| format!("{:?}", shape).to_ascii_lowercase() == wanted)
        .ok_or_else(|| anyhow!("unknown grain envelope '{}'", value))
}

fn delay_mode(value: &str) -> anyhow::Result<StereoDelayMode> {
    Ok(match value.replace(|c: char| c == '_' || c == '-', "").to_ascii_lowercase().as_str() {
        "normal" => StereoDelayMode::Normal,
        "cross" => StereoDelayMode::Cross,
        "pingpong" => StereoDelayMode::PingPong,
        _ => bail!("unknown delay mode '{}'", value),
    })
}
