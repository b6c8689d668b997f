//! Resonant - offline granular renderer
//!
//! Usage: `resonant [config-file] [key=value ...] [--save-config]`
//!
//! Without a config file the default one under the user config directory is
//! used if it exists. `key=value` arguments override file settings.

mod config;
mod render;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use resonant_loader::{PcmDecoder, PcmLoader};
use tracing_subscriber::EnvFilter;

use config::RenderConfig;

/// How long to wait for a source file to decode
const LOAD_TIMEOUT: Duration = Duration::from_secs(120);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let save_config = match args.iter().position(|a| a == "--save-config") {
        Some(i) => {
            args.remove(i);
            true
        }
        None => false,
    };

    let config = build_config(&args)?;
    if save_config {
        let path = RenderConfig::config_path();
        config.save_to(&path)?;
        tracing::info!("Saved config to {}", path.display());
    }

    let source = match &config.source {
        Some(path) => {
            let mut loader = PcmLoader::new(PcmDecoder::with_sample_rate(config.sample_rate));
            loader.load(path);
            if !loader.wait(LOAD_TIMEOUT) {
                bail!("timed out loading {}", path.display());
            }
            if let Some(err) = loader.last_error() {
                bail!("failed to load {}: {}", path.display(), err);
            }
            loader.take_sample_buffer()
        }
        None => None,
    };

    let started = Instant::now();
    let (samples, stats) = render::render(&config, source);
    render::write_wav(&config.output, &samples, config.sample_rate)?;

    tracing::info!(
        frames = stats.frames,
        peak_db = %format!("{:.1}", 20.0 * stats.peak.max(1e-6).log10()),
        rms_db = %format!("{:.1}", 20.0 * stats.rms.max(1e-6).log10()),
        max_active_grains = stats.max_active_grains,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Rendered {}",
        config.output.display()
    );
    Ok(())
}

/// Defaults, then the config file, then command-line overrides
fn build_config(args: &[String]) -> anyhow::Result<RenderConfig> {
    let (file, overrides) = match args.first() {
        Some(first) if !first.contains('=') => (Some(PathBuf::from(first)), &args[1..]),
        _ => (None, args),
    };

    let mut config = match file {
        Some(path) => RenderConfig::load_from(&path)?,
        None => {
            let path = RenderConfig::config_path();
            if path.exists() {
                tracing::info!("Using config {}", path.display());
                RenderConfig::load_from(&path)?
            } else {
                RenderConfig::default()
            }
        }
    };

    for setting in overrides {
        config
            .apply_override(setting)
            .with_context(|| format!("invalid argument '{}'", setting))?;
    }
    Ok(config)
}
