//! Configuration resolution for the dramareel binary
//!
//! Order: built-in defaults, then `--config` TOML (or `./dramareel.toml`
//! when present), then environment variables (a `.env` file is loaded first).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pipeline::PipelineConfig;

pub const DEFAULT_CONFIG_FILE: &str = "dramareel.toml";
const REDACTED: &str = "********";

/// Explicit path wins; otherwise `./dramareel.toml` if it exists.
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let local = PathBuf::from(DEFAULT_CONFIG_FILE);
            local.is_file().then_some(local)
        }
    }
}

pub fn load(explicit: Option<&Path>) -> Result<PipelineConfig> {
    let path = config_path(explicit);
    let config = PipelineConfig::load(path.as_deref())?
        .apply_env(|key| std::env::var(key).ok())
        .context("applying environment overrides")?;
    tracing::debug!(
        config = ?path,
        work_dir = %config.work_dir.display(),
        frames_configured = config.cinematics.is_configured(),
        voice_provider = ?config.voice.select_provider(),
        "configuration resolved"
    );
    Ok(config)
}

/// TOML rendition with credentials masked.
pub fn redacted_toml(config: &PipelineConfig) -> Result<String> {
    let mut shown = config.clone();
    for key in [
        &mut shown.cinematics.api_key,
        &mut shown.voice.freepik_api_key,
        &mut shown.voice.elevenlabs_api_key,
        &mut shown.voice.azure_speech_key,
        &mut shown.voice.google_tts_key,
    ] {
        if key.is_some() {
            *key = Some(REDACTED.to_string());
        }
    }
    toml::to_string_pretty(&shown).context("serializing configuration")
}
