//! Pipeline configuration: optional TOML file, then credentials and paths
//! from the environment.

use std::path::{Path, PathBuf};

use cinematics::CinematicsConfig;
use editron::RenderSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utils::assets::{self, asset_structure};
use voice::VoiceConfig;

pub const DEFAULT_SLOT_COUNT: usize = 6;
pub const DEFAULT_MEDIA_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Narrative slots per episode; one frame and one caption each.
    pub slot_count: usize,
    /// Scratch space for per-episode intermediates.
    pub work_dir: PathBuf,
    /// Static assets. Resolved through `utils::assets` when unset.
    pub asset_dir: Option<PathBuf>,
    pub storage_root: PathBuf,
    pub media_base_url: String,
    pub render: RenderSettings,
    pub cinematics: CinematicsConfig,
    pub voice: VoiceConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            slot_count: DEFAULT_SLOT_COUNT,
            work_dir: assets::default_work_dir(),
            asset_dir: None,
            storage_root: PathBuf::from("public").join("generated"),
            media_base_url: DEFAULT_MEDIA_BASE_URL.into(),
            render: RenderSettings::default(),
            cinematics: CinematicsConfig::default(),
            voice: VoiceConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults, overridden by `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Values that deserialize fine but cannot drive a render.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "slot_count",
                value: self.slot_count.to_string(),
            });
        }
        let frame = self.render.frame_duration_sec;
        if !frame.is_finite() || frame <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "render.frame_duration_sec",
                value: frame.to_string(),
            });
        }
        let crossfade = self.render.crossfade_sec;
        if !crossfade.is_finite() || crossfade < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "render.crossfade_sec",
                value: crossfade.to_string(),
            });
        }
        Ok(())
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Overlay values from `lookup`, usually `std::env::var`. Taking the
    /// lookup as a parameter keeps tests off the process environment.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("FREEPIK_API_KEY") {
            self.cinematics.api_key = Some(key.clone());
            self.voice.freepik_api_key = Some(key);
        }
        if let Some(url) = get("FREEPIK_BASE_URL") {
            self.cinematics.base_url = url.clone();
            self.voice.freepik_base_url = url;
        }
        if let Some(key) = get("ELEVENLABS_API_KEY") {
            self.voice.elevenlabs_api_key = Some(key);
        }
        if let Some(key) = get("AZURE_SPEECH_KEY") {
            self.voice.azure_speech_key = Some(key);
        }
        if let Some(region) = get("AZURE_REGION") {
            self.voice.azure_region = region;
        }
        if let Some(key) = get("GOOGLE_TTS_KEY") {
            self.voice.google_tts_key = Some(key);
        }
        if let Some(url) = get("MEDIA_BASE_URL") {
            self.media_base_url = url;
        }
        if let Some(dir) = get("DRAMAREEL_WORK_DIR") {
            self.work_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("DRAMAREEL_ASSET_DIR") {
            self.asset_dir = Some(PathBuf::from(dir));
        }
        if let Some(slots) = get("DRAMAREEL_SLOTS") {
            self.slot_count = match slots.trim().parse() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "DRAMAREEL_SLOTS",
                        value: slots,
                    })
                }
            };
        }

        Ok(self)
    }

    pub fn audio_dir(&self) -> std::io::Result<PathBuf> {
        match &self.asset_dir {
            Some(dir) => Ok(dir.join(asset_structure::AUDIO_DIR)),
            None => assets::audio_dir(),
        }
    }

    /// The default theme doubles as static narration when the voice
    /// configuration does not name one.
    pub fn with_default_fallback_audio(mut self) -> std::io::Result<Self> {
        if self.voice.fallback_audio.is_none() {
            self.voice.fallback_audio = Some(self.audio_dir()?.join(asset_structure::DEFAULT_THEME));
        }
        Ok(self)
    }
}
