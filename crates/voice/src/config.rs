//! Voice provider configuration

use std::{fmt, path::PathBuf, time::Duration};

use cinematics::{mystic::DEFAULT_BASE_URL, usable_key, PollConfig};
use serde::{Deserialize, Serialize};

/// TTS provider options, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TTSProvider {
    Freepik,
    ElevenLabs,
    Azure,
    Google,
}

impl fmt::Display for TTSProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TTSProvider::Freepik => "freepik",
            TTSProvider::ElevenLabs => "elevenlabs",
            TTSProvider::Azure => "azure",
            TTSProvider::Google => "google",
        };
        f.write_str(name)
    }
}

/// Credentials and fallbacks for narration. Built explicitly by the caller;
/// nothing here reads the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub freepik_api_key: Option<String>,
    pub freepik_base_url: String,
    pub elevenlabs_api_key: Option<String>,
    pub azure_speech_key: Option<String>,
    pub azure_region: String,
    pub google_tts_key: Option<String>,
    /// Pre-existing narration used when synthesis fails.
    pub fallback_audio: Option<PathBuf>,
    pub poll: PollConfig,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            freepik_api_key: None,
            freepik_base_url: DEFAULT_BASE_URL.into(),
            elevenlabs_api_key: None,
            azure_speech_key: None,
            azure_region: "eastus".into(),
            google_tts_key: None,
            fallback_audio: None,
            poll: PollConfig::default().with_base_delay(Duration::from_secs(2)),
        }
    }
}

impl VoiceConfig {
    /// First provider with usable credentials, by priority.
    pub fn select_provider(&self) -> Option<TTSProvider> {
        if usable_key(self.freepik_api_key.as_deref()).is_some() {
            Some(TTSProvider::Freepik)
        } else if usable_key(self.elevenlabs_api_key.as_deref()).is_some() {
            Some(TTSProvider::ElevenLabs)
        } else if usable_key(self.azure_speech_key.as_deref()).is_some() {
            Some(TTSProvider::Azure)
        } else if usable_key(self.google_tts_key.as_deref()).is_some() {
            Some(TTSProvider::Google)
        } else {
            None
        }
    }
}
