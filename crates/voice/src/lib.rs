//! Narration synthesis for episode videos
//!
//! One provider is chosen when the [`VoiceSynthesizer`] is built, from the
//! credentials in [`VoiceConfig`], in the order Freepik > ElevenLabs > Azure >
//! Google. A failing provider is never swapped for another one; the
//! synthesizer falls back to a static narration asset or to no narration.

pub mod config;
pub mod synthesizer;
pub mod tts;

use serde::{Deserialize, Serialize};
use utils::Tone;

pub use config::{TTSProvider, VoiceConfig};
pub use synthesizer::VoiceSynthesizer;
pub use tts::{AzureTTS, ElevenLabsTTS, FreepikVoice, GoogleTTS, TextToSpeech};

/// Voice processing errors
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("TTS error: {0}")]
    TTSError(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Generation error: {0}")]
    Generation(#[from] cinematics::GenerationError),

    #[error("Audio extraction error: {0}")]
    Extraction(#[from] editron::EditronError),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type VoiceResult<T> = Result<T, VoiceError>;

/// Named voice character; each provider maps it onto its own voice ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    #[default]
    Narrator,
    Female,
    Male,
    Dramatic,
    Mysterious,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    #[default]
    Neutral,
    Excited,
    Dramatic,
    Mysterious,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Excited => "excited",
            Emotion::Dramatic => "dramatic",
            Emotion::Mysterious => "mysterious",
        }
    }
}

impl From<&Tone> for Emotion {
    fn from(tone: &Tone) -> Self {
        match tone {
            Tone::Epic => Emotion::Dramatic,
            Tone::Fantasy => Emotion::Mysterious,
            Tone::Comedy => Emotion::Excited,
            Tone::Other(_) => Emotion::Neutral,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceOptions {
    pub voice: Voice,
    pub speed: f32,
    pub pitch: f32,
    pub emotion: Emotion,
}

impl Default for VoiceOptions {
    fn default() -> Self {
        Self {
            voice: Voice::Narrator,
            speed: 1.0,
            pitch: 0.0,
            emotion: Emotion::Neutral,
        }
    }
}

impl VoiceOptions {
    /// Narrator voice with the emotion implied by the series tone.
    pub fn for_tone(tone: &Tone) -> Self {
        Self {
            emotion: Emotion::from(tone),
            ..Self::default()
        }
    }
}
