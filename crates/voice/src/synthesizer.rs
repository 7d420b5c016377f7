use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use cinematics::{MysticClient, TaskPoller};
use editron::FFmpegClient;
use tracing::{info, warn};

use crate::{
    config::{TTSProvider, VoiceConfig},
    tts::{AzureTTS, ElevenLabsTTS, FreepikVoice, GoogleTTS, TextToSpeech},
    VoiceOptions, VoiceResult,
};

/// Narration front end. The provider is fixed at construction.
pub struct VoiceSynthesizer {
    provider: Option<Arc<dyn TextToSpeech>>,
    fallback_audio: Option<PathBuf>,
}

impl VoiceSynthesizer {
    pub fn new(config: &VoiceConfig) -> VoiceResult<Self> {
        let provider: Option<Arc<dyn TextToSpeech>> = match config.select_provider() {
            Some(TTSProvider::Freepik) => {
                let client = MysticClient::new(
                    config.freepik_api_key.clone().unwrap_or_default().trim(),
                    &config.freepik_base_url,
                )?;
                let ffmpeg = FFmpegClient::new().unwrap_or_else(|err| {
                    warn!(error = %err, "ffmpeg not located, relying on PATH");
                    FFmpegClient::with_path("ffmpeg")
                });
                Some(Arc::new(FreepikVoice::new(
                    client,
                    TaskPoller::new(config.poll.clone()),
                    ffmpeg,
                )))
            }
            Some(TTSProvider::ElevenLabs) => Some(Arc::new(ElevenLabsTTS::new(
                config.elevenlabs_api_key.clone().unwrap_or_default().trim(),
            ))),
            Some(TTSProvider::Azure) => Some(Arc::new(AzureTTS::new(
                config.azure_speech_key.clone().unwrap_or_default().trim(),
                &config.azure_region,
            ))),
            Some(TTSProvider::Google) => Some(Arc::new(GoogleTTS::new(
                config.google_tts_key.clone().unwrap_or_default().trim(),
            ))),
            None => None,
        };

        match &provider {
            Some(p) => info!(provider = %p.provider(), "voice provider selected"),
            None => info!("no voice provider configured"),
        }

        Ok(Self::with_provider(provider, config.fallback_audio.clone()))
    }

    pub fn with_provider(
        provider: Option<Arc<dyn TextToSpeech>>,
        fallback_audio: Option<PathBuf>,
    ) -> Self {
        Self {
            provider,
            fallback_audio,
        }
    }

    pub fn provider(&self) -> Option<TTSProvider> {
        self.provider.as_ref().map(|p| p.provider())
    }

    /// Narration for `text` written to `output`, the static fallback asset,
    /// or `None`. Never fails.
    pub async fn generate_voice(
        &self,
        text: &str,
        options: &VoiceOptions,
        output: &Path,
    ) -> Option<PathBuf> {
        let Some(provider) = &self.provider else {
            return self.fallback();
        };

        match provider.synthesize(text, options, output).await {
            Ok(path) => {
                info!(provider = %provider.provider(), path = %path.display(), "narration synthesized");
                Some(path)
            }
            Err(err) => {
                warn!(
                    stage = "generate_audio",
                    provider = %provider.provider(),
                    error = %err,
                    "voice synthesis failed"
                );
                self.fallback()
            }
        }
    }

    fn fallback(&self) -> Option<PathBuf> {
        match &self.fallback_audio {
            Some(path) if path.is_file() => {
                info!(path = %path.display(), "using fallback narration");
                Some(path.clone())
            }
            _ => None,
        }
    }
}
