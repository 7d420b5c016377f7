//! Text-to-Speech provider implementations

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use cinematics::{
    overlay::escape_xml, GenerationProvider, MysticClient, MysticRequest, TaskPoller,
    VoiceSettings,
};
use editron::FFmpegClient;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{config::TTSProvider, Emotion, Voice, VoiceError, VoiceOptions, VoiceResult};

/// Text-to-Speech trait for different providers
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    fn provider(&self) -> TTSProvider;

    /// Synthesize `text` and write the audio to `output`.
    async fn synthesize(
        &self,
        text: &str,
        options: &VoiceOptions,
        output: &Path,
    ) -> VoiceResult<PathBuf>;
}

/// SSML prosody attributes for an emotion; neutral adds none.
pub fn prosody_attributes(emotion: Emotion) -> &'static str {
    match emotion {
        Emotion::Dramatic => r#"rate="0.8" pitch="+10%" volume="+20%""#,
        Emotion::Mysterious => r#"rate="0.9" pitch="-5%" volume="+10%""#,
        Emotion::Excited => r#"rate="1.1" pitch="+5%" volume="+15%""#,
        Emotion::Neutral => "",
    }
}

pub fn build_ssml(text: &str, voice_name: &str, emotion: Emotion) -> String {
    format!(
        r#"<speak version="1.0" xmlns="http://www.w3.org/2001/10/synthesis" xml:lang="en-US"><voice name="{voice_name}"><prosody {}>{}</prosody></voice></speak>"#,
        prosody_attributes(emotion),
        escape_xml(text)
    )
}

async fn write_audio(output: &Path, bytes: &[u8]) -> VoiceResult<PathBuf> {
    if bytes.is_empty() {
        return Err(VoiceError::TTSError("provider returned empty audio".into()));
    }
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(output, bytes).await?;
    Ok(output.to_path_buf())
}

/// Narration through the generation task API: the provider renders a short
/// voiced clip, whose audio track is extracted with ffmpeg.
pub struct FreepikVoice {
    client: MysticClient,
    poller: TaskPoller,
    ffmpeg: FFmpegClient,
}

impl FreepikVoice {
    pub fn new(client: MysticClient, poller: TaskPoller, ffmpeg: FFmpegClient) -> Self {
        Self {
            client,
            poller,
            ffmpeg,
        }
    }

    pub fn build_prompt(text: &str, options: &VoiceOptions) -> String {
        let mut prompt = format!("Cinematic voice narration: \"{text}\"");

        prompt.push_str(match options.voice {
            Voice::Narrator => ", professional narrator voice, clear and authoritative",
            Voice::Female => ", female voice, warm and engaging",
            Voice::Male => ", male voice, deep and commanding",
            Voice::Dramatic => ", dramatic voice, intense and powerful",
            Voice::Mysterious => ", mysterious voice, intriguing and suspenseful",
        });

        prompt.push_str(match options.emotion {
            Emotion::Excited => ", excited tone, energetic delivery",
            Emotion::Dramatic => ", dramatic tone, intense emotion",
            Emotion::Mysterious => ", mysterious tone, intriguing atmosphere",
            Emotion::Neutral => ", neutral tone, clear delivery",
        });

        prompt.push_str(", high quality audio, professional voice synthesis, cinematic narration");
        prompt
    }

    pub fn build_request(text: &str, options: &VoiceOptions) -> MysticRequest {
        MysticRequest {
            duration: Some(4),
            voice_enabled: Some(true),
            voice_settings: Some(VoiceSettings {
                emotion: options.emotion.as_str().to_string(),
                speed: options.speed,
                pitch: options.pitch,
            }),
            ..MysticRequest::image(
                Self::build_prompt(text, options),
                "film_vertical_9_21",
                "cinematic",
                "high",
            )
        }
    }
}

#[async_trait]
impl TextToSpeech for FreepikVoice {
    fn provider(&self) -> TTSProvider {
        TTSProvider::Freepik
    }

    async fn synthesize(
        &self,
        text: &str,
        options: &VoiceOptions,
        output: &Path,
    ) -> VoiceResult<PathBuf> {
        let request = Self::build_request(text, options);
        let task_id = self.client.submit(&request).await?;
        let assets = self.poller.wait_for_assets(&self.client, &task_id).await?;
        let asset = assets
            .first()
            .ok_or_else(|| VoiceError::TTSError(format!("task {task_id} returned no clip")))?;

        let clip = self.client.download(asset.fetch_url()).await?;
        let video_path = output.with_extension("voice.mp4");
        write_audio(&video_path, &clip).await?;

        let extracted = self.ffmpeg.extract_audio(&video_path, output).await;
        if let Err(err) = tokio::fs::remove_file(&video_path).await {
            debug!(path = %video_path.display(), error = %err, "failed to remove narration clip");
        }
        Ok(extracted?)
    }
}

/// ElevenLabs TTS implementation
pub struct ElevenLabsTTS {
    client: reqwest::Client,
    api_key: String,
}

impl ElevenLabsTTS {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    pub fn voice_id(voice: Voice) -> &'static str {
        match voice {
            Voice::Narrator | Voice::Dramatic => "pNInz6obpgDQGcFmaJgB",
            Voice::Female | Voice::Mysterious => "EXAVITQu4vr4xnSDxMaL",
            Voice::Male => "VR6AewLTigWG4xSOukaG",
        }
    }

    pub fn style(emotion: Emotion) -> f32 {
        if emotion == Emotion::Dramatic {
            0.8
        } else {
            0.3
        }
    }
}

#[async_trait]
impl TextToSpeech for ElevenLabsTTS {
    fn provider(&self) -> TTSProvider {
        TTSProvider::ElevenLabs
    }

    async fn synthesize(
        &self,
        text: &str,
        options: &VoiceOptions,
        output: &Path,
    ) -> VoiceResult<PathBuf> {
        let voice_id = Self::voice_id(options.voice);
        info!(provider = "elevenlabs", voice_id, "synthesizing narration");

        let payload = serde_json::json!({
            "text": text,
            "model_id": "eleven_multilingual_v2",
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.5,
                "style": Self::style(options.emotion),
                "use_speaker_boost": true
            }
        });

        let response = self
            .client
            .post(format!("https://api.elevenlabs.io/v1/text-to-speech/{voice_id}"))
            .header("Accept", "audio/mpeg")
            .header("xi-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VoiceError::TTSError(format!(
                "ElevenLabs API error: {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        write_audio(output, &bytes).await
    }
}

/// Azure Speech Services implementation
pub struct AzureTTS {
    client: reqwest::Client,
    subscription_key: String,
    region: String,
}

impl AzureTTS {
    pub fn new(subscription_key: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            subscription_key: subscription_key.into(),
            region: region.into(),
        }
    }

    pub fn voice_name(voice: Voice) -> &'static str {
        match voice {
            Voice::Narrator | Voice::Male | Voice::Dramatic => "en-US-GuyNeural",
            Voice::Female | Voice::Mysterious => "en-US-AriaNeural",
        }
    }
}

#[async_trait]
impl TextToSpeech for AzureTTS {
    fn provider(&self) -> TTSProvider {
        TTSProvider::Azure
    }

    async fn synthesize(
        &self,
        text: &str,
        options: &VoiceOptions,
        output: &Path,
    ) -> VoiceResult<PathBuf> {
        let voice_name = Self::voice_name(options.voice);
        let ssml = build_ssml(text, voice_name, options.emotion);
        info!(provider = "azure", voice_name, "synthesizing narration");

        let response = self
            .client
            .post(format!(
                "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
                self.region
            ))
            .header("Ocp-Apim-Subscription-Key", &self.subscription_key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", "audio-16khz-128kbitrate-mono-mp3")
            .body(ssml)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VoiceError::TTSError(format!(
                "Azure TTS error: {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        write_audio(output, &bytes).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleSynthesisResponse {
    audio_content: String,
}

/// Google Cloud Text-to-Speech implementation
pub struct GoogleTTS {
    client: reqwest::Client,
    api_key: String,
}

impl GoogleTTS {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    pub fn voice_name(voice: Voice) -> &'static str {
        match voice {
            Voice::Narrator | Voice::Male | Voice::Dramatic => "en-US-Neural2-A",
            Voice::Female | Voice::Mysterious => "en-US-Neural2-C",
        }
    }

    fn gender(voice: Voice) -> &'static str {
        if voice == Voice::Female {
            "FEMALE"
        } else {
            "MALE"
        }
    }
}

#[async_trait]
impl TextToSpeech for GoogleTTS {
    fn provider(&self) -> TTSProvider {
        TTSProvider::Google
    }

    async fn synthesize(
        &self,
        text: &str,
        options: &VoiceOptions,
        output: &Path,
    ) -> VoiceResult<PathBuf> {
        let payload = serde_json::json!({
            "input": { "text": text },
            "voice": {
                "languageCode": "en-US",
                "name": Self::voice_name(options.voice),
                "ssmlGender": Self::gender(options.voice),
            },
            "audioConfig": {
                "audioEncoding": "MP3",
                "speakingRate": options.speed,
                "pitch": options.pitch,
            }
        });

        let response = self
            .client
            .post("https://texttospeech.googleapis.com/v1/text:synthesize")
            .query(&[("key", &self.api_key)])
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VoiceError::TTSError(format!(
                "Google TTS error: {}",
                response.status()
            )));
        }

        let body = response.json::<GoogleSynthesisResponse>().await?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(body.audio_content.as_bytes())
            .map_err(|e| VoiceError::TTSError(format!("invalid audio payload: {e}")))?;
        write_audio(output, &bytes).await
    }
}
