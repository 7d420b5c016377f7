//! HTTP client for the "mystic" generation task API.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{GenerationError, GenerationResult},
    poller::{GeneratedAsset, GenerationTask, TaskStatus, TaskStatusSource},
};

pub const DEFAULT_BASE_URL: &str = "https://api.freepik.com/v1/ai";
const API_KEY_HEADER: &str = "x-freepik-api-key";

/// Narration settings attached to a voice-enabled task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub emotion: String,
    pub speed: f32,
    pub pitch: f32,
}

/// Submission body. The voice fields are only sent for narration tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MysticRequest {
    pub prompt: String,
    pub aspect_ratio: String,
    pub style: String,
    pub quality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_settings: Option<VoiceSettings>,
}

impl MysticRequest {
    pub fn image(
        prompt: impl Into<String>,
        aspect_ratio: impl Into<String>,
        style: impl Into<String>,
        quality: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: aspect_ratio.into(),
            style: style.into(),
            quality: quality.into(),
            duration: None,
            voice_enabled: None,
            voice_settings: None,
        }
    }
}

/// Outbound contract of an asynchronous generation provider:
/// submit, poll (via [`TaskStatusSource`]) and download.
#[async_trait]
pub trait GenerationProvider: TaskStatusSource {
    async fn submit(&self, request: &MysticRequest) -> GenerationResult<String>;

    async fn download(&self, url: &str) -> GenerationResult<Bytes>;
}

#[derive(Debug, Deserialize)]
struct TaskEnvelope {
    data: TaskData,
}

#[derive(Debug, Deserialize)]
struct TaskData {
    #[serde(default)]
    task_id: String,
    #[serde(default)]
    status: Option<TaskStatus>,
    #[serde(default)]
    generated: Vec<GeneratedAsset>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MysticClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl MysticClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> GenerationResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl TaskStatusSource for MysticClient {
    async fn poll_task(&self, task_id: &str) -> GenerationResult<GenerationTask> {
        let response = self
            .client
            .get(self.endpoint(&format!("mystic/{task_id}")))
            .header("Accept", "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenerationError::Provider(format!(
                "status check failed: {}",
                response.status()
            )));
        }

        let envelope = response.json::<TaskEnvelope>().await?;
        let status = envelope.data.status.ok_or_else(|| {
            GenerationError::Provider(format!("task {task_id} response carried no status"))
        })?;

        Ok(GenerationTask {
            id: task_id.to_string(),
            status,
            result_assets: envelope.data.generated,
            error: envelope.data.error,
        })
    }
}

#[async_trait]
impl GenerationProvider for MysticClient {
    async fn submit(&self, request: &MysticRequest) -> GenerationResult<String> {
        if request.prompt.trim().is_empty() {
            return Err(GenerationError::Validation("prompt must not be empty".into()));
        }

        let response = self
            .client
            .post(self.endpoint("mystic"))
            .header("Accept", "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Provider(format!(
                "submit failed: {status} - {body}"
            )));
        }

        let envelope = response.json::<TaskEnvelope>().await?;
        if envelope.data.task_id.is_empty() {
            return Err(GenerationError::Provider("no task id returned".into()));
        }

        debug!(task_id = %envelope.data.task_id, style = %request.style, "task submitted");
        Ok(envelope.data.task_id)
    }

    async fn download(&self, url: &str) -> GenerationResult<Bytes> {
        if url.trim().is_empty() {
            return Err(GenerationError::Download("asset url is empty".into()));
        }

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(GenerationError::Download(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(GenerationError::Download(format!("{url} returned an empty payload")));
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_request_omits_voice_fields() {
        let request = MysticRequest::image("Comic book panel: x", "social_post_4_5", "cartoon", "high");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["aspect_ratio"], "social_post_4_5");
        assert!(json.get("voice_enabled").is_none());
        assert!(json.get("voice_settings").is_none());
    }

    #[test]
    fn test_task_envelope_parses_completed_response() {
        let body = r#"{"data":{"task_id":"abc","status":"COMPLETED","generated":[{"id":"1","url":"u","download_url":"d"}],"has_nsfw":[false]}}"#;
        let envelope: TaskEnvelope = serde_json::from_str(body).unwrap();

        assert_eq!(envelope.data.task_id, "abc");
        assert_eq!(envelope.data.status, Some(TaskStatus::Completed));
        assert_eq!(envelope.data.generated[0].fetch_url(), "d");
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let client = MysticClient::new("k", "https://api.example.com/v1/ai/").unwrap();
        assert_eq!(client.endpoint("mystic/t1"), "https://api.example.com/v1/ai/mystic/t1");
    }
}
