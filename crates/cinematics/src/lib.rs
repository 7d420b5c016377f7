pub mod error;
pub mod frames;
pub mod mystic;
pub mod overlay;
pub mod poller;
pub mod prompt;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use error::{GenerationError, GenerationResult};
pub use frames::{Frame, FrameGenerator, FrameOrigin, FrameRequest};
pub use mystic::{GenerationProvider, MysticClient, MysticRequest, VoiceSettings};
pub use poller::{GeneratedAsset, GenerationTask, PollConfig, TaskPoller, TaskStatus, TaskStatusSource};

/// Key value shipped in example env files; treated as "no key".
pub const PLACEHOLDER_API_KEY: &str = "your_freepik_api_key_here";

/// Runtime configuration for frame generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CinematicsConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub aspect_ratio: String,
    pub style: String,
    pub quality: String,
    pub frame_width: u32,
    pub frame_height: u32,
    pub brand_handle: String,
    pub poll: PollConfig,
}

impl Default for CinematicsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: mystic::DEFAULT_BASE_URL.into(),
            aspect_ratio: "social_post_4_5".into(),
            style: "cartoon".into(),
            quality: "high".into(),
            frame_width: 1080,
            frame_height: 1350,
            brand_handle: "@drama.studio".into(),
            poll: PollConfig::default().with_base_delay(Duration::from_secs(1)),
        }
    }
}

impl CinematicsConfig {
    /// Usable API key, if any. Blank and placeholder values count as absent.
    pub fn api_key(&self) -> Option<&str> {
        usable_key(self.api_key.as_deref())
    }

    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }
}

/// Shared credential filter: blank or placeholder keys are unconfigured.
pub fn usable_key(key: Option<&str>) -> Option<&str> {
    key.map(str::trim)
        .filter(|k| !k.is_empty() && *k != PLACEHOLDER_API_KEY)
}
