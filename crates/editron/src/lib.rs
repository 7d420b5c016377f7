//! Editron - composition and rendering for episode videos
//!
//! ```text
//!  frames ──┐
//!  voice  ──┼──► CompositionPlanner ──► CompositionPlan ──► VideoRenderer ──► Encoder (ffmpeg)
//!  music  ──┤
//!  subs   ──┘
//! ```

pub mod ffmpeg;
pub mod graph;
pub mod music;
pub mod plan;
pub mod renderer;
pub mod subtitles;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ffmpeg::FFmpegClient;
pub use graph::{FilterGraph, FilterNode, FilterOp};
pub use music::MusicSelector;
pub use plan::{
    AudioKind, AudioTrack, BandPass, CompositionPlan, CompositionPlanner, PlanKind, RenderSettings,
    Transition,
};
pub use renderer::{EncodeInput, EncodeJob, Encoder, RenderedArtifact, VideoRenderer};
pub use subtitles::{Subtitle, SubtitleBuilder, SubtitleFiles, SubtitleStyle, SubtitleTrack};

#[derive(Debug, Error)]
pub enum EditronError {
    #[error("FFmpeg error: {0}")]
    FFmpeg(String),

    #[error("Encoder exited with {status}: {stderr}")]
    Render { status: String, stderr: String },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Process error: {0}")]
    Process(String),
}

pub type EditronResult<T> = Result<T, EditronError>;

/// Video codec options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    H265,
}

impl VideoCodec {
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "libx264",
            VideoCodec::H265 => "libx265",
        }
    }
}

/// Audio codec options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Aac,
    Mp3,
}

impl AudioCodec {
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            AudioCodec::Aac => "aac",
            AudioCodec::Mp3 => "libmp3lame",
        }
    }
}
