//! FFmpeg wrapper used for rendering and audio extraction

use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error};

use crate::{
    renderer::{EncodeJob, Encoder},
    AudioCodec, EditronError, EditronResult,
};

const STDERR_TAIL_LINES: usize = 20;

/// FFmpeg client for video processing
#[derive(Debug, Clone)]
pub struct FFmpegClient {
    ffmpeg_path: PathBuf,
}

impl FFmpegClient {
    pub fn new() -> EditronResult<Self> {
        Ok(Self {
            ffmpeg_path: Self::find_executable("ffmpeg")?,
        })
    }

    pub fn with_path(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    fn find_executable(name: &str) -> EditronResult<PathBuf> {
        let home = std::env::var("HOME").unwrap_or_default();
        let paths = [
            format!("{home}/bin/{name}"),
            format!("{home}/.local/bin/{name}"),
            format!("/usr/local/bin/{name}"),
            format!("/opt/homebrew/bin/{name}"),
            format!("/usr/bin/{name}"),
        ];

        for path in paths {
            let p = PathBuf::from(&path);
            if p.exists() {
                return Ok(p);
            }
        }

        let output = std::process::Command::new("which").arg(name).output().ok();
        if let Some(output) = output {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Ok(PathBuf::from(path));
                }
            }
        }

        Err(EditronError::FFmpeg(format!("{name} not found in PATH")))
    }

    /// Get the FFmpeg executable path
    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    /// Run ffmpeg with `args`; a non-zero exit carries the stderr tail.
    pub async fn run(&self, args: &[String]) -> EditronResult<()> {
        debug!(ffmpeg = %self.ffmpeg_path.display(), args = ?args, "running ffmpeg");

        let output = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| EditronError::Process(e.to_string()))?;

        if !output.status.success() {
            let stderr = stderr_tail(&String::from_utf8_lossy(&output.stderr));
            error!(status = %output.status, stderr = %stderr, "ffmpeg failed");
            return Err(EditronError::Render {
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(())
    }

    /// Extract the audio stream of a video as 128 kbps / 44.1 kHz MP3.
    pub async fn extract_audio(&self, input: &Path, output: &Path) -> EditronResult<PathBuf> {
        if !input.exists() {
            return Err(EditronError::FileNotFound(input.to_path_buf()));
        }

        self.run(&extract_audio_args(input, output)).await?;
        Ok(output.to_path_buf())
    }
}

pub fn extract_audio_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-vn".into(),
        "-acodec".into(),
        AudioCodec::Mp3.ffmpeg_codec().into(),
        "-ab".into(),
        "128k".into(),
        "-ar".into(),
        "44100".into(),
        output.to_string_lossy().into_owned(),
    ]
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[async_trait]
impl Encoder for FFmpegClient {
    async fn encode(&self, job: &EncodeJob) -> EditronResult<()> {
        if let Some(parent) = job.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        for input in &job.inputs {
            if !input.path.exists() {
                return Err(EditronError::FileNotFound(input.path.clone()));
            }
        }
        self.run(&job.to_args()).await
    }
}
