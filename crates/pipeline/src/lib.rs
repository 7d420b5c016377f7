//! Episode render pipeline
//!
//! ```text
//! START ─► GENERATE_FRAMES ─► GENERATE_AUDIO ─► GENERATE_SUBTITLES ─► COMPOSE_CINEMATIC ─► SUCCESS
//!                                                                          │
//!                                                                          ▼
//!                                                                   COMPOSE_FALLBACK ─► SUCCESS | FATAL
//! ```
//!
//! Provider failures are absorbed inside the stages. Any error that still
//! escapes the cinematic stages switches the render to a plain slideshow of
//! the original panels. Only a failed slideshow encode, or failing to store
//! the final video, reaches the caller.

pub mod config;
pub mod script;

#[cfg(test)]
mod pipeline_tests;

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use cinematics::{Frame, FrameGenerator, FrameOrigin, FrameRequest, GenerationError};
use editron::{
    AudioKind, CompositionPlanner, EditronError, EncodeJob, FFmpegClient, MusicSelector,
    RenderSettings, RenderedArtifact, SubtitleBuilder, SubtitleFiles, VideoRenderer,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, info_span, warn, Instrument};
use utils::{ArtifactStore, LocalArtifactStore, ScriptMetadata, StorageError};
use uuid::Uuid;
use voice::{VoiceOptions, VoiceSynthesizer};

pub use config::{ConfigError, PipelineConfig};
pub use script::{EpisodeScript, ScriptError};

#[derive(Debug, Error)]
pub enum RenderFatalError {
    #[error("Invalid render request: {0}")]
    InvalidRequest(String),

    #[error("Pipeline setup failed: {0}")]
    Setup(String),

    #[error("Slideshow render failed: {0}")]
    Render(#[source] EditronError),

    #[error("Storing the final video failed: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why the cinematic path was abandoned. Never returned to the caller.
#[derive(Debug, Error)]
pub enum CinematicError {
    #[error("frame generation failed: {0}")]
    Frames(#[from] GenerationError),

    #[error("{stage} failed: {source}")]
    Compose {
        stage: RenderStage,
        #[source]
        source: EditronError,
    },
}

impl CinematicError {
    pub fn stage(&self) -> RenderStage {
        match self {
            CinematicError::Frames(_) => RenderStage::GenerateFrames,
            CinematicError::Compose { stage, .. } => *stage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStage {
    Start,
    GenerateFrames,
    GenerateAudio,
    GenerateSubtitles,
    ComposeCinematic,
    ComposeFallback,
    Success,
    Fatal,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderStage::Start => "start",
            RenderStage::GenerateFrames => "generate_frames",
            RenderStage::GenerateAudio => "generate_audio",
            RenderStage::GenerateSubtitles => "generate_subtitles",
            RenderStage::ComposeCinematic => "compose_cinematic",
            RenderStage::ComposeFallback => "compose_fallback",
            RenderStage::Success => "success",
            RenderStage::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderPath {
    Cinematic,
    Slideshow,
}

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub episode_id: String,
    /// Original panel images; the slideshow fallback renders these.
    pub panel_sources: Vec<PathBuf>,
    /// Narration text.
    pub hook: String,
    pub metadata: ScriptMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    pub slot_index: usize,
    pub origin: FrameOrigin,
    pub caption: String,
    pub path: PathBuf,
    /// Storage address; `None` when persisting the frame failed.
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOutcome {
    /// Correlates the log lines of one invocation.
    pub render_id: Uuid,
    pub episode_id: String,
    pub artifact: RenderedArtifact,
    pub video_address: String,
    pub path: RenderPath,
    /// Error that sent the render down the slideshow path.
    pub fallback_reason: Option<String>,
    /// Audio present in the final video.
    pub audio_tracks: Vec<AudioKind>,
    pub frames: Vec<FrameRecord>,
    pub subtitle_address: Option<String>,
    pub srt_address: Option<String>,
    pub completed_at: DateTime<Utc>,
}

pub fn video_file_name(episode_id: &str) -> String {
    format!("ep-{episode_id}-trailer.mp4")
}

pub fn voice_file_name(episode_id: &str) -> String {
    format!("ep-{episode_id}-voice.mp3")
}

fn subtitle_file_name(episode_id: &str) -> String {
    format!("ep-{episode_id}-subtitles.ass")
}

/// Collaborators of a [`RenderPipeline`].
pub struct PipelineComponents {
    pub frames: FrameGenerator,
    pub voice: VoiceSynthesizer,
    pub music: MusicSelector,
    pub renderer: VideoRenderer,
    pub store: Arc<dyn ArtifactStore>,
}

/// What the cinematic stages produced before finishing or failing.
#[derive(Default)]
struct CinematicProgress {
    frames: Vec<Frame>,
    subtitles: Option<SubtitleFiles>,
}

pub struct RenderPipeline {
    frames: FrameGenerator,
    voice: VoiceSynthesizer,
    music: MusicSelector,
    subtitles: SubtitleBuilder,
    planner: CompositionPlanner,
    renderer: VideoRenderer,
    store: Arc<dyn ArtifactStore>,
    work_dir: PathBuf,
    slot_count: usize,
}

impl RenderPipeline {
    /// Subtitle windows are built with the frame duration of `settings`, so
    /// captions stay aligned with the frames they belong to.
    pub fn new(
        components: PipelineComponents,
        settings: RenderSettings,
        work_dir: impl Into<PathBuf>,
        slot_count: usize,
    ) -> Result<Self, RenderFatalError> {
        if slot_count == 0 {
            return Err(RenderFatalError::Setup("slot count must be at least 1".into()));
        }
        let caption_duration = Duration::try_from_secs_f64(settings.frame_duration_sec)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| {
                RenderFatalError::Setup(format!(
                    "frame duration {} is not a positive number of seconds",
                    settings.frame_duration_sec
                ))
            })?;
        Ok(Self {
            frames: components.frames,
            voice: components.voice,
            music: components.music,
            subtitles: SubtitleBuilder::new(caption_duration),
            planner: CompositionPlanner::new(settings),
            renderer: components.renderer,
            store: components.store,
            work_dir: work_dir.into(),
            slot_count,
        })
    }

    /// Production wiring: Mystic frames, the configured voice provider,
    /// ffmpeg and local artifact storage.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, RenderFatalError> {
        let config = config.clone().with_default_fallback_audio()?;

        let frames = FrameGenerator::from_config(config.cinematics.clone())
            .map_err(|err| RenderFatalError::Setup(format!("frame generator: {err}")))?;
        let voice = VoiceSynthesizer::new(&config.voice)
            .map_err(|err| RenderFatalError::Setup(format!("voice synthesizer: {err}")))?;
        let ffmpeg = FFmpegClient::new().unwrap_or_else(|err| {
            warn!(error = %err, "ffmpeg not located, relying on PATH");
            FFmpegClient::with_path("ffmpeg")
        });
        let store = LocalArtifactStore::new(&config.storage_root, &config.media_base_url);

        let components = PipelineComponents {
            frames,
            voice,
            music: MusicSelector::new(config.audio_dir()?),
            renderer: VideoRenderer::new(Arc::new(ffmpeg)),
            store: Arc::new(store),
        };
        Self::new(
            components,
            config.render.clone(),
            config.work_dir.clone(),
            config.slot_count,
        )
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    fn episode_dir(&self, episode_id: &str) -> PathBuf {
        self.work_dir.join(episode_id)
    }

    /// Render one episode video and hand it to storage.
    ///
    /// Everything logged while rendering, including events from the stage
    /// collaborators, sits inside a `render` span carrying the render and
    /// episode ids.
    pub async fn render(&self, request: RenderRequest) -> Result<RenderOutcome, RenderFatalError> {
        validate_request(&request)?;
        let render_id = Uuid::new_v4();
        let span = info_span!("render", %render_id, episode_id = %request.episode_id);
        self.render_in_span(render_id, request).instrument(span).await
    }

    async fn render_in_span(
        &self,
        render_id: Uuid,
        request: RenderRequest,
    ) -> Result<RenderOutcome, RenderFatalError> {
        let episode_id = request.episode_id.as_str();
        let metadata = request.metadata.clone().normalized();
        let episode_dir = self.episode_dir(episode_id);
        fs::create_dir_all(&episode_dir).await?;
        let output = episode_dir.join(video_file_name(episode_id));

        debug!(
            stage = %RenderStage::Start,
            %render_id,
            episode_id,
            panels = request.panel_sources.len(),
            slots = self.slot_count,
            "render started"
        );

        let mut progress = CinematicProgress::default();
        let cinematic = self
            .render_cinematic(episode_id, &request.hook, &metadata, &episode_dir, &output, &mut progress)
            .await;

        let (artifact, audio_tracks, path, fallback_reason) = match cinematic {
            Ok((artifact, audio_tracks)) => (artifact, audio_tracks, RenderPath::Cinematic, None),
            Err(err) => {
                warn!(
                    stage = %err.stage(),
                    %render_id,
                    episode_id,
                    error = %err,
                    "cinematic render failed, falling back to slideshow"
                );
                let artifact = self
                    .render_slideshow(episode_id, &request.panel_sources, &output)
                    .await?;
                (artifact, Vec::new(), RenderPath::Slideshow, Some(err.to_string()))
            }
        };

        let video_address = self
            .store
            .move_final(episode_id, &artifact.path, &video_file_name(episode_id))
            .await
            .map_err(|err| {
                error!(stage = %RenderStage::Fatal, episode_id, error = %err, "storing final video failed");
                RenderFatalError::Storage(err)
            })?;

        let frames = self.persist_frames(episode_id, &progress.frames).await;
        let (subtitle_address, srt_address) = match &progress.subtitles {
            Some(files) => (
                self.persist_file(episode_id, &files.ass_path).await,
                self.persist_file(episode_id, &files.srt_path).await,
            ),
            None => (None, None),
        };

        info!(
            stage = %RenderStage::Success,
            %render_id,
            episode_id,
            path = ?path,
            degraded = fallback_reason.is_some(),
            duration_sec = artifact.duration_sec,
            address = %video_address,
            "render finished"
        );

        Ok(RenderOutcome {
            render_id,
            episode_id: episode_id.to_string(),
            artifact,
            video_address,
            path,
            fallback_reason,
            audio_tracks,
            frames,
            subtitle_address,
            srt_address,
            completed_at: Utc::now(),
        })
    }

    async fn render_cinematic(
        &self,
        episode_id: &str,
        hook: &str,
        metadata: &ScriptMetadata,
        episode_dir: &Path,
        output: &Path,
        progress: &mut CinematicProgress,
    ) -> Result<(RenderedArtifact, Vec<AudioKind>), CinematicError> {
        debug!(stage = %RenderStage::GenerateFrames, episode_id, "generating frames");
        progress.frames = self
            .frames
            .generate(FrameRequest {
                episode_id,
                captions: &metadata.captions,
                slot_count: self.slot_count,
                metadata,
                output_dir: episode_dir,
            })
            .await?;

        debug!(stage = %RenderStage::GenerateAudio, episode_id, "generating audio");
        let tone = metadata.tone();
        let narration = if hook.trim().is_empty() {
            info!(stage = %RenderStage::GenerateAudio, episode_id, "empty hook, skipping narration");
            None
        } else {
            self.voice
                .generate_voice(
                    hook,
                    &VoiceOptions::for_tone(&tone),
                    &episode_dir.join(voice_file_name(episode_id)),
                )
                .await
        };
        let music = self.music.select(&tone);

        debug!(stage = %RenderStage::GenerateSubtitles, episode_id, "writing subtitles");
        let captions: Vec<String> = progress.frames.iter().map(|f| f.caption.clone()).collect();
        let settings = self.planner.settings();
        let files = self
            .subtitles
            .build(&captions)
            .write(episode_dir, episode_id, (settings.width, settings.height))
            .await
            .map_err(|source| CinematicError::Compose {
                stage: RenderStage::GenerateSubtitles,
                source,
            })?;
        progress.subtitles = Some(files.clone());

        debug!(stage = %RenderStage::ComposeCinematic, episode_id, "composing cinematic video");
        let compose = |source: EditronError| CinematicError::Compose {
            stage: RenderStage::ComposeCinematic,
            source,
        };
        let plan = self
            .planner
            .cinematic(
                progress.frames.iter().map(|f| f.image_path.clone()).collect(),
                narration,
                music,
                Some(files.ass_path),
            )
            .map_err(compose)?;
        let audio_tracks = plan.audio_tracks.iter().map(|t| t.kind).collect();
        let artifact = self.renderer.render(plan, output).await.map_err(compose)?;
        Ok((artifact, audio_tracks))
    }

    async fn render_slideshow(
        &self,
        episode_id: &str,
        panels: &[PathBuf],
        output: &Path,
    ) -> Result<RenderedArtifact, RenderFatalError> {
        debug!(stage = %RenderStage::ComposeFallback, episode_id, panels = panels.len(), "composing slideshow");
        let result = match self.planner.slideshow(panels.to_vec()) {
            Ok(plan) => self.renderer.render(plan, output).await,
            Err(err) => Err(err),
        };

        result.map_err(|err| {
            error!(stage = %RenderStage::Fatal, episode_id, error = %err, "slideshow fallback failed");
            RenderFatalError::Render(err)
        })
    }

    async fn persist_frames(&self, episode_id: &str, frames: &[Frame]) -> Vec<FrameRecord> {
        let mut records = Vec::with_capacity(frames.len());
        for frame in frames {
            records.push(FrameRecord {
                slot_index: frame.slot_index,
                origin: frame.origin,
                caption: frame.caption.clone(),
                path: frame.image_path.clone(),
                address: self.persist_file(episode_id, &frame.image_path).await,
            });
        }
        records
    }

    /// Best effort: a failed save is logged and leaves no address.
    async fn persist_file(&self, episode_id: &str, path: &Path) -> Option<String> {
        let name = path.file_name()?.to_string_lossy().into_owned();
        let saved = match fs::read(path).await {
            Ok(bytes) => self
                .store
                .save(episode_id, &name, &bytes)
                .await
                .map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };
        match saved {
            Ok(address) => Some(address),
            Err(err) => {
                warn!(episode_id, file = %name, error = %err, "artifact not persisted");
                None
            }
        }
    }

    /// The cinematic encode `render` would attempt for `request` when every
    /// stage succeeds, without generating or encoding anything.
    pub fn preview_job(&self, request: &RenderRequest) -> Result<EncodeJob, RenderFatalError> {
        validate_request(request)?;
        let episode_id = request.episode_id.as_str();
        let episode_dir = self.episode_dir(episode_id);
        let metadata = request.metadata.clone().normalized();

        let frames = (0..self.slot_count)
            .map(|i| episode_dir.join(cinematics::frames::frame_file_name(episode_id, i)))
            .collect();
        let narration = (!request.hook.trim().is_empty())
            .then(|| episode_dir.join(voice_file_name(episode_id)));
        let music = self.music.select(&metadata.tone());
        let subtitles = episode_dir.join(subtitle_file_name(episode_id));

        let plan = self
            .planner
            .cinematic(frames, narration, music, Some(subtitles))
            .map_err(RenderFatalError::Render)?;
        self.renderer
            .build_job(&plan, &episode_dir.join(video_file_name(episode_id)))
            .map_err(RenderFatalError::Render)
    }
}

fn validate_request(request: &RenderRequest) -> Result<(), RenderFatalError> {
    let id = request.episode_id.as_str();
    if id.trim().is_empty() || id != id.trim() || id.contains(['/', '\\']) || id == "." || id == ".." {
        return Err(RenderFatalError::InvalidRequest(format!(
            "episode id {id:?} is not a valid path segment"
        )));
    }
    if request.panel_sources.is_empty() {
        return Err(RenderFatalError::InvalidRequest(
            "at least one panel source is required".into(),
        ));
    }
    Ok(())
}
