//! One frame per narrative slot, with a per-slot placeholder fallback.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};
use utils::ScriptMetadata;

use crate::{
    error::{GenerationError, GenerationResult},
    mystic::{GenerationProvider, MysticClient, MysticRequest},
    overlay::{self, OverlaySpec},
    poller::TaskPoller,
    prompt::build_frame_prompt,
    CinematicsConfig,
};

const UNCONFIGURED_LABEL: &str = "Comic Book Style - Placeholder";
const FAILED_SLOT_LABEL: &str = "Comic Book Style - Generation unavailable";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameOrigin {
    Generated,
    Fallback,
}

impl fmt::Display for FrameOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameOrigin::Generated => f.write_str("generated"),
            FrameOrigin::Fallback => f.write_str("fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub slot_index: usize,
    pub image_path: PathBuf,
    pub origin: FrameOrigin,
    pub caption: String,
}

impl Frame {
    pub fn file_name(&self) -> String {
        self.image_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Caption for slot `index`, defaulting to `Panel {index+1}`.
pub fn slot_caption(captions: &[String], index: usize) -> String {
    captions
        .get(index)
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Panel {}", index + 1))
}

pub fn frame_file_name(episode_id: &str, index: usize) -> String {
    format!("ep-{episode_id}-p{}.jpg", index + 1)
}

/// Input of one [`FrameGenerator::generate`] call.
#[derive(Debug, Clone)]
pub struct FrameRequest<'a> {
    pub episode_id: &'a str,
    pub captions: &'a [String],
    pub slot_count: usize,
    pub metadata: &'a ScriptMetadata,
    pub output_dir: &'a Path,
}

pub struct FrameGenerator {
    provider: Option<Arc<dyn GenerationProvider>>,
    poller: TaskPoller,
    config: CinematicsConfig,
}

impl FrameGenerator {
    /// Builds the HTTP provider only when credentials are configured.
    pub fn from_config(config: CinematicsConfig) -> GenerationResult<Self> {
        let provider: Option<Arc<dyn GenerationProvider>> = match config.api_key() {
            Some(key) => Some(Arc::new(MysticClient::new(key, &config.base_url)?)),
            None => None,
        };
        Ok(Self::with_provider(provider, config))
    }

    pub fn with_provider(
        provider: Option<Arc<dyn GenerationProvider>>,
        config: CinematicsConfig,
    ) -> Self {
        let poller = TaskPoller::new(config.poll.clone());
        Self {
            provider,
            poller,
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    fn overlay_spec(&self, metadata: &ScriptMetadata, caption: &str) -> OverlaySpec {
        OverlaySpec {
            width: self.config.frame_width,
            height: self.config.frame_height,
            episode_number: metadata.episode_number(),
            caption: caption.to_string(),
            brand_handle: self.config.brand_handle.clone(),
        }
    }

    /// Produce exactly `slot_count` frames. Provider and write failures are
    /// absorbed per slot; only failing to write a placeholder is returned as
    /// an error.
    pub async fn generate(&self, request: FrameRequest<'_>) -> GenerationResult<Vec<Frame>> {
        fs::create_dir_all(request.output_dir).await?;

        if self.provider.is_none() {
            warn!(
                stage = "generate_frames",
                episode_id = request.episode_id,
                "image provider not configured, using placeholder frames"
            );
        }

        let mut frames = Vec::with_capacity(request.slot_count);
        for index in 0..request.slot_count {
            let caption = slot_caption(request.captions, index);
            let spec = self.overlay_spec(request.metadata, &caption);
            let path = request
                .output_dir
                .join(frame_file_name(request.episode_id, index));

            let origin = match &self.provider {
                None => {
                    write_placeholder(&spec, UNCONFIGURED_LABEL, &path).await?;
                    FrameOrigin::Fallback
                }
                Some(provider) => {
                    let generated = match self
                        .generate_slot(provider.as_ref(), &caption, request.metadata, &spec)
                        .await
                    {
                        Ok(bytes) => write_frame(&path, &bytes).await,
                        Err(err) => Err(err),
                    };
                    match generated {
                        Ok(()) => FrameOrigin::Generated,
                        Err(err) => {
                            warn!(
                                stage = "generate_frames",
                                episode_id = request.episode_id,
                                slot = index + 1,
                                kind = err.kind(),
                                error = %err,
                                "frame generation failed, using placeholder"
                            );
                            write_placeholder(&spec, FAILED_SLOT_LABEL, &path).await?;
                            FrameOrigin::Fallback
                        }
                    }
                }
            };

            frames.push(Frame {
                slot_index: index,
                image_path: path,
                origin,
                caption,
            });
        }

        let generated = frames
            .iter()
            .filter(|f| f.origin == FrameOrigin::Generated)
            .count();
        info!(
            stage = "generate_frames",
            episode_id = request.episode_id,
            generated,
            fallback = frames.len() - generated,
            "frames ready"
        );

        Ok(frames)
    }

    async fn generate_slot(
        &self,
        provider: &dyn GenerationProvider,
        caption: &str,
        metadata: &ScriptMetadata,
        spec: &OverlaySpec,
    ) -> GenerationResult<Vec<u8>> {
        let prompt = build_frame_prompt(caption, metadata)?;
        let request = MysticRequest::image(
            prompt,
            &self.config.aspect_ratio,
            &self.config.style,
            &self.config.quality,
        );

        let task_id = provider.submit(&request).await?;
        let assets = self.poller.wait_for_assets(provider, &task_id).await?;
        let asset = assets
            .first()
            .ok_or_else(|| GenerationError::Download(format!("task {task_id} returned no assets")))?;

        let bytes = provider.download(asset.fetch_url()).await?;
        if bytes.is_empty() {
            return Err(GenerationError::Download(format!(
                "task {task_id} asset is empty"
            )));
        }

        overlay::compose_generated_frame(&bytes, spec)
    }
}

/// Writes through a `.part` file so `path` never holds a truncated frame.
async fn write_frame(path: &Path, bytes: &[u8]) -> GenerationResult<()> {
    let partial = path.with_extension("jpg.part");
    fs::write(&partial, bytes).await?;
    fs::rename(&partial, path).await?;
    Ok(())
}

async fn write_placeholder(spec: &OverlaySpec, label: &str, path: &Path) -> GenerationResult<()> {
    let bytes = overlay::render_placeholder_frame(spec, label)?;
    fs::write(path, bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        io::Cursor,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::poller::{
        GeneratedAsset, GenerationTask, PollConfig, TaskStatus, TaskStatusSource,
    };

    #[derive(Clone, Copy)]
    enum Behaviour {
        Succeed,
        FailTask,
        EmptyDownload,
    }

    struct FakeProvider {
        behaviour: Behaviour,
        fail_slot: Option<usize>,
        submits: AtomicUsize,
    }

    impl FakeProvider {
        fn new(behaviour: Behaviour) -> Self {
            Self {
                behaviour,
                fail_slot: None,
                submits: AtomicUsize::new(0),
            }
        }
    }

    fn png_bytes() -> Bytes {
        let img = image::RgbaImage::from_pixel(64, 64, image::Rgba([10, 120, 200, 255]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        Bytes::from(out)
    }

    #[async_trait]
    impl TaskStatusSource for FakeProvider {
        async fn poll_task(&self, task_id: &str) -> GenerationResult<GenerationTask> {
            let failing = matches!(self.behaviour, Behaviour::FailTask)
                || self.fail_slot.map(|s| task_id == format!("task-{s}")).unwrap_or(false);
            Ok(GenerationTask {
                id: task_id.to_string(),
                status: if failing { TaskStatus::Failed } else { TaskStatus::Completed },
                result_assets: if failing {
                    Vec::new()
                } else {
                    vec![GeneratedAsset {
                        id: "1".into(),
                        url: "https://cdn.test/frame.png".into(),
                        download_url: String::new(),
                    }]
                },
                error: failing.then(|| "content policy".to_string()),
            })
        }
    }

    #[async_trait]
    impl GenerationProvider for FakeProvider {
        async fn submit(&self, _request: &MysticRequest) -> GenerationResult<String> {
            let n = self.submits.fetch_add(1, Ordering::SeqCst);
            Ok(format!("task-{n}"))
        }

        async fn download(&self, _url: &str) -> GenerationResult<Bytes> {
            match self.behaviour {
                Behaviour::EmptyDownload => Ok(Bytes::new()),
                _ => Ok(png_bytes()),
            }
        }
    }

    fn small_config() -> CinematicsConfig {
        CinematicsConfig {
            frame_width: 108,
            frame_height: 135,
            poll: PollConfig {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                delay_cap: Duration::from_millis(1),
                ..PollConfig::default()
            },
            ..CinematicsConfig::default()
        }
    }

    fn captions() -> Vec<String> {
        (1..=6).map(|i| format!("Beat number {i}")).collect()
    }

    #[tokio::test]
    async fn test_unconfigured_provider_yields_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let generator = FrameGenerator::with_provider(None, small_config());
        let captions = captions();
        let metadata = ScriptMetadata::default();

        let frames = generator
            .generate(FrameRequest {
                episode_id: "e1",
                captions: &captions,
                slot_count: 6,
                metadata: &metadata,
                output_dir: dir.path(),
            })
            .await
            .unwrap();

        assert_eq!(frames.len(), 6);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.origin, FrameOrigin::Fallback);
            assert_eq!(frame.caption, captions[i]);
            assert!(frame.image_path.exists());
        }
        assert_eq!(frames[0].file_name(), "ep-e1-p1.jpg");
    }

    #[tokio::test]
    async fn test_successful_provider_marks_frames_generated() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(FakeProvider::new(Behaviour::Succeed));
        let generator = FrameGenerator::with_provider(Some(provider.clone()), small_config());
        let metadata = ScriptMetadata::default();

        let frames = generator
            .generate(FrameRequest {
                episode_id: "e2",
                captions: &captions(),
                slot_count: 3,
                metadata: &metadata,
                output_dir: dir.path(),
            })
            .await
            .unwrap();

        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.origin == FrameOrigin::Generated));
        assert_eq!(provider.submits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_slot_failures_are_absorbed() {
        let dir = tempfile::tempdir().unwrap();
        for behaviour in [Behaviour::FailTask, Behaviour::EmptyDownload] {
            let generator = FrameGenerator::with_provider(
                Some(Arc::new(FakeProvider::new(behaviour))),
                small_config(),
            );
            let metadata = ScriptMetadata::default();

            let frames = generator
                .generate(FrameRequest {
                    episode_id: "e3",
                    captions: &captions(),
                    slot_count: 4,
                    metadata: &metadata,
                    output_dir: dir.path(),
                })
                .await
                .unwrap();

            assert_eq!(frames.len(), 4);
            assert!(frames.iter().all(|f| f.origin == FrameOrigin::Fallback));
        }
    }

    #[tokio::test]
    async fn test_one_failing_slot_does_not_affect_others() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = FakeProvider::new(Behaviour::Succeed);
        provider.fail_slot = Some(1);
        let generator = FrameGenerator::with_provider(Some(Arc::new(provider)), small_config());
        let metadata = ScriptMetadata::default();

        let frames = generator
            .generate(FrameRequest {
                episode_id: "e4",
                captions: &captions(),
                slot_count: 3,
                metadata: &metadata,
                output_dir: dir.path(),
            })
            .await
            .unwrap();

        let origins: Vec<_> = frames.iter().map(|f| f.origin).collect();
        assert_eq!(
            origins,
            vec![FrameOrigin::Generated, FrameOrigin::Fallback, FrameOrigin::Generated]
        );
    }

    #[tokio::test]
    async fn test_failed_frame_write_falls_back_to_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("ep-e5-p2.jpg.part")).unwrap();
        let provider = Arc::new(FakeProvider::new(Behaviour::Succeed));
        let generator = FrameGenerator::with_provider(Some(provider), small_config());
        let metadata = ScriptMetadata::default();

        let frames = generator
            .generate(FrameRequest {
                episode_id: "e5",
                captions: &captions(),
                slot_count: 3,
                metadata: &metadata,
                output_dir: dir.path(),
            })
            .await
            .unwrap();

        let origins: Vec<_> = frames.iter().map(|f| f.origin).collect();
        assert_eq!(
            origins,
            vec![FrameOrigin::Generated, FrameOrigin::Fallback, FrameOrigin::Generated]
        );
        let placeholder = image::open(&frames[1].image_path).unwrap();
        assert_eq!((placeholder.width(), placeholder.height()), (108, 135));
        assert!(!dir.path().join("ep-e5-p1.jpg.part").exists());
    }

    #[test]
    fn test_placeholder_overlay_uses_slot_caption() {
        let generator = FrameGenerator::with_provider(None, small_config());
        let metadata = ScriptMetadata {
            episode_number: Some(9),
            ..ScriptMetadata::default()
        };
        let captions = vec!["The bridge gives way".to_string()];

        let first = generator.overlay_spec(&metadata, &slot_caption(&captions, 0));
        let svg = overlay::placeholder_svg(&first, UNCONFIGURED_LABEL);
        assert!(svg.contains(">The bridge gives way</tspan>"));
        assert!(svg.contains("Ep 9"));

        let second = generator.overlay_spec(&metadata, &slot_caption(&captions, 1));
        let svg = overlay::placeholder_svg(&second, FAILED_SLOT_LABEL);
        assert!(svg.contains(">Panel 2</tspan>"));
        assert!(svg.contains(FAILED_SLOT_LABEL));
    }

    #[test]
    fn test_missing_captions_default_to_panel_label() {
        let captions = vec!["First".to_string(), "  ".to_string()];
        assert_eq!(slot_caption(&captions, 0), "First");
        assert_eq!(slot_caption(&captions, 1), "Panel 2");
        assert_eq!(slot_caption(&captions, 5), "Panel 6");
    }
}
