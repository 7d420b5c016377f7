use std::{
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use cinematics::{CinematicsConfig, FrameGenerator, FrameOrigin};
use editron::{
    AudioKind, EditronError, EditronResult, EncodeJob, Encoder, FilterOp, MusicSelector,
    RenderSettings, VideoRenderer,
};
use tempfile::TempDir;
use utils::{
    ArtifactStore, LocalArtifactStore, ScriptMetadata, StorageError, StorageResult, Tone,
};
use voice::{TTSProvider, TextToSpeech, VoiceError, VoiceOptions, VoiceResult, VoiceSynthesizer};

use super::*;

type FailWhen = Box<dyn Fn(&EncodeJob) -> bool + Send + Sync>;

/// Records every job and writes a stub container unless `fail_when` matches.
struct RecordingEncoder {
    jobs: Mutex<Vec<EncodeJob>>,
    fail_when: FailWhen,
}

impl RecordingEncoder {
    fn new(fail_when: impl Fn(&EncodeJob) -> bool + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            jobs: Mutex::new(Vec::new()),
            fail_when: Box::new(fail_when),
        })
    }

    fn ok() -> Arc<Self> {
        Self::new(|_| false)
    }

    fn jobs(&self) -> Vec<EncodeJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Encoder for RecordingEncoder {
    async fn encode(&self, job: &EncodeJob) -> EditronResult<()> {
        self.jobs.lock().unwrap().push(job.clone());
        if (self.fail_when)(job) {
            return Err(EditronError::Render {
                status: "exit status: 1".into(),
                stderr: "Error initializing complex filters".into(),
            });
        }
        if let Some(parent) = job.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&job.output, b"mp4").await?;
        Ok(())
    }
}

fn has_op(job: &EncodeJob, matches: impl Fn(&FilterOp) -> bool) -> bool {
    job.graph.nodes().iter().any(|node| matches(&node.op))
}

struct StubTts {
    fail: bool,
}

#[async_trait]
impl TextToSpeech for StubTts {
    fn provider(&self) -> TTSProvider {
        TTSProvider::ElevenLabs
    }

    async fn synthesize(
        &self,
        _text: &str,
        _options: &VoiceOptions,
        output: &Path,
    ) -> VoiceResult<PathBuf> {
        if self.fail {
            return Err(VoiceError::TTSError("connection refused".into()));
        }
        tokio::fs::write(output, b"mp3").await?;
        Ok(output.to_path_buf())
    }
}

struct BrokenStore;

#[async_trait]
impl ArtifactStore for BrokenStore {
    async fn save(&self, _episode_id: &str, filename: &str, _bytes: &[u8]) -> StorageResult<String> {
        Err(StorageError::InvalidName(filename.to_string()))
    }

    async fn move_final(
        &self,
        _episode_id: &str,
        tmp_path: &Path,
        _filename: &str,
    ) -> StorageResult<String> {
        Err(StorageError::SourceMissing(tmp_path.to_path_buf()))
    }
}

/// In-memory sink for a scoped fmt subscriber.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Harness {
    dir: TempDir,
    encoder: Arc<RecordingEncoder>,
    tts: Option<Arc<dyn TextToSpeech>>,
    store: Option<Arc<dyn ArtifactStore>>,
    music: Vec<&'static str>,
}

impl Harness {
    fn new(encoder: Arc<RecordingEncoder>) -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            encoder,
            tts: Some(Arc::new(StubTts { fail: false })),
            store: None,
            music: vec!["theme.mp3", "fantasy-theme.mp3", "comedy-theme.mp3", "epic-theme.mp3"],
        }
    }

    fn audio_dir(&self) -> PathBuf {
        self.dir.path().join("assets").join("audio")
    }

    fn storage_root(&self) -> PathBuf {
        self.dir.path().join("public")
    }

    fn components(&self) -> PipelineComponents {
        let audio_dir = self.audio_dir();
        std::fs::create_dir_all(&audio_dir).unwrap();
        for track in &self.music {
            std::fs::write(audio_dir.join(track), b"mp3").unwrap();
        }

        let store: Arc<dyn ArtifactStore> = match self.store.clone() {
            Some(store) => store,
            None => Arc::new(LocalArtifactStore::new(self.storage_root(), "http://media.test")),
        };

        PipelineComponents {
            frames: FrameGenerator::with_provider(None, CinematicsConfig::default()),
            voice: VoiceSynthesizer::with_provider(self.tts.clone(), None),
            music: MusicSelector::new(audio_dir),
            renderer: VideoRenderer::new(self.encoder.clone()),
            store,
        }
    }

    fn pipeline(&self) -> RenderPipeline {
        RenderPipeline::new(
            self.components(),
            RenderSettings::default(),
            self.dir.path().join("work"),
            6,
        )
        .unwrap()
    }

    fn request(&self, tone: Tone) -> RenderRequest {
        RenderRequest {
            episode_id: "ep1".into(),
            panel_sources: (1..=6)
                .map(|i| self.dir.path().join(format!("panel-{i}.png")))
                .collect(),
            hook: "Nobody returns from the Ember Gate.".into(),
            metadata: ScriptMetadata {
                episode_number: Some(3),
                setting: Some("a volcanic citadel".into()),
                characters: vec!["Mara Vell".into(), "Tobin Ash".into()],
                tone: Some(tone),
                captions: (1..=6).map(|i| format!("Beat {i} unfolds")).collect(),
                ..ScriptMetadata::default()
            },
        }
    }
}

#[tokio::test]
async fn test_cinematic_render_uses_every_stage() {
    let harness = Harness::new(RecordingEncoder::ok());
    let outcome = harness.pipeline().render(harness.request(Tone::Fantasy)).await.unwrap();

    assert_eq!(outcome.path, RenderPath::Cinematic);
    assert_eq!(outcome.fallback_reason, None);
    assert_eq!(outcome.audio_tracks, vec![AudioKind::Voice, AudioKind::Music]);
    assert_eq!(outcome.artifact.duration_sec, 6.0 * 3.0 + 0.5);
    assert_eq!((outcome.artifact.width, outcome.artifact.height), (1080, 1920));
    assert_eq!(
        outcome.video_address,
        "http://media.test/generated/ep1/ep-ep1-trailer.mp4"
    );
    assert!(harness.storage_root().join("ep1/ep-ep1-trailer.mp4").is_file());

    let jobs = harness.encoder.jobs();
    assert_eq!(jobs.len(), 1);
    let job = &jobs[0];
    assert!(has_op(job, |op| matches!(op, FilterOp::Crossfade { .. })));
    assert!(has_op(job, |op| matches!(op, FilterOp::Mix { .. })));
    assert!(has_op(job, |op| matches!(op, FilterOp::SubtitleBurn { .. })));
    assert!(job
        .inputs
        .iter()
        .any(|input| input.path == harness.audio_dir().join("fantasy-theme.mp3")));

    assert_eq!(
        outcome.subtitle_address.as_deref(),
        Some("http://media.test/generated/ep1/ep-ep1-subtitles.ass")
    );
    assert!(outcome.srt_address.is_some());
}

#[tokio::test]
async fn test_mix_failure_falls_back_to_slideshow() {
    let encoder = RecordingEncoder::new(|job| has_op(job, |op| matches!(op, FilterOp::Mix { .. })));
    let harness = Harness::new(encoder);
    let request = harness.request(Tone::Epic);
    let panels = request.panel_sources.clone();

    let outcome = harness.pipeline().render(request).await.unwrap();

    assert_eq!(outcome.path, RenderPath::Slideshow);
    assert!(outcome
        .fallback_reason
        .as_deref()
        .unwrap()
        .contains("compose_cinematic"));
    assert!(outcome.audio_tracks.is_empty());
    assert_eq!(outcome.artifact.duration_sec, 6.0 * 3.0);

    let jobs = harness.encoder.jobs();
    assert_eq!(jobs.len(), 2);
    let slideshow = &jobs[1];
    let inputs: Vec<PathBuf> = slideshow.inputs.iter().map(|i| i.path.clone()).collect();
    assert_eq!(inputs, panels);
    assert!(slideshow.inputs.iter().all(|i| i.duration_sec == Some(3.0)));
    assert!(!has_op(slideshow, |op| matches!(op, FilterOp::Crossfade { .. })));
    assert!(!has_op(slideshow, |op| matches!(
        op,
        FilterOp::Mix { .. } | FilterOp::BandPass { .. } | FilterOp::SubtitleBurn { .. }
    )));
    assert!(slideshow.output_options.contains(&"-an".to_string()));
}

#[tokio::test]
async fn test_voice_failure_without_fallback_omits_voice_track() {
    let mut harness = Harness::new(RecordingEncoder::ok());
    harness.tts = Some(Arc::new(StubTts { fail: true }));

    let outcome = harness.pipeline().render(harness.request(Tone::Comedy)).await.unwrap();

    assert_eq!(outcome.path, RenderPath::Cinematic);
    assert_eq!(outcome.audio_tracks, vec![AudioKind::Music]);
    let job = &harness.encoder.jobs()[0];
    assert!(!has_op(job, |op| matches!(op, FilterOp::Mix { .. })));
    assert_eq!(
        job.graph
            .nodes()
            .iter()
            .filter(|n| matches!(n.op, FilterOp::BandPass { .. }))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_silent_video_when_no_audio_is_available() {
    let mut harness = Harness::new(RecordingEncoder::ok());
    harness.tts = None;
    harness.music = Vec::new();

    let outcome = harness.pipeline().render(harness.request(Tone::Epic)).await.unwrap();

    assert_eq!(outcome.path, RenderPath::Cinematic);
    assert!(outcome.audio_tracks.is_empty());
    let job = &harness.encoder.jobs()[0];
    assert!(job.output_options.contains(&"-an".to_string()));
}

#[tokio::test]
async fn test_unconfigured_provider_yields_placeholder_frames() {
    let harness = Harness::new(RecordingEncoder::ok());
    let request = harness.request(Tone::Fantasy);
    let captions = request.metadata.captions.clone();

    let outcome = harness.pipeline().render(request).await.unwrap();

    assert_eq!(outcome.frames.len(), 6);
    for (i, frame) in outcome.frames.iter().enumerate() {
        assert_eq!(frame.slot_index, i);
        assert_eq!(frame.origin, FrameOrigin::Fallback);
        assert_eq!(frame.caption, captions[i]);
        assert_eq!(
            frame.address.as_deref(),
            Some(format!("http://media.test/generated/ep1/ep-ep1-p{}.jpg", i + 1).as_str())
        );
    }
}

#[tokio::test]
async fn test_epic_without_dedicated_track_uses_default_music() {
    let mut harness = Harness::new(RecordingEncoder::ok());
    harness.music = vec!["theme.mp3", "fantasy-theme.mp3"];

    harness.pipeline().render(harness.request(Tone::Epic)).await.unwrap();

    let job = &harness.encoder.jobs()[0];
    assert!(job
        .inputs
        .iter()
        .any(|input| input.path == harness.audio_dir().join("theme.mp3")));
}

#[tokio::test]
async fn test_missing_captions_become_panel_labels() {
    let harness = Harness::new(RecordingEncoder::ok());
    let mut request = harness.request(Tone::Fantasy);
    request.metadata.captions.truncate(4);

    let outcome = harness.pipeline().render(request).await.unwrap();

    assert_eq!(outcome.frames[4].caption, "Panel 5");
    assert_eq!(outcome.frames[5].caption, "Panel 6");
    let srt = std::fs::read_to_string(
        harness.dir.path().join("work/ep1/ep-ep1-subtitles.srt"),
    )
    .unwrap();
    assert!(srt.contains("Panel 6"));
}

#[tokio::test]
async fn test_empty_panel_list_is_rejected() {
    let harness = Harness::new(RecordingEncoder::ok());
    let mut request = harness.request(Tone::Fantasy);
    request.panel_sources.clear();

    let err = harness.pipeline().render(request).await.unwrap_err();

    assert!(matches!(err, RenderFatalError::InvalidRequest(_)));
    assert!(harness.encoder.jobs().is_empty());
}

#[tokio::test]
async fn test_episode_id_must_be_a_path_segment() {
    let harness = Harness::new(RecordingEncoder::ok());
    let mut request = harness.request(Tone::Fantasy);
    request.episode_id = "../escape".into();

    let err = harness.pipeline().render(request).await.unwrap_err();
    assert!(matches!(err, RenderFatalError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_failed_slideshow_encode_is_fatal() {
    let harness = Harness::new(RecordingEncoder::new(|_| true));

    let err = harness.pipeline().render(harness.request(Tone::Fantasy)).await.unwrap_err();

    assert!(matches!(err, RenderFatalError::Render(EditronError::Render { .. })));
    assert_eq!(harness.encoder.jobs().len(), 2);
}

#[tokio::test]
async fn test_storage_failure_on_final_video_is_fatal() {
    let mut harness = Harness::new(RecordingEncoder::ok());
    harness.store = Some(Arc::new(BrokenStore));

    let err = harness.pipeline().render(harness.request(Tone::Fantasy)).await.unwrap_err();
    assert!(matches!(err, RenderFatalError::Storage(_)));
}

#[test]
fn test_preview_job_matches_cinematic_layout() {
    let harness = Harness::new(RecordingEncoder::ok());
    let pipeline = harness.pipeline();

    let job = pipeline.preview_job(&harness.request(Tone::Epic)).unwrap();
    let args = job.to_args();

    assert_eq!(job.inputs.len(), 6 + 2);
    assert!(args.iter().any(|a| a.ends_with("ep-ep1-p6.jpg")));
    assert!(args.iter().any(|a| a.ends_with("ep-ep1-voice.mp3")));
    assert!(args.iter().any(|a| a.ends_with("epic-theme.mp3")));
    assert!(args.iter().any(|a| a.ends_with("ep-ep1-trailer.mp4")));
    assert!(harness.encoder.jobs().is_empty());
}

#[tokio::test]
async fn test_recovery_logs_carry_episode_id() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut harness = Harness::new(RecordingEncoder::ok());
    harness.tts = Some(Arc::new(StubTts { fail: true }));
    harness.music = Vec::new();
    harness.pipeline().render(harness.request(Tone::Fantasy)).await.unwrap();

    let logs = logs.contents();
    let line = |needle: &str| {
        logs.lines()
            .find(|line| line.contains(needle))
            .unwrap_or_else(|| panic!("no log line with {needle:?} in:\n{logs}"))
            .to_string()
    };

    let voice = line("voice synthesis failed");
    assert!(voice.contains("episode_id=ep1"), "{voice}");
    assert!(voice.contains("generate_audio"), "{voice}");

    let music = line("no music asset available");
    assert!(music.contains("episode_id=ep1"), "{music}");
    assert!(music.contains("select_music"), "{music}");
}

#[test]
fn test_unusable_settings_are_a_setup_error() {
    let harness = Harness::new(RecordingEncoder::ok());
    let work = harness.dir.path().join("work");

    for frame_duration_sec in [f64::INFINITY, f64::NAN, 0.0, -3.0] {
        let settings = RenderSettings {
            frame_duration_sec,
            ..RenderSettings::default()
        };
        let result = RenderPipeline::new(harness.components(), settings, &work, 6);
        assert!(
            matches!(result, Err(RenderFatalError::Setup(_))),
            "frame_duration_sec = {frame_duration_sec}"
        );
    }

    let result = RenderPipeline::new(harness.components(), RenderSettings::default(), &work, 0);
    assert!(matches!(result, Err(RenderFatalError::Setup(_))));
}
