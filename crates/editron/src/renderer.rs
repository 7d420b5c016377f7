//! Turns a [`CompositionPlan`] into an encoder invocation and runs it.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    graph::{escape_filter_path, FilterGraph, FilterOp},
    plan::{AudioKind, CompositionPlan, PlanKind, Transition},
    EditronResult,
};

/// One `-i` input of an encode.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeInput {
    pub path: PathBuf,
    /// Loop a still image for `duration_sec`.
    pub loop_image: bool,
    /// Repeat an audio file indefinitely; the output `-t` bounds it.
    pub stream_loop: bool,
    pub duration_sec: Option<f64>,
}

impl EncodeInput {
    fn still(path: PathBuf, duration_sec: f64) -> Self {
        Self {
            path,
            loop_image: true,
            stream_loop: false,
            duration_sec: Some(duration_sec),
        }
    }

    fn audio(path: PathBuf, stream_loop: bool) -> Self {
        Self {
            path,
            loop_image: false,
            stream_loop,
            duration_sec: None,
        }
    }
}

/// Complete, encoder-agnostic description of one encode.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeJob {
    pub inputs: Vec<EncodeInput>,
    pub graph: FilterGraph,
    pub output_options: Vec<String>,
    pub output: PathBuf,
}

impl EncodeJob {
    /// ffmpeg argument vector.
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into(), "-hide_banner".into()];

        for input in &self.inputs {
            if input.loop_image {
                args.extend(["-loop".into(), "1".into()]);
            }
            if input.stream_loop {
                args.extend(["-stream_loop".into(), "-1".into()]);
            }
            if let Some(duration) = input.duration_sec {
                args.extend(["-t".into(), format!("{duration:.3}")]);
            }
            args.extend(["-i".into(), input.path.to_string_lossy().into_owned()]);
        }

        if !self.graph.is_empty() {
            args.extend(["-filter_complex".into(), self.graph.to_filter_complex()]);
        }

        args.extend(self.output_options.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Executes encode jobs. `FFmpegClient` is the production implementation.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, job: &EncodeJob) -> EditronResult<()>;
}

/// The pipeline's sole output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedArtifact {
    pub path: PathBuf,
    pub duration_sec: f64,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone)]
pub struct VideoRenderer {
    encoder: Arc<dyn Encoder>,
}

impl VideoRenderer {
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        Self { encoder }
    }

    /// Build the encode job for `plan` without running it.
    pub fn build_job(&self, plan: &CompositionPlan, output: &Path) -> EditronResult<EncodeJob> {
        let job = match plan.kind {
            PlanKind::Cinematic => cinematic_job(plan, output),
            PlanKind::Slideshow => slideshow_job(plan, output),
        };
        job.graph.validate()?;
        Ok(job)
    }

    /// Encode `plan` into `output`. The plan is consumed.
    pub async fn render(
        &self,
        plan: CompositionPlan,
        output: &Path,
    ) -> EditronResult<RenderedArtifact> {
        let job = self.build_job(&plan, output)?;
        self.encoder.encode(&job).await?;

        let artifact = RenderedArtifact {
            path: output.to_path_buf(),
            duration_sec: plan.duration_sec(),
            width: plan.settings.width,
            height: plan.settings.height,
        };
        info!(
            kind = ?plan.kind,
            frames = plan.frames.len(),
            audio_tracks = plan.audio_tracks.len(),
            duration_sec = artifact.duration_sec,
            output = %artifact.path.display(),
            "render complete"
        );
        Ok(artifact)
    }
}

fn scale_pad_all(plan: &CompositionPlan, graph: &mut FilterGraph) -> Vec<String> {
    let settings = &plan.settings;
    (0..plan.frames.len())
        .map(|i| {
            graph.push(
                vec![format!("{i}:v")],
                FilterOp::ScalePad {
                    width: settings.width,
                    height: settings.height,
                    fps: settings.fps,
                    pixel_format: settings.pixel_format.clone(),
                },
                format!("v{i}"),
            )
        })
        .collect()
}

fn cinematic_job(plan: &CompositionPlan, output: &Path) -> EncodeJob {
    let settings = &plan.settings;
    let segment = plan.segment_duration();

    let mut inputs: Vec<EncodeInput> = plan
        .frames
        .iter()
        .map(|frame| EncodeInput::still(frame.clone(), segment))
        .collect();

    let mut graph = FilterGraph::new();
    let scaled = scale_pad_all(plan, &mut graph);

    let mut video = scaled[0].clone();
    for (k, (next, transition)) in scaled.iter().skip(1).zip(&plan.transitions).enumerate() {
        let Transition::Crossfade {
            offset_sec,
            duration_sec,
        } = *transition;
        video = graph.push(
            vec![video, next.clone()],
            FilterOp::Crossfade {
                duration: duration_sec,
                offset: offset_sec,
            },
            format!("x{}", k + 1),
        );
    }

    if let Some(subtitles) = &plan.subtitle_path {
        video = graph.push(
            vec![video],
            FilterOp::SubtitleBurn {
                path: escape_filter_path(subtitles),
            },
            "vsub",
        );
    }

    // Voice first so that `duration=first` follows the narration.
    let mut filtered = Vec::new();
    let mut weights = Vec::new();
    for kind in [AudioKind::Voice, AudioKind::Music] {
        let Some(track) = plan.track(kind) else {
            continue;
        };
        let index = inputs.len();
        inputs.push(EncodeInput::audio(track.path.clone(), kind == AudioKind::Music));
        let label = match kind {
            AudioKind::Voice => "avoice",
            AudioKind::Music => "amusic",
        };
        filtered.push(graph.push(
            vec![format!("{index}:a")],
            FilterOp::BandPass {
                low_hz: track.bandpass.low_hz,
                high_hz: track.bandpass.high_hz,
            },
            label,
        ));
        weights.push(track.mix_weight());
    }

    let audio = match filtered.len() {
        0 => None,
        1 => Some(filtered.remove(0)),
        _ => Some(graph.push(filtered, FilterOp::Mix { weights }, "amixed")),
    };
    let audio = audio.map(|label| {
        graph.push(
            vec![label],
            FilterOp::Resample {
                sample_rate: settings.audio_sample_rate,
            },
            "aout",
        )
    });

    let mut options = vec!["-map".to_string(), format!("[{video}]")];
    if let Some(audio) = &audio {
        options.extend(["-map".to_string(), format!("[{audio}]")]);
    }
    options.extend([
        "-r".into(),
        settings.fps.to_string(),
        "-pix_fmt".into(),
        settings.pixel_format.clone(),
        "-c:v".into(),
        settings.video_codec.ffmpeg_codec().into(),
        "-crf".into(),
        settings.crf.to_string(),
        "-preset".into(),
        settings.preset.clone(),
    ]);
    if audio.is_some() {
        options.extend([
            "-c:a".into(),
            settings.audio_codec.ffmpeg_codec().into(),
            "-ar".into(),
            settings.audio_sample_rate.to_string(),
        ]);
    } else {
        options.push("-an".into());
    }
    options.extend([
        "-t".into(),
        format!("{:.3}", plan.duration_sec()),
        "-movflags".into(),
        "+faststart".into(),
    ]);

    EncodeJob {
        inputs,
        graph,
        output_options: options,
        output: output.to_path_buf(),
    }
}

fn slideshow_job(plan: &CompositionPlan, output: &Path) -> EncodeJob {
    let settings = &plan.settings;
    let inputs = plan
        .frames
        .iter()
        .map(|frame| EncodeInput::still(frame.clone(), settings.frame_duration_sec))
        .collect();

    let mut graph = FilterGraph::new();
    let scaled = scale_pad_all(plan, &mut graph);
    let segments = scaled.len();
    let video = graph.push(scaled, FilterOp::Concat { segments }, "vout");

    let output_options = vec![
        "-map".into(),
        format!("[{video}]"),
        "-r".into(),
        settings.fps.to_string(),
        "-pix_fmt".into(),
        settings.pixel_format.clone(),
        "-c:v".into(),
        settings.video_codec.ffmpeg_codec().into(),
        "-an".into(),
        "-t".into(),
        format!("{:.3}", plan.duration_sec()),
        "-movflags".into(),
        "+faststart".into(),
    ];

    EncodeJob {
        inputs,
        graph,
        output_options,
        output: output.to_path_buf(),
    }
}
