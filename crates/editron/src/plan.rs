//! Composition plans: what goes into one encode, before any filter syntax.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{AudioCodec, EditronError, EditronResult, VideoCodec};

/// Output encoding and timing settings shared by both render paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Seconds each frame is shown; subtitle windows use the same value.
    pub frame_duration_sec: f64,
    pub crossfade_sec: f64,
    pub video_codec: VideoCodec,
    pub audio_codec: AudioCodec,
    pub crf: u8,
    pub preset: String,
    pub pixel_format: String,
    pub audio_sample_rate: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            frame_duration_sec: 3.0,
            crossfade_sec: 0.5,
            video_codec: VideoCodec::H264,
            audio_codec: AudioCodec::Aac,
            crf: 18,
            preset: "slow".into(),
            pixel_format: "yuv420p".into(),
            audio_sample_rate: 44_100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioKind {
    Voice,
    Music,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandPass {
    pub low_hz: u32,
    pub high_hz: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub kind: AudioKind,
    pub path: PathBuf,
    pub gain_db: f64,
    pub bandpass: BandPass,
}

impl AudioTrack {
    /// Narration: full level, speech band.
    pub fn voice(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: AudioKind::Voice,
            path: path.into(),
            gain_db: 0.0,
            bandpass: BandPass {
                low_hz: 100,
                high_hz: 8000,
            },
        }
    }

    /// Music bed: attenuated under the voice.
    pub fn music(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: AudioKind::Music,
            path: path.into(),
            gain_db: -10.0,
            bandpass: BandPass {
                low_hz: 40,
                high_hz: 12000,
            },
        }
    }

    /// Linear mix weight for `gain_db`.
    pub fn mix_weight(&self) -> f64 {
        10f64.powf(self.gain_db / 20.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Transition {
    Crossfade { offset_sec: f64, duration_sec: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanKind {
    Cinematic,
    Slideshow,
}

/// Immutable description of one render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionPlan {
    pub kind: PlanKind,
    pub frames: Vec<PathBuf>,
    pub transitions: Vec<Transition>,
    pub audio_tracks: Vec<AudioTrack>,
    pub subtitle_path: Option<PathBuf>,
    pub settings: RenderSettings,
}

impl CompositionPlan {
    /// Length of each looped still input.
    pub fn segment_duration(&self) -> f64 {
        match self.kind {
            PlanKind::Cinematic if self.frames.len() > 1 => {
                self.settings.frame_duration_sec + self.settings.crossfade_sec
            }
            _ => self.settings.frame_duration_sec,
        }
    }

    /// Duration of the encoded video.
    pub fn duration_sec(&self) -> f64 {
        let n = self.frames.len() as f64;
        match self.kind {
            PlanKind::Cinematic if self.frames.len() > 1 => {
                n * self.settings.frame_duration_sec + self.settings.crossfade_sec
            }
            _ => n * self.settings.frame_duration_sec,
        }
    }

    pub fn track(&self, kind: AudioKind) -> Option<&AudioTrack> {
        self.audio_tracks.iter().find(|t| t.kind == kind)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompositionPlanner {
    settings: RenderSettings,
}

impl CompositionPlanner {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    fn check_frames(&self, frames: &[PathBuf]) -> EditronResult<()> {
        if frames.is_empty() {
            return Err(EditronError::InvalidPlan("no frames to render".into()));
        }
        if self.settings.frame_duration_sec <= 0.0 {
            return Err(EditronError::InvalidPlan(
                "frame duration must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Crossfaded frames, voice and music, burned subtitles.
    pub fn cinematic(
        &self,
        frames: Vec<PathBuf>,
        voice: Option<PathBuf>,
        music: Option<PathBuf>,
        subtitle_path: Option<PathBuf>,
    ) -> EditronResult<CompositionPlan> {
        self.check_frames(&frames)?;
        if self.settings.crossfade_sec < 0.0
            || self.settings.crossfade_sec >= self.settings.frame_duration_sec
        {
            return Err(EditronError::InvalidPlan(
                "crossfade must be shorter than the frame duration".into(),
            ));
        }

        // Crossfade k (1-based) starts at k*d, the cumulative display time of
        // the frames before it.
        let transitions = (1..frames.len())
            .map(|k| Transition::Crossfade {
                offset_sec: k as f64 * self.settings.frame_duration_sec,
                duration_sec: self.settings.crossfade_sec,
            })
            .collect();

        let audio_tracks = voice
            .map(AudioTrack::voice)
            .into_iter()
            .chain(music.map(AudioTrack::music))
            .collect();

        Ok(CompositionPlan {
            kind: PlanKind::Cinematic,
            frames,
            transitions,
            audio_tracks,
            subtitle_path,
            settings: self.settings.clone(),
        })
    }

    /// Plain frames at a fixed duration: no transitions, audio or subtitles.
    pub fn slideshow(&self, frames: Vec<PathBuf>) -> EditronResult<CompositionPlan> {
        self.check_frames(&frames)?;
        Ok(CompositionPlan {
            kind: PlanKind::Slideshow,
            frames,
            transitions: Vec::new(),
            audio_tracks: Vec::new(),
            subtitle_path: None,
            settings: self.settings.clone(),
        })
    }
}
