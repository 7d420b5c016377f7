//! Background music selection by series tone

use std::path::PathBuf;

use tracing::{debug, warn};
use utils::{assets::asset_structure, Tone};

/// Picks a music bed from a local audio directory.
#[derive(Debug, Clone)]
pub struct MusicSelector {
    audio_dir: PathBuf,
}

impl MusicSelector {
    pub fn new(audio_dir: impl Into<PathBuf>) -> Self {
        Self {
            audio_dir: audio_dir.into(),
        }
    }

    /// Dedicated track file name for a tone, if the tone has one.
    pub fn track_name(tone: &Tone) -> Option<&'static str> {
        match tone {
            Tone::Fantasy => Some("fantasy-theme.mp3"),
            Tone::Comedy => Some("comedy-theme.mp3"),
            Tone::Epic => Some("epic-theme.mp3"),
            Tone::Other(_) => None,
        }
    }

    /// Tone track, else the default track, else `None`.
    pub fn select(&self, tone: &Tone) -> Option<PathBuf> {
        if let Some(name) = Self::track_name(tone) {
            let path = self.audio_dir.join(name);
            if path.is_file() {
                debug!(tone = %tone, track = %path.display(), "music selected");
                return Some(path);
            }
        }

        let default = self.audio_dir.join(asset_structure::DEFAULT_THEME);
        if default.is_file() {
            debug!(tone = %tone, track = %default.display(), "default music selected");
            Some(default)
        } else {
            warn!(
                stage = "select_music",
                tone = %tone,
                dir = %self.audio_dir.display(),
                "no music asset available"
            );
            None
        }
    }
}
