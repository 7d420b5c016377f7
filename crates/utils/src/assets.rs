use std::{env, io, path::PathBuf};

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");
const ASSET_DIR_ENV: &str = "DRAMAREEL_ASSET_DIR";
const WORK_DIR_ENV: &str = "DRAMAREEL_WORK_DIR";

/// Layout of the static asset directory
/// ```text
/// assets/
/// └── audio/
///     ├── theme.mp3            # default music bed, also the static narration fallback
///     ├── fantasy-theme.mp3
///     ├── comedy-theme.mp3
///     └── epic-theme.mp3
/// ```
pub mod asset_structure {
    pub const AUDIO_DIR: &str = "audio";
    pub const DEFAULT_THEME: &str = "theme.mp3";
}

/// Root of the static assets (music beds, fallback narration).
///
/// `DRAMAREEL_ASSET_DIR` wins; debug builds use the in-repo `assets/` folder,
/// release builds the platform data directory.
pub fn asset_dir() -> io::Result<PathBuf> {
    let path = if let Ok(custom_dir) = env::var(ASSET_DIR_ENV) {
        PathBuf::from(custom_dir)
    } else if cfg!(debug_assertions) {
        PathBuf::from(PROJECT_ROOT).join("../../assets")
    } else {
        ProjectDirs::from("studio", "drama", "dramareel")
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory"))?
            .data_dir()
            .to_path_buf()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path)?;
    }

    Ok(path)
}

pub fn audio_dir() -> io::Result<PathBuf> {
    Ok(asset_dir()?.join(asset_structure::AUDIO_DIR))
}

/// Scratch directory for per-episode intermediates.
pub fn default_work_dir() -> PathBuf {
    env::var(WORK_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("dramareel"))
}
