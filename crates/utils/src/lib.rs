//! Shared building blocks for the dramareel workspace: episode metadata,
//! the artifact storage contract and logging setup.

pub mod assets;
pub mod episode;
pub mod logging;
pub mod storage;

pub use episode::{ScriptMetadata, Tone};
pub use storage::{ArtifactStore, LocalArtifactStore, StorageError, StorageResult};
