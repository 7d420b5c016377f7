//! Artifact storage contract: save bytes, get back an address.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid artifact name: {0}")]
    InvalidName(String),

    #[error("Source file not found: {0}")]
    SourceMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage collaborator. Addresses are opaque to the pipeline.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn save(&self, episode_id: &str, filename: &str, bytes: &[u8]) -> StorageResult<String>;

    async fn move_final(
        &self,
        episode_id: &str,
        tmp_path: &Path,
        filename: &str,
    ) -> StorageResult<String>;
}

/// Stores artifacts under `<root>/<episode_id>/<filename>` and addresses them
/// as `<base_url>/generated/<episode_id>/<filename>`.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
    base_url: String,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_url(&self, episode_id: &str, filename: &str) -> String {
        format!(
            "{}/generated/{}/{}",
            self.base_url.trim_end_matches('/'),
            episode_id,
            filename
        )
    }

    /// Local path an address resolves to.
    pub fn local_path(&self, episode_id: &str, filename: &str) -> PathBuf {
        self.root.join(episode_id).join(filename)
    }

    async fn ensure_episode_dir(&self, episode_id: &str) -> StorageResult<PathBuf> {
        validate_segment(episode_id)?;
        let dir = self.root.join(episode_id);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }
}

fn validate_segment(segment: &str) -> StorageResult<()> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains('/')
        || segment.contains('\\')
    {
        return Err(StorageError::InvalidName(segment.to_string()));
    }
    Ok(())
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn save(&self, episode_id: &str, filename: &str, bytes: &[u8]) -> StorageResult<String> {
        validate_segment(filename)?;
        let dir = self.ensure_episode_dir(episode_id).await?;
        fs::write(dir.join(filename), bytes).await?;
        tracing::debug!(episode_id, filename, bytes = bytes.len(), "artifact saved");
        Ok(self.public_url(episode_id, filename))
    }

    async fn move_final(
        &self,
        episode_id: &str,
        tmp_path: &Path,
        filename: &str,
    ) -> StorageResult<String> {
        validate_segment(filename)?;
        if !tmp_path.exists() {
            return Err(StorageError::SourceMissing(tmp_path.to_path_buf()));
        }
        let dir = self.ensure_episode_dir(episode_id).await?;
        let dest = dir.join(filename);
        if dest != tmp_path {
            fs::copy(tmp_path, &dest).await?;
        }
        tracing::debug!(episode_id, filename, "final artifact moved into place");
        Ok(self.public_url(episode_id, filename))
    }
}
