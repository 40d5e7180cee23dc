use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use log::debug;

use super::error::TransferError;
use super::{ContentStore, RemoteKey};
use crate::sanitize;

/// Content store backed by a local directory, for services that read
/// artifacts from a shared mount.
pub struct FilesystemContentStore {
    root: PathBuf,
}

impl FilesystemContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Keys map to relative paths under the root; anything that would
    /// escape it is rejected.
    pub fn path_for(&self, key: &RemoteKey) -> Result<PathBuf, TransferError> {
        let relative = Path::new(key.as_str());
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || key.as_str().is_empty() {
            return Err(TransferError::InvalidArtifact(relative.to_path_buf()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ContentStore for FilesystemContentStore {
    async fn put(&self, local_path: &Path, key: &RemoteKey) -> Result<(), TransferError> {
        let target = self.path_for(key)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::Transport {
                    message: format!("Failed to create '{}': {}", parent.display(), e),
                    transient: false,
                })?;
        }

        tokio::fs::copy(local_path, &target)
            .await
            .map_err(|e| TransferError::ReadArtifact {
                path: local_path.to_path_buf(),
                source: e,
            })?;

        debug!(
            "Stored {} as {}",
            sanitize::redact_path(local_path),
            key
        );
        Ok(())
    }
}
