use thiserror::Error;

use super::summary::FileStatus;
use crate::error::{RepairError, StorageError};
use crate::recognition::RemoteError;

/// Why a document left the pipeline early. Each variant maps to exactly one
/// terminal [`FileStatus`].
#[derive(Error, Debug)]
pub enum StageError {
    #[error("{0}")]
    Repair(#[from] RepairError),

    #[error("{0}")]
    Remote(#[from] RemoteError),

    #[error("{0}")]
    Unexpected(String),
}

impl StageError {
    pub fn status(&self) -> FileStatus {
        match self {
            StageError::Repair(_) => FileStatus::RepairFailed,
            StageError::Remote(_) => FileStatus::TextractFailed,
            StageError::Unexpected(_) => FileStatus::UnexpectedError,
        }
    }
}

impl From<StorageError> for StageError {
    fn from(e: StorageError) -> Self {
        StageError::Unexpected(format!("Failed to persist results: {}", e))
    }
}

impl From<tokio::task::JoinError> for StageError {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_panic() {
            StageError::Unexpected(format!("Processing task panicked: {}", e))
        } else {
            StageError::Unexpected(format!("Processing task cancelled: {}", e))
        }
    }
}
