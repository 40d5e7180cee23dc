use std::path::PathBuf;

use thiserror::Error;

/// Implemented by remote-stage errors so the client can decide whether a
/// failed call is worth repeating.
pub trait RetryableError {
    fn is_transient(&self) -> bool;
}

/// Rate limiting, request timeouts and server-side faults clear up on their own.
pub fn status_is_transient(status: u16) -> bool {
    status == 408 || status == 429 || status >= 500
}

/// The artifact could not be placed in the content store.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Failed to read artifact '{path}': {source}")]
    ReadArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact path has no usable file name: {0}")]
    InvalidArtifact(PathBuf),

    #[error("Upload transport error: {message}")]
    Transport { message: String, transient: bool },

    #[error("Upload rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl RetryableError for TransferError {
    fn is_transient(&self) -> bool {
        match self {
            TransferError::Transport { transient, .. } => *transient,
            TransferError::Rejected { status, .. } => status_is_transient(*status),
            TransferError::ReadArtifact { .. } | TransferError::InvalidArtifact(_) => false,
        }
    }
}

/// The remote service did not accept the text-detection request.
#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Submission transport error: {message}")]
    Transport { message: String, transient: bool },

    #[error("Submission rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid submission response: {0}")]
    InvalidResponse(String),
}

impl RetryableError for SubmissionError {
    fn is_transient(&self) -> bool {
        match self {
            SubmissionError::Transport { transient, .. } => *transient,
            SubmissionError::Rejected { status, .. } => status_is_transient(*status),
            SubmissionError::InvalidResponse(_) => false,
        }
    }
}

/// The job could not be driven to a successful result.
#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("Status request transport error: {message}")]
    Transport { message: String, transient: bool },

    #[error("Status request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid status response: {0}")]
    InvalidResponse(String),

    #[error("Recognition job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("Recognition job {job_id} still in progress after {attempts} polls")]
    Timeout { job_id: String, attempts: u32 },

    #[error("Recognition job {job_id} repeated continuation token '{token}'")]
    PaginationLoop { job_id: String, token: String },
}

impl RetryableError for RecognitionError {
    fn is_transient(&self) -> bool {
        match self {
            RecognitionError::Transport { transient, .. } => *transient,
            RecognitionError::Rejected { status, .. } => status_is_transient(*status),
            RecognitionError::InvalidResponse(_)
            | RecognitionError::JobFailed { .. }
            | RecognitionError::Timeout { .. }
            | RecognitionError::PaginationLoop { .. } => false,
        }
    }
}

/// Any failure between upload and the final result page. Operators handle
/// all three the same way: check service health, credentials and quota.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(String),
}
