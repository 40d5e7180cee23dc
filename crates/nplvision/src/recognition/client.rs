//! Upload, submit and await: the remote half of processing one document.

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use super::error::{RecognitionError, RetryableError, SubmissionError, TransferError};
use super::{ContentStore, JobId, JobStatus, RecognitionResult, RecognitionService, RemoteKey, ResultPage};
use crate::config::{RecognitionSettings, RetrySettings};

/// Exponential backoff for transient remote failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls including the first one. 1 disables retries.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
        }
    }

    /// Delay after the `attempt`-th failed call (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    /// Prepended to the artifact file name to form the remote key.
    pub key_prefix: String,
    pub poll_interval: Duration,
    /// In-progress responses tolerated before the job is reported as timed out.
    pub max_poll_attempts: u32,
    pub retry: RetryPolicy,
}

impl RecognitionConfig {
    pub fn from_settings(settings: &RecognitionSettings) -> Self {
        Self {
            key_prefix: settings.key_prefix.clone(),
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            max_poll_attempts: settings.max_poll_attempts,
            retry: RetryPolicy::from_settings(&settings.retry),
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            key_prefix: "uploads/".to_string(),
            poll_interval: Duration::from_secs(5),
            max_poll_attempts: 360,
            retry: RetryPolicy::default(),
        }
    }
}

/// Drives one document through upload, job submission and result collection.
///
/// Cheap to clone; every worker shares the same store and service.
#[derive(Clone)]
pub struct RecognitionClient {
    store: Arc<dyn ContentStore>,
    service: Arc<dyn RecognitionService>,
    config: RecognitionConfig,
}

impl RecognitionClient {
    pub fn new(
        store: Arc<dyn ContentStore>,
        service: Arc<dyn RecognitionService>,
        config: RecognitionConfig,
    ) -> Self {
        Self {
            store,
            service,
            config,
        }
    }

    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    /// `<key_prefix><file name>`. Uploading the same file twice targets the
    /// same key.
    pub fn remote_key_for(&self, artifact: &Path) -> Result<RemoteKey, TransferError> {
        let name = artifact
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TransferError::InvalidArtifact(artifact.to_path_buf()))?;
        Ok(RemoteKey::new(format!("{}{}", self.config.key_prefix, name)))
    }

    pub async fn upload(&self, artifact: &Path) -> Result<RemoteKey, TransferError> {
        let key = self.remote_key_for(artifact)?;
        with_retry(&self.config.retry, "upload", || self.store.put(artifact, &key)).await?;
        info!("Uploaded artifact as {}", key);
        Ok(key)
    }

    pub async fn submit(&self, key: &RemoteKey) -> Result<JobId, SubmissionError> {
        let job_id = with_retry(&self.config.retry, "submit", || {
            self.service.start_text_detection(key)
        })
        .await?;
        info!("Started text detection job {} for {}", job_id, key);
        Ok(job_id)
    }

    /// Polls until the job leaves `IN_PROGRESS`, then collects every result
    /// page by following continuation tokens from the first response.
    ///
    /// Only reads job state, so awaiting the same job again yields the same
    /// result without starting new work.
    pub async fn await_completion(&self, job_id: &JobId) -> Result<RecognitionResult, RecognitionError> {
        let mut in_progress = 0u32;

        let first = loop {
            let page = self.fetch(job_id, None).await?;
            match page.job_status {
                JobStatus::Succeeded => break page,
                JobStatus::Failed => {
                    return Err(RecognitionError::JobFailed {
                        job_id: job_id.to_string(),
                        message: page
                            .status_message
                            .unwrap_or_else(|| "no status message".to_string()),
                    });
                }
                JobStatus::InProgress => {
                    in_progress += 1;
                    if in_progress >= self.config.max_poll_attempts {
                        return Err(RecognitionError::Timeout {
                            job_id: job_id.to_string(),
                            attempts: in_progress,
                        });
                    }
                    debug!(
                        "Job {} in progress (poll {}), waiting {:?}",
                        job_id, in_progress, self.config.poll_interval
                    );
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        };

        let result = self.collect_pages(job_id, first).await?;
        info!(
            "Job {} succeeded with {} result pages",
            job_id,
            result.pages.len()
        );
        Ok(result)
    }

    /// Upload, submit and await in one call.
    pub async fn recognize(&self, artifact: &Path) -> Result<RecognitionResult, super::RemoteError> {
        let key = self.upload(artifact).await?;
        let job_id = self.submit(&key).await?;
        Ok(self.await_completion(&job_id).await?)
    }

    async fn collect_pages(
        &self,
        job_id: &JobId,
        first: ResultPage,
    ) -> Result<RecognitionResult, RecognitionError> {
        let mut seen = HashSet::new();
        let mut next = first.next_token.clone();
        let mut pages = vec![first];

        while let Some(token) = next {
            if !seen.insert(token.clone()) {
                return Err(RecognitionError::PaginationLoop {
                    job_id: job_id.to_string(),
                    token,
                });
            }

            let page = self.fetch(job_id, Some(&token)).await?;
            next = page.next_token.clone();
            pages.push(page);
        }

        Ok(RecognitionResult {
            job_id: job_id.clone(),
            pages,
        })
    }

    async fn fetch(
        &self,
        job_id: &JobId,
        next_token: Option<&str>,
    ) -> Result<ResultPage, RecognitionError> {
        with_retry(&self.config.retry, "status", || {
            self.service.get_text_detection(job_id, next_token)
        })
        .await
    }
}

/// Repeats `call` while it fails transiently and attempts remain.
/// Permanent errors are returned immediately.
async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + Display,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.backoff_for(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                    operation, attempt, policy.max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
