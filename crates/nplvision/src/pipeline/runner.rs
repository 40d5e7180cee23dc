use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, info_span, warn, Instrument};

use crate::error::NplError;
use crate::optimizer::{OptimizedDocument, Optimizer};
use crate::recognition::{
    ContentStore, FilesystemContentStore, HttpContentStore, HttpRecognitionService,
    RecognitionClient, RecognitionResult, RemoteError,
};
use crate::sanitize;
use crate::secrets::resolve_credentials;
use crate::storage::{optimized_path_for, ResultStorage};
use crate::worker::Job;

use super::config::PipelineConfig;
use super::error::StageError;
use super::progress::{ProgressEvent, ProgressReporter, Stage};
use super::summary::FileRecord;

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    optimizer: Arc<Optimizer>,
    client: RecognitionClient,
    storage: ResultStorage,
}

impl Pipeline {
    /// Production constructor: poppler rasterization and the HTTP remote
    /// capabilities, with tokens resolved from their configured sources. A
    /// `file://` storage endpoint stores artifacts in that directory instead.
    pub fn from_config(config: Arc<PipelineConfig>) -> Result<Self, NplError> {
        let optimizer = Optimizer::new(config.optimizer.clone());

        let store_token = resolve_credentials(&config.content_store.credentials)?;
        let service_token = resolve_credentials(&config.recognition_service.credentials)?;

        let store: Arc<dyn ContentStore> =
            match config.content_store.endpoint.strip_prefix("file://") {
                Some(root) => Arc::new(FilesystemContentStore::new(root)),
                None => Arc::new(HttpContentStore::new(
                    &config.content_store.endpoint,
                    &config.content_store.bucket,
                    store_token,
                )?),
            };
        let service = HttpRecognitionService::new(
            &config.recognition_service.endpoint,
            &config.content_store.bucket,
            service_token,
        )?;
        info!(
            "Remote recognition via {} (content store {})",
            sanitize::redact_url(&config.recognition_service.endpoint),
            sanitize::redact_url(&config.content_store.endpoint)
        );

        let client = RecognitionClient::new(
            store,
            Arc::new(service),
            config.recognition.clone(),
        );
        let storage = ResultStorage::new(&config.output_directory);

        Ok(Self::new(config, optimizer, client, storage))
    }

    /// Inject specific components, e.g. a stub rasterizer or scripted service.
    pub fn new(
        config: Arc<PipelineConfig>,
        optimizer: Optimizer,
        client: RecognitionClient,
        storage: ResultStorage,
    ) -> Self {
        Self {
            config,
            optimizer: Arc::new(optimizer),
            client,
            storage,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs one document to a terminal state. Never fails: every error is
    /// captured in the returned record.
    pub async fn process_document(&self, job: &Job, progress: &dyn ProgressReporter) -> FileRecord {
        let started = Instant::now();
        let mut record = FileRecord::pending(job.filename());

        let span = info_span!("pipeline",
            job_id = %job.id,
            filename = %sanitize::redact_path(&job.source_path),
        );

        let outcome = self
            .run_stages(job, &mut record, progress)
            .instrument(span.clone())
            .await;

        span.in_scope(|| match outcome {
            Ok(output_path) => {
                let record = record.succeeded(&output_path, started.elapsed());
                info!("Processed in {:.1}s", record.processing_time);
                record
            }
            Err(e) => {
                let record = record.failed(&e, started.elapsed());
                warn!("Finished as {:?}: {}", record.status, e);
                record
            }
        })
    }

    async fn run_stages(
        &self,
        job: &Job,
        record: &mut FileRecord,
        progress: &dyn ProgressReporter,
    ) -> Result<PathBuf, StageError> {
        let filename = job.filename();
        let report = |stage| {
            progress.report(ProgressEvent::Stage {
                filename: filename.clone(),
                stage,
            })
        };

        // Step 1: Optimize. A failure here ends the document before any
        // remote call.
        report(Stage::Optimize);
        let optimized = self.optimize(job).instrument(info_span!("optimize")).await?;
        record.set_optimized_path(&optimized.path);

        // Step 2: Remote recognition
        let result = self
            .recognize(&optimized, &report)
            .await
            .map_err(StageError::Remote)?;

        // Step 3: Persist
        report(Stage::Persist);
        let output_path = {
            let _step = info_span!("persist").entered();
            self.storage.write_bundle(job, &result)?
        };
        Ok(output_path)
    }

    /// Rasterization and image work are CPU-bound; keep them off the async
    /// workers.
    async fn optimize(&self, job: &Job) -> Result<OptimizedDocument, StageError> {
        let optimizer = Arc::clone(&self.optimizer);
        let source = job.source_path.clone();
        let destination = optimized_path_for(&self.config.optimized_directory, job.stem());
        let span = tracing::Span::current();

        let optimized = tokio::task::spawn_blocking(move || {
            let _enter = span.enter();
            optimizer.optimize(&source, &destination)
        })
        .await??;

        info!("Optimized {} pages", optimized.page_count());
        Ok(optimized)
    }

    async fn recognize(
        &self,
        optimized: &OptimizedDocument,
        report: &(dyn Fn(Stage) + Sync),
    ) -> Result<RecognitionResult, RemoteError> {
        report(Stage::Upload);
        let key = self
            .client
            .upload(&optimized.path)
            .instrument(info_span!("upload"))
            .await?;

        report(Stage::Submit);
        let job_id = self
            .client
            .submit(&key)
            .instrument(info_span!("submit"))
            .await?;

        report(Stage::AwaitCompletion);
        let result = self
            .client
            .await_completion(&job_id)
            .instrument(info_span!("await_completion", job_id = %job_id))
            .await?;

        Ok(result)
    }
}
