use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, StreamExt};
use log::{error, info};

use crate::error::NplError;
use crate::pipeline::{
    BatchSummary, FileRecord, Pipeline, ProgressEvent, ProgressReporter, StageError,
};
use crate::worker::job::{assign_unique_stems, Job};
use crate::worker::scanner::DirectoryScanner;

/// Runs a batch of documents through the pipeline with bounded parallelism.
pub struct BatchRunner {
    pipeline: Arc<Pipeline>,
    worker_count: usize,
    summary_directory: PathBuf,
}

impl BatchRunner {
    /// `worker_count` of 1 processes documents strictly one after another.
    pub fn new(pipeline: Arc<Pipeline>, worker_count: usize, summary_directory: PathBuf) -> Self {
        Self {
            pipeline,
            worker_count: worker_count.max(1),
            summary_directory,
        }
    }

    pub fn from_pipeline(pipeline: Arc<Pipeline>) -> Self {
        let worker_count = pipeline.config().worker_count;
        let summary_directory = pipeline.config().summary_directory.clone();
        Self::new(pipeline, worker_count, summary_directory)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Processes every job and returns the finished summary. Always yields
    /// one record per job, whatever happens to individual documents.
    ///
    /// Jobs whose artifact names would collide are renamed first, so no two
    /// documents share an optimized PDF, remote key or result bundle.
    pub async fn run(&self, mut jobs: Vec<Job>, progress: Arc<dyn ProgressReporter>) -> BatchSummary {
        assign_unique_stems(&mut jobs);
        let total = jobs.len();
        let mut summary = BatchSummary::new();
        info!(
            "Processing {} documents with {} workers",
            total, self.worker_count
        );

        let mut records = stream::iter(jobs.into_iter().map(|job| {
            let pipeline = Arc::clone(&self.pipeline);
            let progress = Arc::clone(&progress);
            run_isolated(pipeline, job, progress)
        }))
        .buffer_unordered(self.worker_count);

        while let Some(record) = records.next().await {
            let filename = record.filename.clone();
            let status = record.status;
            summary.record(record);
            progress.report(ProgressEvent::Finished {
                filename,
                status,
                completed: summary.total_files,
                total,
            });
        }

        summary.finish();
        info!(
            "Batch complete: {} succeeded, {} repair failures, {} recognition failures, {} unexpected errors in {:.1}s",
            summary.successful,
            summary.repair_failures,
            summary.textract_failures,
            summary.unexpected_errors,
            summary.total_processing_time
        );
        summary
    }

    /// Scans the input directory, runs every document found and saves the
    /// summary. Returns the summary and where it was written.
    pub async fn run_directory(
        &self,
        scanner: &DirectoryScanner,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<(BatchSummary, PathBuf), NplError> {
        let jobs = scanner.scan()?;
        let summary = self.run(jobs, progress).await;
        let path = summary.save(&self.summary_directory)?;
        Ok((summary, path))
    }
}

/// Each document gets its own task, so a panic anywhere in its processing
/// becomes an `unexpected_error` record instead of tearing down the batch.
async fn run_isolated(
    pipeline: Arc<Pipeline>,
    job: Job,
    progress: Arc<dyn ProgressReporter>,
) -> FileRecord {
    let filename = job.filename();
    let started = Instant::now();

    let handle = tokio::spawn(async move { pipeline.process_document(&job, progress.as_ref()).await });

    match handle.await {
        Ok(record) => record,
        Err(e) => {
            error!("Processing task for {} aborted: {}", filename, e);
            FileRecord::pending(filename).failed(&StageError::from(e), started.elapsed())
        }
    }
}
