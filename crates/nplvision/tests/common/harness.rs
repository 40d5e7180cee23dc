//! Test harness for isolated batch runs.
//!
//! The `TestHarness` struct provides a complete isolated environment for
//! exercising the ingestion pipeline, including:
//! - Temporary input, optimized, output, summary and scratch directories
//! - A real `Optimizer` driven by the stub rasterizer
//! - Pipeline and batch runner wiring around injected remote stubs

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use nplvision::config::{CredentialSettings, RecognitionSettings, RetrySettings, StorageSettings};
use nplvision::optimizer::{Optimizer, OptimizerConfig};
use nplvision::recognition::{
    ContentStore, RecognitionClient, RecognitionConfig, RecognitionService, RetryPolicy,
};
use nplvision::storage::ResultStorage;
use nplvision::{BatchRunner, DirectoryScanner, Pipeline, PipelineConfig};

use super::stubs::StubRasterizer;

/// Test harness providing isolated execution environment for integration tests.
pub struct TestHarness {
    /// Temporary directory containing every working directory.
    temp_dir: TempDir,
    pub input_dir: PathBuf,
    pub optimized_dir: PathBuf,
    pub output_dir: PathBuf,
    pub summary_dir: PathBuf,
    pub scratch_dir: PathBuf,
    /// Documents processed concurrently.
    pub worker_count: usize,
    /// In-progress polls tolerated before a job times out.
    pub max_poll_attempts: u32,
}

impl TestHarness {
    /// Create a new test harness processing one document at a time.
    pub fn new() -> Self {
        Self::with_workers(1)
    }

    pub fn with_workers(worker_count: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let input_dir = base.join("incoming");
        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");

        Self {
            input_dir,
            optimized_dir: base.join("ocr_optimized_pdfs"),
            output_dir: base.join("ocr_results"),
            summary_dir: base.join("logs"),
            scratch_dir: base.join("scratch"),
            temp_dir,
            worker_count,
            max_poll_attempts: 5,
        }
    }

    /// Get the base temp directory path.
    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a source document that the stub rasterizer renders as `pages` pages.
    pub fn write_document(&self, filename: &str, pages: usize) -> PathBuf {
        self.write_input(filename, &format!("pages:{}", pages))
    }

    /// Write a source document the stub rasterizer cannot read.
    pub fn write_corrupt_document(&self, filename: &str) -> PathBuf {
        self.write_input(filename, "%PDF-1.4 truncated")
    }

    /// Write a source document that makes the stub rasterizer panic.
    pub fn write_panicking_document(&self, filename: &str) -> PathBuf {
        self.write_input(filename, "panic")
    }

    pub fn write_input(&self, filename: &str, content: &str) -> PathBuf {
        let path = self.input_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            input_directory: self.input_dir.clone(),
            input_pattern: "*.pdf".to_string(),
            optimized_directory: self.optimized_dir.clone(),
            output_directory: self.output_dir.clone(),
            summary_directory: self.summary_dir.clone(),
            worker_count: self.worker_count,
            optimizer: OptimizerConfig {
                scratch_root: Some(self.scratch_dir.clone()),
                ..OptimizerConfig::quality()
            },
            recognition: RecognitionConfig {
                key_prefix: "uploads/".to_string(),
                poll_interval: Duration::from_secs(5),
                max_poll_attempts: self.max_poll_attempts,
                retry: RetryPolicy::none(),
            },
            recognition_service: RecognitionSettings {
                endpoint: "http://localhost:9".to_string(),
                credentials: CredentialSettings::default(),
                poll_interval_secs: 5,
                max_poll_attempts: self.max_poll_attempts,
                key_prefix: "uploads/".to_string(),
                retry: RetrySettings::default(),
            },
            content_store: StorageSettings {
                endpoint: "http://localhost:9".to_string(),
                bucket: "test-bucket".to_string(),
                credentials: CredentialSettings::default(),
            },
        }
    }

    /// Pipeline with a real optimizer over the stub rasterizer and the given
    /// remote stubs.
    pub fn pipeline(
        &self,
        rasterizer: Arc<StubRasterizer>,
        store: Arc<dyn ContentStore>,
        service: Arc<dyn RecognitionService>,
    ) -> Arc<Pipeline> {
        let config = Arc::new(self.pipeline_config());
        let optimizer = Optimizer::with_rasterizer(config.optimizer.clone(), rasterizer);
        let client = RecognitionClient::new(store, service, config.recognition.clone());
        let storage = ResultStorage::new(&config.output_directory);
        Arc::new(Pipeline::new(config, optimizer, client, storage))
    }

    pub fn runner(
        &self,
        rasterizer: Arc<StubRasterizer>,
        store: Arc<dyn ContentStore>,
        service: Arc<dyn RecognitionService>,
    ) -> BatchRunner {
        BatchRunner::from_pipeline(self.pipeline(rasterizer, store, service))
    }

    pub fn scanner(&self) -> DirectoryScanner {
        DirectoryScanner::new(&self.input_dir)
    }

    /// Files left behind in the scratch root.
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(&self.scratch_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    pub fn summary_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.summary_dir)
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default()
    }
}
