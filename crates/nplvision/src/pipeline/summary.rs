//! Per-document records and the batch audit log.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use log::info;
use serde::{Deserialize, Serialize};

use super::error::StageError;
use crate::error::StorageError;
use crate::storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Success,
    /// Local optimization failed; nothing was sent to the remote service.
    RepairFailed,
    /// Upload, submission or recognition failed.
    TextractFailed,
    UnexpectedError,
}

impl FileStatus {
    pub fn is_terminal(self) -> bool {
        self != FileStatus::Pending
    }
}

/// Outcome of one source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub filename: String,
    pub status: FileStatus,
    pub error: Option<String>,
    pub optimized_path: Option<String>,
    pub output_path: Option<String>,
    /// Seconds.
    pub processing_time: f64,
}

impl FileRecord {
    pub fn pending(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::Pending,
            error: None,
            optimized_path: None,
            output_path: None,
            processing_time: 0.0,
        }
    }

    pub fn set_optimized_path(&mut self, path: &Path) {
        self.optimized_path = Some(path.display().to_string());
    }

    pub fn succeeded(mut self, output_path: &Path, elapsed: Duration) -> Self {
        self.status = FileStatus::Success;
        self.output_path = Some(output_path.display().to_string());
        self.processing_time = elapsed.as_secs_f64();
        self
    }

    pub fn failed(mut self, error: &StageError, elapsed: Duration) -> Self {
        self.status = error.status();
        self.error = Some(error.to_string());
        self.output_path = None;
        self.processing_time = elapsed.as_secs_f64();
        self
    }
}

/// Audit log of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub pipeline_start: DateTime<Local>,
    pub pipeline_end: Option<DateTime<Local>>,
    pub total_files: usize,
    pub successful: usize,
    pub repair_failures: usize,
    pub textract_failures: usize,
    #[serde(default)]
    pub unexpected_errors: usize,
    /// Wall-clock seconds from start to end of the batch.
    pub total_processing_time: f64,
    pub files: Vec<FileRecord>,
}

impl BatchSummary {
    pub fn new() -> Self {
        Self::started_at(Local::now())
    }

    pub fn started_at(pipeline_start: DateTime<Local>) -> Self {
        Self {
            pipeline_start,
            pipeline_end: None,
            total_files: 0,
            successful: 0,
            repair_failures: 0,
            textract_failures: 0,
            unexpected_errors: 0,
            total_processing_time: 0.0,
            files: Vec::new(),
        }
    }

    pub fn record(&mut self, record: FileRecord) {
        match record.status {
            FileStatus::Success => self.successful += 1,
            FileStatus::RepairFailed => self.repair_failures += 1,
            FileStatus::TextractFailed => self.textract_failures += 1,
            FileStatus::UnexpectedError => self.unexpected_errors += 1,
            FileStatus::Pending => {}
        }
        self.total_files += 1;
        self.files.push(record);
    }

    pub fn finish(&mut self) {
        self.finish_at(Local::now());
    }

    pub fn finish_at(&mut self, pipeline_end: DateTime<Local>) {
        let elapsed = pipeline_end.signed_duration_since(self.pipeline_start);
        self.total_processing_time = elapsed
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        self.pipeline_end = Some(pipeline_end);
    }

    pub fn failed(&self) -> usize {
        self.repair_failures + self.textract_failures + self.unexpected_errors
    }

    /// `pipeline_log_<YYYYmmdd_HHMMSS>.json`, stamped with the batch start.
    pub fn file_name(&self) -> String {
        format!(
            "pipeline_log_{}.json",
            self.pipeline_start.format("%Y%m%d_%H%M%S")
        )
    }

    /// Writes the audit log into `directory`. A log already there for the
    /// same second is kept; this one gets a `_1`, `_2`, ... suffix.
    pub fn save(&self, directory: &Path) -> Result<PathBuf, StorageError> {
        let stamp = self.pipeline_start.format("%Y%m%d_%H%M%S").to_string();
        let path = storage::write_json_new(directory, self, |attempt| match attempt {
            0 => self.file_name(),
            n => format!("pipeline_log_{}_{}.json", stamp, n),
        })?;
        info!("Batch summary written to {}", path.display());
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self, StorageError> {
        storage::read_json(path)
    }
}

impl Default for BatchSummary {
    fn default() -> Self {
        Self::new()
    }
}
