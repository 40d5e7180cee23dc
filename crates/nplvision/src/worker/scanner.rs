use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use log::{debug, info};
use walkdir::WalkDir;

use crate::error::{ConfigError, WorkerError};
use crate::sanitize;
use crate::worker::job::Job;

const DEFAULT_PATTERN: &str = "*.pdf";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

pub struct DirectoryScanner {
    input_directory: PathBuf,
    pattern: Pattern,
}

impl DirectoryScanner {
    /// Scans for `*.pdf` files.
    pub fn new<P: AsRef<Path>>(input_directory: P) -> Self {
        Self {
            input_directory: input_directory.as_ref().to_path_buf(),
            pattern: Pattern::new(DEFAULT_PATTERN).unwrap_or_default(),
        }
    }

    pub fn with_pattern<P: AsRef<Path>>(input_directory: P, pattern: &str) -> Result<Self, ConfigError> {
        let pattern = Pattern::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            input_directory: input_directory.as_ref().to_path_buf(),
            pattern,
        })
    }

    pub fn input_directory(&self) -> &Path {
        &self.input_directory
    }

    /// Top-level files whose name matches the pattern (case-insensitive),
    /// sorted by file name.
    pub fn scan(&self) -> Result<Vec<Job>, WorkerError> {
        if !self.input_directory.is_dir() {
            return Err(WorkerError::MissingInputDirectory(
                self.input_directory.clone(),
            ));
        }

        let mut jobs = Vec::new();

        for entry in WalkDir::new(&self.input_directory)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| WorkerError::ScanFailed {
                path: self.input_directory.clone(),
                source: e,
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let matches = entry
                .file_name()
                .to_str()
                .map(|name| self.pattern.matches_with(name, MATCH_OPTIONS))
                .unwrap_or(false);

            if matches {
                debug!("Found document: {}", sanitize::redact_path(entry.path()));
                jobs.push(Job::new(entry.into_path()));
            }
        }

        info!(
            "Scanned {} documents in {}",
            jobs.len(),
            self.input_directory.display()
        );
        Ok(jobs)
    }
}
