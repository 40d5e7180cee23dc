use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::recognition::{PageText, RecognitionResult, ResultPage};
use crate::sanitize;
use crate::worker::Job;

/// Recognized text of one source document, as handed to the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    pub source_filename: String,
    pub job_id: String,
    /// Every recognized line, newline-joined.
    pub text: String,
    pub page_texts: Vec<PageText>,
    /// Raw result pages in continuation-token order.
    pub pages: Vec<ResultPage>,
}

impl ResultBundle {
    pub fn new(job: &Job, result: &RecognitionResult) -> Self {
        Self {
            source_filename: job.filename(),
            job_id: result.job_id.to_string(),
            text: result.text(),
            page_texts: result.page_texts(),
            pages: result.pages.clone(),
        }
    }
}

/// `<optimized_directory>/<stem>_optimized.pdf`
pub fn optimized_path_for(optimized_directory: &Path, stem: &str) -> PathBuf {
    optimized_directory.join(format!("{}_optimized.pdf", stem))
}

pub(crate) fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Serializes `value` into a temp file beside `path` and renames it into
/// place. Readers never see a half-written file.
pub(crate) fn write_json_atomically<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_directory(dir)?;

    let content = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Encode {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    temp.write_all(&content).map_err(|e| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    temp.persist(path).map_err(|e| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    Ok(())
}

/// Like [`write_json_atomically`] but never replaces an existing file: the
/// value lands at the first name from `name_for(0)`, `name_for(1)`, ... that
/// is still free in `dir`. Returns the path written.
pub(crate) fn write_json_new<T, F>(dir: &Path, value: &T, mut name_for: F) -> Result<PathBuf, StorageError>
where
    T: Serialize,
    F: FnMut(u32) -> String,
{
    ensure_directory(dir)?;

    let content = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Encode {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StorageError::WriteFile {
        path: dir.to_path_buf(),
        source: e,
    })?;
    temp.write_all(&content).map_err(|e| StorageError::WriteFile {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut attempt = 0;
    loop {
        let path = dir.join(name_for(attempt));
        match temp.persist_noclobber(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                temp = e.file;
                attempt += 1;
            }
            Err(e) => {
                return Err(StorageError::WriteFile {
                    path,
                    source: e.error,
                })
            }
        }
    }
}

pub(crate) fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, StorageError> {
    let content = std::fs::read(path).map_err(|e| StorageError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_slice(&content).map_err(|e| StorageError::Decode {
        path: path.to_path_buf(),
        source: e,
    })
}

pub struct ResultStorage {
    output_directory: PathBuf,
}

impl ResultStorage {
    pub fn new<P: AsRef<Path>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
        }
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// `<output_directory>/<stem>.json`
    pub fn bundle_path_for(&self, job: &Job) -> PathBuf {
        self.output_directory.join(format!("{}.json", job.stem()))
    }

    /// Persists the recognized text of `job`, replacing any bundle left by a
    /// previous run.
    pub fn write_bundle(&self, job: &Job, result: &RecognitionResult) -> Result<PathBuf, StorageError> {
        let path = self.bundle_path_for(job);
        let bundle = ResultBundle::new(job, result);

        write_json_atomically(&path, &bundle)?;
        debug!(
            "Wrote {} result pages to {}",
            bundle.pages.len(),
            sanitize::redact_path(&path)
        );
        Ok(path)
    }

    pub fn read_bundle(path: &Path) -> Result<ResultBundle, StorageError> {
        read_json(path)
    }
}
