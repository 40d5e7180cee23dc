use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::warn;

/// One source document queued for processing.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub source_path: PathBuf,
    stem: String,
}

impl Job {
    pub fn new(source_path: PathBuf) -> Self {
        let stem = source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_path,
            stem,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// File name of the source, as recorded in the batch summary.
    pub fn filename(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source_path.display().to_string())
    }

    /// Names every artifact derived from this document. The source file
    /// stem unless [`assign_unique_stems`] had to rename it.
    pub fn stem(&self) -> &str {
        &self.stem
    }
}

/// Makes artifact stems unique within a batch, comparing case-insensitively
/// so the result also holds on case-insensitive filesystems. The first job
/// keeps its stem; later collisions get the source extension appended, then
/// a counter.
pub fn assign_unique_stems(jobs: &mut [Job]) {
    let mut taken: HashSet<String> = HashSet::new();

    for job in jobs.iter_mut() {
        if taken.insert(job.stem.to_lowercase()) {
            continue;
        }

        let extension = job
            .source_path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dup".to_string());
        let base = format!("{}_{}", job.stem, extension);

        let mut candidate = base.clone();
        let mut counter = 2;
        while !taken.insert(candidate.to_lowercase()) {
            candidate = format!("{}_{}", base, counter);
            counter += 1;
        }

        warn!(
            "{} shares its name with another document, writing its artifacts as {}",
            job.filename(),
            candidate
        );
        job.stem = candidate;
    }
}
