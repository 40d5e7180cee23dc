#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use image::{Rgb, RgbImage};

use nplvision::error::RepairError;
use nplvision::optimizer::PageRasterizer;
use nplvision::recognition::{
    Block, ContentStore, JobId, JobStatus, RecognitionError, RecognitionService, RemoteKey,
    ResultPage, SubmissionError, TransferError,
};

/// Rasterizes according to the source file's content instead of invoking
/// poppler:
///
/// - `pages:<n>` renders `n` small colour pages
/// - `panic` panics
/// - anything else fails like an unreadable PDF
pub struct StubRasterizer {
    rasterized: Mutex<Vec<String>>,
}

impl StubRasterizer {
    pub fn new() -> Self {
        Self {
            rasterized: Mutex::new(Vec::new()),
        }
    }

    pub fn rasterized(&self) -> Vec<String> {
        self.rasterized.lock().unwrap().clone()
    }
}

impl PageRasterizer for StubRasterizer {
    fn rasterize(&self, source: &Path, _dpi: u32, scratch: &Path) -> Result<Vec<PathBuf>, RepairError> {
        let content = std::fs::read_to_string(source).map_err(|e| RepairError::ReadSource {
            path: source.to_path_buf(),
            source: e,
        })?;
        self.rasterized
            .lock()
            .unwrap()
            .push(source.file_name().unwrap().to_string_lossy().into_owned());

        if content.trim() == "panic" {
            panic!("rasterizer crashed on {}", source.display());
        }

        let pages: usize = content
            .trim()
            .strip_prefix("pages:")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| RepairError::Rasterize("Syntax Error: Couldn't read xref table".to_string()))?;

        (1..=pages)
            .map(|page| {
                let path = scratch.join(format!("raster-{}.png", page));
                RgbImage::from_pixel(40, 50, Rgb([200, 180, 40]))
                    .save(&path)
                    .map_err(|e| RepairError::Rasterize(e.to_string()))?;
                Ok(path)
            })
            .collect()
    }
}

/// Records every upload. Keys containing `fail_marker` are rejected;
/// keys containing `panic_marker` panic.
pub struct RecordingStore {
    keys: Mutex<Vec<String>>,
    fail_marker: Option<String>,
    panic_marker: Option<String>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(Vec::new()),
            fail_marker: None,
            panic_marker: None,
        }
    }

    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Self::new()
        }
    }

    pub fn panicking_on(marker: &str) -> Self {
        Self {
            panic_marker: Some(marker.to_string()),
            ..Self::new()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentStore for RecordingStore {
    async fn put(&self, _local_path: &Path, key: &RemoteKey) -> Result<(), TransferError> {
        if let Some(marker) = &self.panic_marker {
            if key.as_str().contains(marker.as_str()) {
                panic!("content store crashed on {}", key);
            }
        }
        if let Some(marker) = &self.fail_marker {
            if key.as_str().contains(marker.as_str()) {
                return Err(TransferError::Rejected {
                    status: 403,
                    message: "AccessDenied".to_string(),
                });
            }
        }
        self.keys.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

/// How the scripted service answers for one document.
#[derive(Debug, Clone)]
pub enum JobScript {
    /// In progress for `in_progress` polls, then succeeds with one result
    /// page per entry of `pages`, chained by continuation tokens.
    Succeed {
        in_progress: usize,
        pages: Vec<Vec<String>>,
    },
    Fail {
        message: String,
    },
    RejectSubmission {
        status: u16,
    },
    NeverFinishes,
    /// Succeeds on the first poll. Each page names the token it answers
    /// (`None` for the first page) and the token it hands out next, so the
    /// chain can run in any order relative to how the pages are listed.
    Chained {
        pages: Vec<ChainedPage>,
    },
}

#[derive(Debug, Clone)]
pub struct ChainedPage {
    pub token: Option<String>,
    pub page: u32,
    pub lines: Vec<String>,
    pub next: Option<String>,
}

impl ChainedPage {
    pub fn new(token: Option<&str>, page: u32, lines: &[&str], next: Option<&str>) -> Self {
        Self {
            token: token.map(str::to_string),
            page,
            lines: lines.iter().map(|l| l.to_string()).collect(),
            next: next.map(str::to_string),
        }
    }
}

impl JobScript {
    pub fn pages(pages: &[&[&str]]) -> Self {
        JobScript::Succeed {
            in_progress: 1,
            pages: pages
                .iter()
                .map(|lines| lines.iter().map(|l| l.to_string()).collect())
                .collect(),
        }
    }
}

struct JobState {
    script: JobScript,
    polls: usize,
}

/// In-memory recognition service. Documents are identified by the stem of
/// their uploaded artifact (`uploads/<stem>_optimized.pdf`); unscripted
/// documents succeed with a single line `text of <stem>`.
pub struct ScriptedService {
    scripts: Mutex<HashMap<String, JobScript>>,
    jobs: Mutex<HashMap<String, JobState>>,
    submissions: Mutex<Vec<String>>,
    status_calls: AtomicUsize,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            jobs: Mutex::new(HashMap::new()),
            submissions: Mutex::new(Vec::new()),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_script(self, stem: &str, script: JobScript) -> Self {
        self.scripts.lock().unwrap().insert(stem.to_string(), script);
        self
    }

    /// Keys submitted for text detection, in submission order.
    pub fn submissions(&self) -> Vec<String> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn stem_of(key: &RemoteKey) -> String {
        let name = key.as_str().rsplit('/').next().unwrap_or_default();
        name.trim_end_matches(".pdf")
            .trim_end_matches("_optimized")
            .to_string()
    }

    fn result_page(lines: &[String], page_number: usize, next_token: Option<String>) -> ResultPage {
        ResultPage {
            job_status: JobStatus::Succeeded,
            status_message: None,
            blocks: lines
                .iter()
                .map(|line| Block::line(line.clone(), page_number as u32))
                .collect(),
            next_token,
        }
    }

    fn token_for(page_index: usize, total: usize) -> Option<String> {
        if page_index + 1 < total {
            Some(format!("page-{}", page_index + 1))
        } else {
            None
        }
    }
}

#[async_trait]
impl RecognitionService for ScriptedService {
    async fn start_text_detection(&self, key: &RemoteKey) -> Result<JobId, SubmissionError> {
        let stem = Self::stem_of(key);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&stem)
            .cloned()
            .unwrap_or_else(|| JobScript::Succeed {
                in_progress: 0,
                pages: vec![vec![format!("text of {}", stem)]],
            });

        if let JobScript::RejectSubmission { status } = script {
            return Err(SubmissionError::Rejected {
                status,
                message: "InvalidS3ObjectException".to_string(),
            });
        }

        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(key.to_string());
        let job_id = format!("job-{}-{}", submissions.len(), stem);
        self.jobs
            .lock()
            .unwrap()
            .insert(job_id.clone(), JobState { script, polls: 0 });
        Ok(JobId::new(job_id))
    }

    async fn get_text_detection(
        &self,
        job_id: &JobId,
        next_token: Option<&str>,
    ) -> Result<ResultPage, RecognitionError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut jobs = self.jobs.lock().unwrap();
        let state = jobs
            .get_mut(job_id.as_str())
            .ok_or_else(|| RecognitionError::Rejected {
                status: 400,
                message: format!("InvalidJobIdException: {}", job_id),
            })?;

        match (&state.script, next_token) {
            (JobScript::Succeed { pages, .. }, Some(token)) => {
                let index: usize = token
                    .strip_prefix("page-")
                    .and_then(|n| n.parse().ok())
                    .filter(|i| *i < pages.len())
                    .ok_or_else(|| RecognitionError::InvalidResponse(format!("bad token {}", token)))?;
                Ok(Self::result_page(
                    &pages[index],
                    index + 1,
                    Self::token_for(index, pages.len()),
                ))
            }
            (JobScript::Succeed { in_progress, pages }, None) => {
                state.polls += 1;
                if state.polls <= *in_progress {
                    return Ok(ResultPage::in_progress());
                }
                match pages.first() {
                    Some(first) => Ok(Self::result_page(first, 1, Self::token_for(0, pages.len()))),
                    None => Ok(Self::result_page(&[], 1, None)),
                }
            }
            (JobScript::Fail { message }, _) => Ok(ResultPage {
                job_status: JobStatus::Failed,
                status_message: Some(message.clone()),
                blocks: Vec::new(),
                next_token: None,
            }),
            (JobScript::Chained { pages }, token) => {
                let page = pages
                    .iter()
                    .find(|p| p.token.as_deref() == token)
                    .ok_or_else(|| {
                        RecognitionError::InvalidResponse(format!("bad token {:?}", token))
                    })?;
                Ok(Self::result_page(
                    &page.lines,
                    page.page as usize,
                    page.next.clone(),
                ))
            }
            (JobScript::NeverFinishes, _) => Ok(ResultPage::in_progress()),
            (JobScript::RejectSubmission { .. }, _) => Err(RecognitionError::InvalidResponse(
                "job was never started".to_string(),
            )),
        }
    }
}
