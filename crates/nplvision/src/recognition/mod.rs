//! Remote text recognition: content upload and asynchronous detection jobs.
//!
//! The pipeline depends only on the [`ContentStore`] and
//! [`RecognitionService`] capabilities; [`http`] provides the production
//! implementations and [`local`] a directory-backed content store.

pub mod client;
pub mod error;
pub mod http;
pub mod local;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::{RecognitionClient, RecognitionConfig, RetryPolicy};
pub use error::{RecognitionError, RemoteError, RetryableError, SubmissionError, TransferError};
pub use http::{HttpContentStore, HttpRecognitionService};
pub use local::FilesystemContentStore;

/// Key of an uploaded artifact in the content store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteKey(String);

impl RemoteKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque job identifier issued by the recognition service. Never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    InProgress,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    Page,
    Line,
    Word,
}

/// One detected element. Only `LINE` blocks contribute to extracted text;
/// words would duplicate the line content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub id: String,
    pub block_type: BlockType,
    #[serde(default)]
    pub text: Option<String>,
    /// 1-based page of the source document.
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl Block {
    pub fn line(text: impl Into<String>, page: u32) -> Self {
        Self {
            id: String::new(),
            block_type: BlockType::Line,
            text: Some(text.into()),
            page: Some(page),
            confidence: None,
        }
    }
}

/// One status/result response. `next_token` is set when more result pages
/// exist for the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPage {
    pub job_status: JobStatus,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub next_token: Option<String>,
}

impl ResultPage {
    pub fn in_progress() -> Self {
        Self {
            job_status: JobStatus::InProgress,
            status_message: None,
            blocks: Vec::new(),
            next_token: None,
        }
    }
}

/// Recognized text of one document page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

/// All result pages of a succeeded job, in continuation-token order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub job_id: JobId,
    pub pages: Vec<ResultPage>,
}

impl RecognitionResult {
    pub fn lines(&self) -> impl Iterator<Item = &Block> {
        self.pages
            .iter()
            .flat_map(|page| page.blocks.iter())
            .filter(|block| block.block_type == BlockType::Line)
    }

    /// Every line of the document joined by newlines, in result order.
    pub fn text(&self) -> String {
        self.lines()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Lines grouped by source document page. Lines without a page number
    /// are attributed to page 1.
    pub fn page_texts(&self) -> Vec<PageText> {
        let mut by_page: BTreeMap<u32, Vec<&str>> = BTreeMap::new();
        for block in self.lines() {
            if let Some(text) = block.text.as_deref() {
                by_page.entry(block.page.unwrap_or(1)).or_default().push(text);
            }
        }

        by_page
            .into_iter()
            .map(|(page, lines)| PageText {
                page,
                text: lines.join("\n"),
            })
            .collect()
    }
}

/// Durable storage the recognition service reads artifacts from.
/// Writing an existing key overwrites it.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn put(&self, local_path: &Path, key: &RemoteKey) -> Result<(), TransferError>;
}

/// Asynchronous text detection.
#[async_trait]
pub trait RecognitionService: Send + Sync {
    async fn start_text_detection(&self, key: &RemoteKey) -> Result<JobId, SubmissionError>;

    /// Current status of the job. Once the job has succeeded, the response
    /// carries a page of results; pass the returned `next_token` to get the
    /// next one. Completed jobs answer identically on every call.
    async fn get_text_detection(
        &self,
        job_id: &JobId,
        next_token: Option<&str>,
    ) -> Result<ResultPage, RecognitionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str) -> Block {
        Block {
            id: String::new(),
            block_type: BlockType::Word,
            text: Some(text.to_string()),
            page: Some(1),
            confidence: Some(99.1),
        }
    }

    fn result(pages: Vec<Vec<Block>>) -> RecognitionResult {
        RecognitionResult {
            job_id: JobId::new("job-1"),
            pages: pages
                .into_iter()
                .map(|blocks| ResultPage {
                    job_status: JobStatus::Succeeded,
                    status_message: None,
                    blocks,
                    next_token: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_text_uses_only_lines_in_order() {
        let result = result(vec![
            vec![Block::line("ADJUSTABLE RATE NOTE", 1), word("ADJUSTABLE")],
            vec![Block::line("Borrower promises to pay", 1)],
        ]);
        assert_eq!(
            result.text(),
            "ADJUSTABLE RATE NOTE\nBorrower promises to pay"
        );
    }

    #[test]
    fn test_page_texts_group_by_document_page() {
        let result = result(vec![
            vec![Block::line("page one a", 1), Block::line("page two a", 2)],
            vec![Block::line("page one b", 1)],
        ]);

        let pages = result.page_texts();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page, 1);
        assert_eq!(pages[0].text, "page one a\npage one b");
        assert_eq!(pages[1].text, "page two a");
    }

    #[test]
    fn test_empty_result_has_empty_text() {
        let result = result(vec![]);
        assert_eq!(result.text(), "");
        assert!(result.page_texts().is_empty());
    }

    #[test]
    fn test_job_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&JobStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        let status: JobStatus = serde_json::from_str("\"SUCCEEDED\"").unwrap();
        assert!(status.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_result_page_deserializes_with_defaults() {
        let page: ResultPage = serde_json::from_str(
            r#"{"job_status": "SUCCEEDED", "blocks": [{"block_type": "LINE", "text": "Mortgage"}], "next_token": "abc"}"#,
        )
        .unwrap();
        assert_eq!(page.blocks.len(), 1);
        assert_eq!(page.blocks[0].page, None);
        assert_eq!(page.next_token.as_deref(), Some("abc"));
    }
}
