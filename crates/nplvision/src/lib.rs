//! Ingestion pipeline for scanned loan-collateral documents.
//!
//! Each source PDF is repaired for OCR (rasterized, converted to grayscale,
//! optionally downscaled, reassembled), sent to a remote asynchronous text
//! detection service, and its paginated result persisted as a text bundle.
//! Every batch run leaves a JSON audit log with one record per document.

pub mod config;
pub mod error;
pub mod optimizer;
pub mod pipeline;
pub mod recognition;
pub mod sanitize;
pub mod secrets;
pub mod storage;
pub mod worker;

pub use config::{load_config, load_config_from_str, Config};
pub use error::{ConfigError, NplError, RepairError, Result, StorageError, WorkerError};
pub use optimizer::{OptimizedDocument, Optimizer, OptimizerConfig, PageRasterizer};
pub use pipeline::{
    BatchSummary, FileRecord, FileStatus, LogProgress, NoopProgress, Pipeline, PipelineConfig,
    ProgressReporter, StageError,
};
pub use recognition::{
    ContentStore, RecognitionClient, RecognitionConfig, RecognitionResult, RecognitionService,
    RemoteError,
};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use storage::{ResultBundle, ResultStorage};
pub use worker::{BatchRunner, DirectoryScanner, Job};
