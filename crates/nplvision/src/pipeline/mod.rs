pub mod config;
pub mod error;
pub mod progress;
pub mod runner;
pub mod summary;

pub use config::PipelineConfig;
pub use error::StageError;
pub use progress::{LogProgress, NoopProgress, ProgressEvent, ProgressReporter, Stage};
pub use runner::Pipeline;
pub use summary::{BatchSummary, FileRecord, FileStatus};
