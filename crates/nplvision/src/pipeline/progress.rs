use std::fmt;

use tracing::info;

use super::summary::FileStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Optimize,
    Upload,
    Submit,
    AwaitCompletion,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Optimize => "optimizing",
            Stage::Upload => "uploading",
            Stage::Submit => "submitting",
            Stage::AwaitCompletion => "awaiting recognition",
            Stage::Persist => "saving results",
        };
        f.write_str(label)
    }
}

/// Events emitted while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Stage {
        filename: String,
        stage: Stage,
    },
    Finished {
        filename: String,
        status: FileStatus,
        completed: usize,
        total: usize,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Console progress through the tracing subscriber.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Stage { filename, stage } => {
                info!("{}: {}", filename, stage);
            }
            ProgressEvent::Finished {
                filename,
                status,
                completed,
                total,
            } => {
                info!("[{}/{}] {}: {:?}", completed, total, filename, status);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_labels() {
        assert_eq!(Stage::Optimize.to_string(), "optimizing");
        assert_eq!(Stage::AwaitCompletion.to_string(), "awaiting recognition");
    }

    #[test]
    fn test_log_progress_accepts_all_events() {
        let progress = LogProgress;
        progress.report(ProgressEvent::Stage {
            filename: "a.pdf".to_string(),
            stage: Stage::Upload,
        });
        progress.report(ProgressEvent::Finished {
            filename: "a.pdf".to_string(),
            status: FileStatus::Success,
            completed: 1,
            total: 1,
        });
    }
}
