use std::path::PathBuf;

use crate::config::{Config, RecognitionSettings, StorageSettings};
use crate::optimizer::OptimizerConfig;
use crate::recognition::RecognitionConfig;

/// Everything the pipeline and batch runner need, resolved from [`Config`].
pub struct PipelineConfig {
    pub input_directory: PathBuf,
    pub input_pattern: String,
    pub optimized_directory: PathBuf,
    pub output_directory: PathBuf,
    pub summary_directory: PathBuf,
    pub worker_count: usize,
    pub optimizer: OptimizerConfig,
    pub recognition: RecognitionConfig,
    /// Endpoint and credential sources of the production recognition service.
    pub recognition_service: RecognitionSettings,
    pub content_store: StorageSettings,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        let scratch_root = config.scratch_directory.as_ref().map(PathBuf::from);

        Self {
            input_directory: PathBuf::from(&config.input_directory),
            input_pattern: config.input_pattern.clone(),
            optimized_directory: PathBuf::from(&config.optimized_directory),
            output_directory: PathBuf::from(&config.output_directory),
            summary_directory: PathBuf::from(&config.summary_directory),
            worker_count: config.worker_count.max(1),
            optimizer: OptimizerConfig::from_settings(&config.optimizer, scratch_root),
            recognition: RecognitionConfig::from_settings(&config.recognition),
            recognition_service: config.recognition.clone(),
            content_store: config.storage.clone(),
        }
    }
}
