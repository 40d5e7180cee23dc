use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub input_directory: String,
    #[serde(default = "default_input_pattern")]
    pub input_pattern: String,
    #[serde(default = "default_optimized_directory")]
    pub optimized_directory: String,
    #[serde(default = "default_output_directory")]
    pub output_directory: String,
    #[serde(default = "default_summary_directory")]
    pub summary_directory: String,
    /// Root for per-document scratch directories. Defaults to the system temp dir.
    #[serde(default)]
    pub scratch_directory: Option<String>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub optimizer: OptimizerSettings,
    pub recognition: RecognitionSettings,
    pub storage: StorageSettings,
}

fn default_input_pattern() -> String {
    "*.pdf".to_string()
}

fn default_optimized_directory() -> String {
    "ocr_optimized_pdfs".to_string()
}

fn default_output_directory() -> String {
    "ocr_results".to_string()
}

fn default_summary_directory() -> String {
    "logs".to_string()
}

// Remote text detection has per-account concurrency limits, so don't scale
// with every core on large machines.
fn default_worker_count() -> usize {
    num_cpus::get().clamp(1, 4)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerProfile {
    #[default]
    Quality,
    MemoryConscious,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizerSettings {
    #[serde(default)]
    pub profile: OptimizerProfile,
    /// Overrides the profile's rasterization DPI.
    #[serde(default)]
    pub dpi: Option<u32>,
    /// Overrides the profile's page width cap in pixels.
    #[serde(default)]
    pub max_page_width: Option<u32>,
}

/// Bearer token sources, checked in order: direct value, file, env var.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialSettings {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_file: Option<String>,
    #[serde(default)]
    pub token_env_var: Option<String>,
}

impl fmt::Debug for CredentialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSettings")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("token_file", &self.token_file)
            .field("token_env_var", &self.token_env_var)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionSettings {
    pub endpoint: String,
    #[serde(flatten)]
    pub credentials: CredentialSettings,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_poll_interval_secs() -> u64 {
    5
}

// 360 polls at the default interval is 30 minutes.
fn default_max_poll_attempts() -> u32 {
    360
}

fn default_key_prefix() -> String {
    "uploads/".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    pub endpoint: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(flatten)]
    pub credentials: CredentialSettings,
}

fn default_bucket() -> String {
    "nplvision-textract-inputs".to_string()
}
