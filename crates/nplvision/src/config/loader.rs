use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();

    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if let Err(e) = glob::Pattern::new(&config.input_pattern) {
        return Err(ConfigError::InvalidPattern {
            pattern: config.input_pattern.clone(),
            reason: e.to_string(),
        });
    }

    if config.optimizer.dpi == Some(0) {
        return Err(ConfigError::Validation {
            message: "optimizer.dpi must be greater than 0".to_string(),
        });
    }

    if config.optimizer.max_page_width == Some(0) {
        return Err(ConfigError::Validation {
            message: "optimizer.max_page_width must be greater than 0".to_string(),
        });
    }

    let recognition = &config.recognition;
    if recognition.poll_interval_secs == 0 {
        return Err(ConfigError::Validation {
            message: "recognition.poll_interval_secs must be greater than 0".to_string(),
        });
    }

    if recognition.max_poll_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "recognition.max_poll_attempts must be greater than 0".to_string(),
        });
    }

    if recognition.retry.max_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "recognition.retry.max_attempts must be at least 1".to_string(),
        });
    }

    if !is_http_url(&recognition.endpoint) {
        return Err(ConfigError::Validation {
            message: format!(
                "recognition.endpoint must be an http(s) URL: {}",
                recognition.endpoint
            ),
        });
    }

    // A file:// content store copies artifacts onto a mount the service reads.
    let storage_endpoint = &config.storage.endpoint;
    if !is_http_url(storage_endpoint) && !storage_endpoint.starts_with("file://") {
        return Err(ConfigError::Validation {
            message: format!(
                "storage.endpoint must be an http(s) or file:// URL: {}",
                storage_endpoint
            ),
        });
    }

    Ok(())
}

fn is_http_url(endpoint: &str) -> bool {
    endpoint.starts_with("http://") || endpoint.starts_with("https://")
}
