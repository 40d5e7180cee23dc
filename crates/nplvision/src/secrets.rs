//! Bearer-token resolution for the recognition service and content store.
//!
//! Tokens are looked up in priority order:
//!
//! 1. **Direct value** - `token` in the config, for local testing
//! 2. **File reference** - `token_file`, for mounted secrets
//! 3. **Env var reference** - `token_env_var`, for CI and containers

use secrecy::SecretString;
use std::fs;

use crate::config::CredentialSettings;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: token, token_file, or token_env_var)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Secret file '{path}' is empty")]
    EmptyFile { path: String },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from the first non-empty source.
///
/// ```ignore
/// use nplvision::secrets::resolve_secret;
///
/// let token = resolve_secret(None, Some("~/.nplvision/ocr-token"), Some("OCR_TOKEN"))?;
/// ```
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        let content = fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
            path: expanded.clone(),
            source: e,
        })?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SecretError::EmptyFile { path: expanded });
        }
        return Ok(SecretString::from(trimmed.to_string()));
    }

    if let Some(var_name) = env_var.filter(|v| !v.is_empty()) {
        return match std::env::var(var_name) {
            Ok(value) => Ok(SecretString::from(value.trim().to_string())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: var_name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: var_name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Like [`resolve_secret`], but an unconfigured secret is `Ok(None)`.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Resolves the bearer token for a remote endpoint. Endpoints without
/// credentials (e.g. a local gateway) get `None`.
pub fn resolve_credentials(credentials: &CredentialSettings) -> Result<Option<SecretString>> {
    resolve_secret_optional(
        credentials.token.as_deref(),
        credentials.token_file.as_deref(),
        credentials.token_env_var.as_deref(),
    )
}

/// Expands a leading `~` to the user's home directory. `~user` is not supported.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            if path == "~" {
                return home.to_string_lossy().into_owned();
            }
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;

    // Tests touching environment variables run serially.
    #[test]
    #[serial]
    fn test_direct_value_takes_priority() {
        std::env::set_var("NPL_TEST_TOKEN_DIRECT", "from-env");
        let secret =
            resolve_secret(Some("direct"), None, Some("NPL_TEST_TOKEN_DIRECT")).unwrap();
        assert_eq!(secret.expose_secret(), "direct");
        std::env::remove_var("NPL_TEST_TOKEN_DIRECT");
    }

    #[test]
    #[serial]
    fn test_file_takes_priority_over_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  file-token  ").unwrap();
        std::env::set_var("NPL_TEST_TOKEN_FILE", "from-env");

        let secret = resolve_secret(
            None,
            Some(file.path().to_str().unwrap()),
            Some("NPL_TEST_TOKEN_FILE"),
        )
        .unwrap();
        assert_eq!(secret.expose_secret(), "file-token");
        std::env::remove_var("NPL_TEST_TOKEN_FILE");
    }

    #[test]
    #[serial]
    fn test_env_var_fallback() {
        std::env::set_var("NPL_TEST_TOKEN_ENV", "env-token\n");
        let secret = resolve_secret(None, None, Some("NPL_TEST_TOKEN_ENV")).unwrap();
        assert_eq!(secret.expose_secret(), "env-token");
        std::env::remove_var("NPL_TEST_TOKEN_ENV");
    }

    #[test]
    fn test_no_source_error() {
        assert!(matches!(
            resolve_secret(None, None, None),
            Err(SecretError::NoSourceProvided)
        ));
        assert!(matches!(
            resolve_secret(Some(""), Some(""), Some("")),
            Err(SecretError::NoSourceProvided)
        ));
    }

    #[test]
    fn test_empty_file_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = resolve_secret(None, Some(file.path().to_str().unwrap()), None);
        assert!(matches!(result, Err(SecretError::EmptyFile { .. })));
    }

    #[test]
    fn test_file_not_found_error() {
        let result = resolve_secret(None, Some("/nonexistent/token"), None);
        assert!(matches!(result, Err(SecretError::FileReadError { .. })));
    }

    #[test]
    #[serial]
    fn test_env_var_not_set_error() {
        std::env::remove_var("NPL_TEST_TOKEN_MISSING");
        match resolve_secret(None, None, Some("NPL_TEST_TOKEN_MISSING")) {
            Err(SecretError::EnvVarNotSet { name }) => assert_eq!(name, "NPL_TEST_TOKEN_MISSING"),
            other => panic!("Expected EnvVarNotSet, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_resolve_credentials_unconfigured_is_none() {
        let credentials = CredentialSettings::default();
        assert!(resolve_credentials(&credentials).unwrap().is_none());
    }

    #[test]
    fn test_resolve_credentials_direct() {
        let credentials = CredentialSettings {
            token: Some("abc123".to_string()),
            ..Default::default()
        };
        let token = resolve_credentials(&credentials).unwrap().unwrap();
        assert_eq!(token.expose_secret(), "abc123");
    }

    #[test]
    #[serial]
    fn test_expand_home() {
        let original = std::env::var_os("HOME");
        std::env::set_var("HOME", "/home/tester");

        assert_eq!(expand_home("~"), "/home/tester");
        assert_eq!(expand_home("~/tokens/ocr"), "/home/tester/tokens/ocr");
        assert_eq!(expand_home("/abs/~/path"), "/abs/~/path");

        match original {
            Some(home) => std::env::set_var("HOME", home),
            None => std::env::remove_var("HOME"),
        }
    }
}
