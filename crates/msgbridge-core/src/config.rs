//! Runtime configuration.
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! environment variables. Command-line flags are applied last by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use msgbridge_msg::{DEFAULT_MAX_FILE_SIZE_MB, FormatValidator};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default processing budget in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Names of the four storage areas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Containers {
    /// Where items arrive.
    pub input: String,
    /// Where rendered `.eml` files are uploaded.
    pub output: String,
    /// Where successfully converted sources are moved.
    pub archive: String,
    /// Where failed sources are quarantined.
    pub failed: String,
}

impl Default for Containers {
    fn default() -> Self {
        Self {
            input: "msg-input".to_string(),
            output: "eml-output".to_string(),
            archive: "msg-archive".to_string(),
            failed: "msg-failed".to_string(),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum accepted input size in MiB.
    pub max_file_size_mb: u64,
    /// Wall-clock budget per item, in seconds.
    pub timeout_secs: u64,
    /// Log verbosity used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Storage area names.
    pub containers: Containers,
    /// Root directory of the filesystem storage backend.
    pub storage_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_level: "info".to_string(),
            containers: Containers::default(),
            storage_root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("msgbridge")
        .join("storage")
}

impl Config {
    /// Path of the per-user configuration file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("msgbridge")
            .join("config.json")
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Loads `path` if given, otherwise the per-user file when it exists,
    /// otherwise the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a file that should be loaded cannot be parsed, or
    /// if an explicitly requested file is missing.
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path).await;
        }

        let path = Self::default_path();
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(Self::default());
        }
        tracing::debug!("Loading configuration from {:?}", path);
        Self::load(&path).await
    }

    /// Overrides values from environment-style variables.
    ///
    /// `lookup` returns the value of a variable, if set. Empty values are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a numeric variable does not parse.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(value) = get("MAX_FILE_SIZE_MB") {
            self.max_file_size_mb = parse_number("MAX_FILE_SIZE_MB", &value)?;
        }
        if let Some(value) = get("TIMEOUT_SECONDS") {
            self.timeout_secs = parse_number("TIMEOUT_SECONDS", &value)?;
        }
        if let Some(value) = get("LOG_LEVEL") {
            self.log_level = value.trim().to_lowercase();
        }
        if let Some(value) = get("INPUT_CONTAINER") {
            self.containers.input = value;
        }
        if let Some(value) = get("OUTPUT_CONTAINER") {
            self.containers.output = value;
        }
        if let Some(value) = get("ARCHIVE_CONTAINER") {
            self.containers.archive = value;
        }
        if let Some(value) = get("FAILED_CONTAINER") {
            self.containers.failed = value;
        }
        if let Some(value) = get("MSGBRIDGE_STORAGE_ROOT") {
            self.storage_root = PathBuf::from(value);
        }
        Ok(())
    }

    /// Overrides values from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a numeric variable does not parse.
    pub fn apply_process_env(&mut self) -> Result<()> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Per-item processing budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validator configured with the size limit.
    #[must_use]
    pub const fn validator(&self) -> FormatValidator {
        FormatValidator::new(self.max_file_size_mb)
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{key} must be a non-negative integer, got '{value}': {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_file_size_mb, 25);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.containers.input, "msg-input");
        assert_eq!(config.containers.output, "eml-output");
        assert_eq!(config.containers.archive, "msg-archive");
        assert_eq!(config.containers.failed, "msg-failed");
        assert!(config.storage_root.ends_with("msgbridge/storage"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"timeout_secs": 5, "containers": {"failed": "bad"}}"#)
                .unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.max_file_size_mb, 25);
        assert_eq!(config.containers.failed, "bad");
        assert_eq!(config.containers.input, "msg-input");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("MAX_FILE_SIZE_MB", "10"),
                ("TIMEOUT_SECONDS", " 12 "),
                ("LOG_LEVEL", "DEBUG"),
                ("OUTPUT_CONTAINER", "out"),
                ("ARCHIVE_CONTAINER", ""),
                ("MSGBRIDGE_STORAGE_ROOT", "/srv/msgbridge"),
            ]))
            .unwrap();
        assert_eq!(config.max_file_size_mb, 10);
        assert_eq!(config.timeout_secs, 12);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.containers.output, "out");
        assert_eq!(config.containers.archive, "msg-archive");
        assert_eq!(config.storage_root, PathBuf::from("/srv/msgbridge"));
        assert_eq!(config.validator().max_size_mb(), 10);
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("MAX_FILE_SIZE_MB", "lots")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("MAX_FILE_SIZE_MB")));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("msgbridge-config-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("config.json");
        tokio::fs::write(&path, r#"{"max_file_size_mb": 3}"#)
            .await
            .unwrap();

        let config = Config::load_or_default(Some(&path)).await.unwrap();
        assert_eq!(config.max_file_size_mb, 3);

        let missing = Config::load_or_default(Some(&dir.join("missing.json"))).await;
        assert!(matches!(missing, Err(Error::Io(_))));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
