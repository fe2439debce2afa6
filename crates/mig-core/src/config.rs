//! Negotiator and live-session configuration
//!
//! [`MigrationConfig`] is built once at start-up and handed to the
//! negotiator. [`CasperConfig`] reads the live session's `casper.conf`; it
//! is loaded explicitly, and an unreadable file is an empty configuration.

use crate::error::ConfigError;
use crate::logging::LOG_TARGET;
use crate::question::{FAILED_UNMOUNT, PARTITIONS, RUN_AGAIN};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Worker that scans partitions for importable data
pub const DEFAULT_WORKER_COMMAND: &str = "/usr/share/ubiquity/migration-assistant";

/// Answer that makes the worker accept a field without validating it
pub const SKIP_QUESTION: &str = "skip-question";

/// Default location of the live-session configuration
pub const CASPER_CONF_PATH: &str = "/etc/casper.conf";

/// Error identifiers that are buffered and shown next to the user entry
pub const RECOVERABLE_ERRORS: [&str; 4] = [
    "migration-assistant/password-mismatch",
    "migration-assistant/password-empty",
    "migration-assistant/username-bad",
    "migration-assistant/username-reserved",
];

/// Casper keys forwarded into the worker environment
const FORWARDED_CASPER_KEYS: [&str; 2] = ["USERNAME", "HOST"];

/// Question patterns the negotiator subscribes to
#[must_use]
pub fn default_question_patterns() -> Vec<String> {
    vec![
        format!("{PARTITIONS}*"),
        "migration-assistant/*/users".to_string(),
        "migration-assistant/*/items".to_string(),
        "migration-assistant/*/user".to_string(),
        "migration-assistant/*/password".to_string(),
        format!("{FAILED_UNMOUNT}*"),
        RUN_AGAIN.to_string(),
        crate::filter::ERROR_SENTINEL.to_string(),
    ]
}

/// Negotiator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Worker command line
    pub worker_command: Vec<String>,
    /// Question patterns, see [`crate::filter`]
    pub question_patterns: Vec<String>,
    /// Error identifiers buffered for the next user question
    pub recoverable_errors: BTreeSet<String>,
    /// Answer preseeded for fields that must not be validated yet
    pub skip_answer: String,
    /// Extra environment for the worker
    pub worker_environment: BTreeMap<String, String>,
}

impl MigrationConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With the live-session user and host forwarded to the worker
    #[must_use]
    pub fn with_casper(mut self, casper: &CasperConfig) -> Self {
        for key in FORWARDED_CASPER_KEYS {
            if let Some(value) = casper.get(key) {
                self.worker_environment
                    .insert(key.to_string(), value.to_string());
            }
        }
        self
    }

    /// Whether errors on `question` are buffered rather than fatal
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self, question: &str) -> bool {
        self.recoverable_errors.contains(question)
    }

    /// Load from a JSON file; missing fields take their defaults
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not valid JSON
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            worker_command: vec![DEFAULT_WORKER_COMMAND.to_string()],
            question_patterns: default_question_patterns(),
            recoverable_errors: RECOVERABLE_ERRORS.iter().map(|s| (*s).to_string()).collect(),
            skip_answer: SKIP_QUESTION.to_string(),
            worker_environment: BTreeMap::new(),
        }
    }
}

/// Shell-style `KEY=value` settings of the live session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CasperConfig {
    values: BTreeMap<String, String>,
}

impl CasperConfig {
    /// Load from `path`
    ///
    /// A missing or unreadable file yields an empty configuration.
    #[must_use]
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(err) => {
                tracing::warn!(
                    target: LOG_TARGET,
                    "Unable to read {}: {}",
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Parse file contents
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut values = BTreeMap::new();
        for line in text.lines() {
            if line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line).trim();
            if let Some((key, value)) = line.split_once('=') {
                values.insert(key.trim().to_string(), value.trim_matches('"').to_string());
            }
        }
        Self { values }
    }

    /// Value of `key`
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Whether nothing was loaded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
