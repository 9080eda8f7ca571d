//! Error types for the triage pipeline.

use std::time::Duration;

/// Per-record failures. None of these abort a batch.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("row {row}: message has no text")]
    MissingInput { row: usize },

    #[error("row {row}: malformed record: {reason}")]
    MalformedRecord { row: usize, reason: String },

    #[error("{model} model unavailable: {reason}")]
    ModelUnavailable { model: String, reason: String },

    #[error("{model} model timed out after {after:?}")]
    Timeout { model: String, after: Duration },
}

impl TriageError {
    pub fn unavailable(model: impl Into<String>, reason: impl ToString) -> Self {
        Self::ModelUnavailable {
            model: model.into(),
            reason: reason.to_string(),
        }
    }
}

/// Configuration errors, fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    pub fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}
