//! Error types for swarm core values and configuration.

use thiserror::Error;

/// Result type alias for value validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type alias for configuration loading and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A node or task spec carried an invalid field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Configuration errors. These are fatal at initialization and never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown topology kind: {0}")]
    UnknownTopology(String),

    #[error("unknown consensus algorithm: {0}")]
    UnknownConsensus(String),

    #[error("unknown recovery strategy: {0}")]
    UnknownRecoveryStrategy(String),

    #[error("invalid duration for {field}: {value}")]
    InvalidDuration { field: &'static str, value: String },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
