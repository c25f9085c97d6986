//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file at {path}: {source}")]
    FileRead {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the TOML document.
    #[error("failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// The provider URL is not an http(s) endpoint.
    #[error("invalid provider url: {0}")]
    InvalidProviderUrl(String),

    /// Chain id must be non-zero.
    #[error("invalid chain id: must be non-zero")]
    InvalidChainId,

    /// Epoch length outside the supported range.
    #[error("invalid epoch length {got}s: must be between {min}s and {max}s")]
    InvalidEpochLength {
        /// Configured value.
        got: u64,
        /// Minimum allowed.
        min: u64,
        /// Maximum allowed.
        max: u64,
    },

    /// The gas bump factor is out of range.
    #[error("invalid gas multiplier {0}: must be between 1.0 and 10.0")]
    InvalidGasMultiplier(f64),

    /// Fetch concurrency must be positive.
    #[error("invalid fetch concurrency: must be at least 1")]
    InvalidConcurrency,

    /// A timeout value is out of range.
    #[error("invalid timeout: {name} must be positive, got {value}s")]
    InvalidTimeout {
        /// Which timeout.
        name: &'static str,
        /// Configured value.
        value: u64,
    },

    /// A retry attempt budget must be positive.
    #[error("invalid retry attempts: {name} must be at least 1")]
    InvalidRetryAttempts {
        /// Which budget.
        name: &'static str,
    },

    /// Unknown log level.
    #[error("invalid log level: {0}. Valid values: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unknown log format.
    #[error("invalid log format: {0}. Valid values: json, pretty")]
    InvalidLogFormat(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
