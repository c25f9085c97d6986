//! Main configuration module.
//!
//! Everything the client needs at startup comes from one `medianet.toml`
//! file, validated section by section before the engine starts. Anything
//! that fails validation here is a [`ConfigError`] and the process never
//! reaches the main loop.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};

/// Shortest epoch the client will drive (the five sub-state windows must
/// stay meaningfully wide).
pub const MIN_EPOCH_LENGTH_SECS: u64 = 60;

/// Longest supported epoch.
pub const MAX_EPOCH_LENGTH_SECS: u64 = 86_400;

/// Top-level configuration, loaded from `medianet.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chain RPC endpoint settings.
    pub provider: ProviderConfig,

    /// Protocol timing parameters.
    pub protocol: ProtocolConfig,

    /// Local staker settings.
    pub staker: StakerConfig,

    /// Gas policy for dispute submissions.
    pub gas: GasConfig,

    /// Data-source fetch settings.
    pub fetch: FetchConfig,

    /// RPC retry budgets.
    pub retry: RetryConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        info!(path = %path.display(), "loading configuration");

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content)?;
        debug!("configuration parsed, validating");
        config.validate()?;

        info!(
            chain_id = config.provider.chain_id,
            epoch_length = config.protocol.epoch_length_secs,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> ConfigResult<()> {
        self.provider.validate()?;
        self.protocol.validate()?;
        self.gas.validate()?;
        self.fetch.validate()?;
        self.retry.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Chain RPC endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// JSON-RPC endpoint of the staker node.
    pub url: String,

    /// Chain identifier, replay protection.
    pub chain_id: u64,

    /// Deadline for a single RPC call, seconds.
    pub request_timeout_secs: u64,
}

impl ProviderConfig {
    fn validate(&self) -> ConfigResult<()> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(ConfigError::InvalidProviderUrl(self.url.clone()));
        }
        if self.chain_id == 0 {
            return Err(ConfigError::InvalidChainId);
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout {
                name: "provider.request_timeout_secs",
                value: self.request_timeout_secs,
            });
        }
        Ok(())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8545".to_string(),
            chain_id: 109,
            request_timeout_secs: 30,
        }
    }
}

/// Protocol timing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Seconds per epoch. Each of the five sub-states gets a fifth.
    pub epoch_length_secs: u64,

    /// Upper bound of the proposer election iteration search.
    pub max_propose_iterations: u64,
}

impl ProtocolConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.epoch_length_secs < MIN_EPOCH_LENGTH_SECS
            || self.epoch_length_secs > MAX_EPOCH_LENGTH_SECS
        {
            return Err(ConfigError::InvalidEpochLength {
                got: self.epoch_length_secs,
                min: MIN_EPOCH_LENGTH_SECS,
                max: MAX_EPOCH_LENGTH_SECS,
            });
        }
        Ok(())
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            epoch_length_secs: 300,
            max_propose_iterations: 10_000_000,
        }
    }
}

/// Local staker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StakerConfig {
    /// Directory holding per-account artifact directories and the run
    /// lock.
    pub data_dir: PathBuf,
}

impl Default for StakerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// Gas policy for dispute submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    /// Factor applied to the node's gas estimate for the id-presence
    /// dispute calls, which consistently under-estimate. Capped at the
    /// block gas limit.
    pub dispute_gas_multiplier: f64,
}

impl GasConfig {
    fn validate(&self) -> ConfigResult<()> {
        if !(1.0..=10.0).contains(&self.dispute_gas_multiplier) {
            return Err(ConfigError::InvalidGasMultiplier(self.dispute_gas_multiplier));
        }
        Ok(())
    }
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            dispute_gas_multiplier: 2.0,
        }
    }
}

/// Data-source fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Concurrent job fetches across a collection.
    pub max_concurrency: usize,

    /// Deadline for one HTTP GET, seconds.
    pub http_timeout_secs: u64,

    /// Attempts per job, including the first.
    pub attempts: u32,

    /// Fixed spacing between attempts, seconds.
    pub retry_delay_secs: u64,
}

impl FetchConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout {
                name: "fetch.http_timeout_secs",
                value: self.http_timeout_secs,
            });
        }
        if self.attempts == 0 {
            return Err(ConfigError::InvalidRetryAttempts {
                name: "fetch.attempts",
            });
        }
        Ok(())
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            http_timeout_secs: 10,
            attempts: 2,
            retry_delay_secs: 2,
        }
    }
}

/// RPC retry budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per chain RPC call, including the first.
    pub rpc_attempts: u32,

    /// Base delay of the exponential backoff, milliseconds.
    pub rpc_base_delay_ms: u64,
}

impl RetryConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.rpc_attempts == 0 {
            return Err(ConfigError::InvalidRetryAttempts {
                name: "retry.rpc_attempts",
            });
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            rpc_attempts: 3,
            rpc_base_delay_ms: 1_000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    pub level: String,

    /// Log format: json or pretty.
    pub format: String,
}

impl LoggingConfig {
    fn validate(&self) -> ConfigResult<()> {
        match self.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
        match self.format.as_str() {
            "json" | "pretty" => {}
            other => return Err(ConfigError::InvalidLogFormat(other.to_string())),
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
