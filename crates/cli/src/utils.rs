//! Shared utilities for CLI commands: error types, the key prompt, and
//! the component wiring every command needs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dialoguer::Password;
use thiserror::Error;

use medianet_chain::{LocalSigner, RpcChain};
use medianet_config::Config;
use medianet_core::{EngineError, Signer};

/// CLI error types.
#[derive(Error, Debug)]
pub enum CliError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] medianet_config::ConfigError),

    /// Key-related error.
    #[error("key error: {0}")]
    Key(String),

    /// Chain RPC error.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// Engine error surfaced to the user.
    #[error("{0}")]
    Engine(String),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Interactive prompt error.
    #[error("input error: {0}")]
    Dialoguer(#[from] dialoguer::Error),
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        CliError::Engine(err.to_string())
    }
}

/// CLI result type alias.
pub type CliResult<T> = Result<T, CliError>;

/// Load the configuration, defaulting to `./medianet.toml` when the
/// file exists and to built-in defaults otherwise.
pub fn load_config(path: &Option<PathBuf>) -> CliResult<Config> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None => {
            let default = PathBuf::from(crate::DEFAULT_CONFIG_FILE);
            if default.exists() {
                Ok(Config::load(&default)?)
            } else {
                Ok(Config::default())
            }
        }
    }
}

/// Obtain the signing key: from a file when given, otherwise via a
/// hidden prompt. The key lives in memory only, for this run.
pub fn obtain_signer(key_file: &Option<PathBuf>) -> CliResult<Arc<LocalSigner>> {
    let hex_key = match key_file {
        Some(path) => std::fs::read_to_string(path)?,
        None => Password::new()
            .with_prompt("Signer private key")
            .validate_with(|input: &String| {
                if input.trim().is_empty() {
                    Err("enter a valid private key")
                } else {
                    Ok(())
                }
            })
            .interact()?,
    };
    let signer = LocalSigner::from_hex(&hex_key).map_err(|e| CliError::Key(e.to_string()))?;
    tracing::info!(address = %signer.address(), "account unlocked");
    Ok(Arc::new(signer))
}

/// Connect the chain adapter from config.
pub fn connect_chain(config: &Config, signer: Arc<LocalSigner>) -> CliResult<Arc<RpcChain>> {
    let chain = RpcChain::connect(
        &config.provider.url,
        config.provider.chain_id,
        Duration::from_secs(config.provider.request_timeout_secs),
        signer,
    )
    .map_err(|e| CliError::Rpc(e.to_string()))?;
    Ok(Arc::new(chain))
}
