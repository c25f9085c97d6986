//! Configuration for the medianet staker client.
//!
//! All settings live in a single `medianet.toml` file. Every section has
//! sensible defaults; a config file only needs the values it overrides.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

mod config;
mod error;

pub use config::{
    Config, FetchConfig, GasConfig, LoggingConfig, ProtocolConfig, ProviderConfig, RetryConfig,
    StakerConfig,
};
pub use error::{ConfigError, ConfigResult};
