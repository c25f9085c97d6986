//! # Medianet CLI
//!
//! Command-line surface of the oracle staker client.
//!
//! ## Available Commands
//!
//! - `vote` - run the full epoch loop (commit, reveal, propose, dispute,
//!   claim) for one account until interrupted
//! - `claim-bounty` - redeem one bounty by id, or drain the queued ones
//! - `staking stake` / `staking unstake` - move stake in or out
//! - `version` - display version information
//!
//! ## Example Usage
//!
//! ```bash
//! # Run the staker loop with a config file
//! medianet vote --config medianet.toml
//!
//! # Redeem bounty 7
//! medianet claim-bounty --bounty-id 7
//!
//! # Stake 1000 base units
//! medianet staking stake --amount 1000
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod commands;
pub mod utils;

pub use commands::{run_cli, Cli, Commands};
pub use utils::{CliError, CliResult};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "medianet.toml";
