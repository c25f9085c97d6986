//! CLI command definitions and handlers.

pub mod claim_bounty;
pub mod staking;
pub mod vote;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::utils::CliResult;

/// Medianet - decentralized oracle staker client
#[derive(Parser, Debug)]
#[command(name = "medianet")]
#[command(version)]
#[command(about = "Medianet oracle staker client", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file (defaults to ./medianet.toml)
    #[arg(global = true, long)]
    pub config: Option<PathBuf>,

    /// Read the signer key from a file instead of prompting
    #[arg(global = true, long)]
    pub key_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(global = true, short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(global = true, short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the epoch loop: commit, reveal, propose, dispute, claim
    Vote(vote::VoteArgs),

    /// Redeem earned dispute bounties
    ClaimBounty(claim_bounty::ClaimBountyArgs),

    /// Staking operations
    #[command(subcommand)]
    Staking(staking::StakingCommands),

    /// Show version information
    Version,
}

/// Execute the CLI with parsed arguments.
pub async fn run_cli(cli: Cli) -> CliResult<()> {
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => tracing::Level::ERROR,
        (_, 0) => tracing::Level::INFO,
        (_, 1) => tracing::Level::DEBUG,
        (_, _) => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    match cli.command {
        Commands::Vote(args) => vote::execute(args, &cli.config, &cli.key_file).await,
        Commands::ClaimBounty(args) => {
            claim_bounty::execute(args, &cli.config, &cli.key_file).await
        }
        Commands::Staking(cmd) => staking::execute(cmd, &cli.config, &cli.key_file).await,
        Commands::Version => {
            println!("medianet {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
