//! Staking commands: move stake in and out.

use std::path::PathBuf;
use std::sync::Arc;

use alloy_primitives::U256;
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use tracing::info;

use medianet_core::{ChainRpc, Signer};

use crate::utils::{connect_chain, load_config, obtain_signer, CliError, CliResult};

/// Staking subcommands
#[derive(Subcommand, Debug)]
pub enum StakingCommands {
    /// Stake tokens
    Stake(StakeArgs),

    /// Begin unstaking tokens
    Unstake(UnstakeArgs),

    /// Start the withdraw lock after unstaking
    InitiateWithdraw,

    /// Release funds once the withdraw lock has passed
    UnlockWithdraw,
}

/// Arguments for staking
#[derive(Parser, Debug)]
pub struct StakeArgs {
    /// Amount to stake, in base token units
    #[arg(long)]
    pub amount: String,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

/// Arguments for unstaking
#[derive(Parser, Debug)]
pub struct UnstakeArgs {
    /// Amount to unstake, in base token units
    #[arg(long)]
    pub amount: String,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

/// Execute staking commands.
pub async fn execute(
    cmd: StakingCommands,
    config_path: &Option<PathBuf>,
    key_file: &Option<PathBuf>,
) -> CliResult<()> {
    let config = load_config(config_path)?;
    let signer = obtain_signer(key_file)?;
    let address = signer.address();
    let chain = connect_chain(&config, Arc::clone(&signer))?;

    match cmd {
        StakingCommands::Stake(args) => {
            let amount = parse_amount(&args.amount)?;
            if !args.yes && !confirm(&format!("Stake {amount} base units?"))? {
                return Ok(());
            }
            let epoch = rpc(chain.get_epoch().await)?;
            let tx = rpc(chain.stake(epoch, amount).await)?;
            rpc(chain.wait_for_confirmation(tx).await)?;
            info!(%tx, %amount, "stake confirmed");
        }
        StakingCommands::Unstake(args) => {
            let amount = parse_amount(&args.amount)?;
            if !args.yes && !confirm(&format!("Unstake {amount} base units?"))? {
                return Ok(());
            }
            let staker_id = rpc(chain.get_staker_id(address).await)?;
            let tx = rpc(chain.unstake(staker_id, amount).await)?;
            rpc(chain.wait_for_confirmation(tx).await)?;
            info!(%tx, %amount, "unstake submitted");
        }
        StakingCommands::InitiateWithdraw => {
            let staker_id = rpc(chain.get_staker_id(address).await)?;
            let tx = rpc(chain.initiate_withdraw(staker_id).await)?;
            rpc(chain.wait_for_confirmation(tx).await)?;
            info!(%tx, "withdraw lock started");
        }
        StakingCommands::UnlockWithdraw => {
            let staker_id = rpc(chain.get_staker_id(address).await)?;
            let tx = rpc(chain.unlock_withdraw(staker_id).await)?;
            rpc(chain.wait_for_confirmation(tx).await)?;
            info!(%tx, "withdraw unlocked");
        }
    }
    Ok(())
}

fn parse_amount(amount: &str) -> CliResult<U256> {
    U256::from_str_radix(amount.trim(), 10)
        .map_err(|e| CliError::InvalidArgument(format!("bad amount {amount:?}: {e}")))
}

fn confirm(prompt: &str) -> CliResult<bool> {
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

fn rpc<T>(result: Result<T, medianet_core::ChainError>) -> CliResult<T> {
    result.map_err(|e| CliError::Rpc(e.to_string()))
}
