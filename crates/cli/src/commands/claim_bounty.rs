//! The `claim-bounty` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use medianet_core::{ChainRpc, Clock, Retry, Signer, Store, SystemClock};
use medianet_engine::{seconds_to_readable, BountyClaimer};
use medianet_store::FileStore;
use medianet_types::BountyId;

use crate::utils::{connect_chain, load_config, obtain_signer, CliError, CliResult};

/// Arguments for the claim-bounty command
#[derive(Parser, Debug)]
pub struct ClaimBountyArgs {
    /// Redeem one specific bounty instead of draining the queue
    #[arg(long)]
    pub bounty_id: Option<BountyId>,
}

/// Redeem earned bounties.
pub async fn execute(
    args: ClaimBountyArgs,
    config_path: &Option<PathBuf>,
    key_file: &Option<PathBuf>,
) -> CliResult<()> {
    let config = load_config(config_path)?;
    let signer = obtain_signer(key_file)?;
    let address = signer.address();
    let chain: Arc<dyn ChainRpc> = connect_chain(&config, Arc::clone(&signer))?;

    let epoch = chain
        .get_epoch()
        .await
        .map_err(|e| CliError::Rpc(e.to_string()))?;

    match args.bounty_id {
        Some(id) => claim_one(chain.as_ref(), &config, epoch, id).await,
        None => {
            let clock: Arc<dyn Clock> = Arc::new(SystemClock);
            let store: Arc<dyn Store> = Arc::new(
                FileStore::open(&config.staker.data_dir, address)
                    .map_err(|e| CliError::Engine(e.to_string()))?,
            );
            let claimer = BountyClaimer::new(
                Arc::clone(&chain),
                store,
                clock,
                address,
                Retry::exponential(
                    config.retry.rpc_attempts,
                    Duration::from_millis(config.retry.rpc_base_delay_ms),
                ),
                config.protocol.epoch_length_secs,
            );
            let report = claimer.claim_due(epoch).await?;
            info!(claimed = report.claimed().len(), "claim pass complete");
            Ok(())
        }
    }
}

/// Redeem one bounty by id, mirroring the queue policy: refuse spent
/// bounties, report the wait on locked ones.
async fn claim_one(
    chain: &dyn ChainRpc,
    config: &medianet_config::Config,
    epoch: u32,
    id: BountyId,
) -> CliResult<()> {
    let lock = chain
        .get_bounty_lock(id)
        .await
        .map_err(|e| CliError::Rpc(e.to_string()))?;

    if lock.is_spent() {
        return Err(CliError::InvalidArgument(format!(
            "bounty {id} amount is 0, nothing to redeem"
        )));
    }

    let wait = lock.epochs_until_redeemable(epoch);
    if wait > 0 {
        let approx = seconds_to_readable(wait as u64 * config.protocol.epoch_length_secs);
        let plural = if wait == 1 { "epoch" } else { "epochs" };
        info!("cannot claim bounty yet, wait {wait} {plural} (approximately {approx})");
        return Ok(());
    }

    let tx = chain
        .redeem_bounty(id)
        .await
        .map_err(|e| CliError::Rpc(e.to_string()))?;
    chain
        .wait_for_confirmation(tx)
        .await
        .map_err(|e| CliError::Rpc(e.to_string()))?;
    info!(bounty_id = id, %tx, "bounty redeemed");
    Ok(())
}
