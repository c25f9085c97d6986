//! The `vote` command: the full epoch loop for one account.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use medianet_core::{ChainRpc, Clock, Retry, Signer, Store, SystemClock};
use medianet_engine::{
    shutdown_channel, BountyClaimer, Committer, DisputeEngine, EpochClock, Proposer, Revealer,
    StakerLoop,
};
use medianet_fetch::{Aggregator, HttpFetcher};
use medianet_store::FileStore;

use crate::utils::{connect_chain, load_config, obtain_signer, CliError, CliResult};

/// Arguments for the vote command
#[derive(Parser, Debug)]
pub struct VoteArgs {}

/// Run the staker loop until interrupted.
pub async fn execute(
    _args: VoteArgs,
    config_path: &Option<PathBuf>,
    key_file: &Option<PathBuf>,
) -> CliResult<()> {
    let config = load_config(config_path)?;
    let signer = obtain_signer(key_file)?;
    let address = signer.address();

    let chain: Arc<dyn ChainRpc> = connect_chain(&config, Arc::clone(&signer))?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn Store> = Arc::new(
        FileStore::open(&config.staker.data_dir, address)
            .map_err(|e| CliError::Engine(e.to_string()))?,
    );

    let fetcher = HttpFetcher::new(
        Duration::from_secs(config.fetch.http_timeout_secs),
        config.fetch.attempts,
        Duration::from_secs(config.fetch.retry_delay_secs),
        Arc::clone(&clock),
    )
    .map_err(|e| CliError::Rpc(e.to_string()))?;
    let aggregator = Aggregator::new(Arc::new(fetcher), config.fetch.max_concurrency);

    let rpc_retry = Retry::exponential(
        config.retry.rpc_attempts,
        Duration::from_millis(config.retry.rpc_base_delay_ms),
    );
    let epoch_clock = EpochClock::init(
        chain.as_ref(),
        Arc::clone(&clock),
        config.protocol.epoch_length_secs,
        rpc_retry,
    )
    .await?;

    let committer = Committer::new(
        Arc::clone(&chain),
        Arc::clone(&store),
        Arc::clone(&clock),
        aggregator,
        rpc_retry,
    );
    let revealer = Revealer::new(
        Arc::clone(&chain),
        Arc::clone(&store),
        Arc::clone(&clock),
        rpc_retry,
    );
    let proposer = Proposer::new(
        Arc::clone(&chain),
        Arc::clone(&store),
        Arc::clone(&clock),
        address,
        rpc_retry,
        config.protocol.max_propose_iterations,
    );
    let disputer = DisputeEngine::new(
        Arc::clone(&chain),
        Arc::clone(&store),
        Arc::clone(&clock),
        address,
        rpc_retry,
        config.gas.dispute_gas_multiplier,
    );
    let claimer = BountyClaimer::new(
        Arc::clone(&chain),
        Arc::clone(&store),
        Arc::clone(&clock),
        address,
        rpc_retry,
        config.protocol.epoch_length_secs,
    );

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping at the next sub-state boundary");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut staker_loop = StakerLoop::new(
        epoch_clock,
        chain,
        committer,
        revealer,
        proposer,
        disputer,
        claimer,
        shutdown_rx,
    );
    staker_loop.run().await?;
    Ok(())
}
