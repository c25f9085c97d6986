//! The main loop: one serial pass of work per sub-state window.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use medianet_core::{ChainRpc, EngineResult};
use medianet_types::Epoch;

use crate::bounty::BountyClaimer;
use crate::clock::{EpochClock, EpochState};
use crate::commit::Committer;
use crate::dispute::DisputeEngine;
use crate::propose::Proposer;
use crate::reveal::Revealer;

/// Drives the epoch state machine for one bound account.
///
/// Each sub-state does its work and finishes before the next window is
/// awaited; there is no cross-epoch pipelining. Errors are contained at
/// the sub-state boundary unless fatal. The shutdown signal is observed
/// between sub-states, so an in-flight dispute finishes before exit.
pub struct StakerLoop {
    clock: EpochClock,
    chain: Arc<dyn ChainRpc>,
    committer: Committer,
    revealer: Revealer,
    proposer: Proposer,
    disputer: DisputeEngine,
    claimer: BountyClaimer,
    shutdown: watch::Receiver<bool>,
    /// Epoch of our last accepted proposal, for the confirm-window
    /// reward claim.
    proposed_epoch: Option<Epoch>,
}

impl StakerLoop {
    /// Wire up the loop.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: EpochClock,
        chain: Arc<dyn ChainRpc>,
        committer: Committer,
        revealer: Revealer,
        proposer: Proposer,
        disputer: DisputeEngine,
        claimer: BountyClaimer,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            clock,
            chain,
            committer,
            revealer,
            proposer,
            disputer,
            claimer,
            shutdown,
            proposed_epoch: None,
        }
    }

    /// Run until shutdown is signalled or a fatal error occurs.
    pub async fn run(&mut self) -> EngineResult<()> {
        let (epoch, state) = self.clock.current();
        info!(epoch, %state, "staker loop started");

        // Handle the window we started inside, then walk boundaries.
        let mut next = Some((epoch, state));
        loop {
            if *self.shutdown.borrow() {
                info!("shutdown observed, exiting at sub-state boundary");
                return Ok(());
            }

            let (epoch, state) = match next.take() {
                Some(current) => current,
                None => self.clock.next_state().await,
            };
            if *self.shutdown.borrow() {
                info!("shutdown observed, exiting at sub-state boundary");
                return Ok(());
            }

            debug!(epoch, %state, "entering sub-state");
            if let Err(err) = self.dispatch(epoch, state).await {
                if err.is_fatal() {
                    error!(epoch, %state, error = %err, "fatal error, stopping");
                    return Err(err);
                }
                warn!(epoch, %state, error = %err, "sub-state abandoned");
            }
        }
    }

    async fn dispatch(&mut self, epoch: Epoch, state: EpochState) -> EngineResult<()> {
        match state {
            EpochState::Commit => {
                self.committer.run(epoch).await?;
            }
            EpochState::Reveal => {
                // The revealer works from the durable commit artifact,
                // so a restart between the two windows still reveals.
                self.revealer.run(epoch).await?;
            }
            EpochState::Propose => {
                if self.proposer.run(epoch).await?.is_some() {
                    self.proposed_epoch = Some(epoch);
                }
            }
            EpochState::Dispute => {
                self.disputer.run(epoch).await?;
                // Same scan window the dispute pass used; queue and
                // redeem opportunistically.
                self.claimer.record_new(epoch).await?;
                self.claimer.claim_due(epoch).await?;
            }
            EpochState::Confirm => {
                if self.proposed_epoch == Some(epoch) {
                    self.claim_block_reward(epoch).await;
                }
            }
        }
        Ok(())
    }

    /// Claim the proposer reward; losing the confirmation race to
    /// another block is normal and only logged.
    async fn claim_block_reward(&self, epoch: Epoch) {
        match self.chain.claim_block_reward().await {
            Ok(tx) => match self.chain.wait_for_confirmation(tx).await {
                Ok(()) => info!(epoch, %tx, "block reward claimed"),
                Err(err) => debug!(epoch, error = %err, "block reward not confirmed"),
            },
            Err(err) => debug!(epoch, error = %err, "no block reward this epoch"),
        }
    }
}

impl std::fmt::Debug for StakerLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StakerLoop")
            .field("proposed_epoch", &self.proposed_epoch)
            .finish()
    }
}

/// Convenience: a watch channel pair for shutdown signalling.
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}
