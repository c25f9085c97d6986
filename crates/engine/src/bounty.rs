//! Bounty claimer: queue granted bounties, redeem them once their lock
//! passes.

use std::sync::Arc;

use alloy_primitives::Address;
use tracing::{debug, info, warn};

use medianet_core::{ChainRpc, Clock, EngineError, EngineResult, Retry, Store};
use medianet_types::{BountyId, Epoch};

/// What happened to one queued bounty during a claim pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Redeemed and removed from the queue.
    Claimed(BountyId),
    /// Still locked; claimable in the given number of epochs.
    Waiting {
        /// The locked bounty.
        id: BountyId,
        /// Whole epochs to wait.
        epochs: Epoch,
    },
    /// Amount was already zero; dropped as claimed elsewhere.
    AlreadySpent(BountyId),
}

/// Result of one claim pass over the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimReport {
    /// Per-bounty outcomes, in queue order.
    pub outcomes: Vec<ClaimOutcome>,
}

impl ClaimReport {
    /// Ids redeemed this pass.
    pub fn claimed(&self) -> Vec<BountyId> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                ClaimOutcome::Claimed(id) => Some(*id),
                _ => None,
            })
            .collect()
    }
}

/// Scans for granted bounties and redeems matured ones.
pub struct BountyClaimer {
    chain: Arc<dyn ChainRpc>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    address: Address,
    retry: Retry,
    epoch_length: u64,
}

impl BountyClaimer {
    /// Wire up a claimer for the given account.
    pub fn new(
        chain: Arc<dyn ChainRpc>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        address: Address,
        retry: Retry,
        epoch_length: u64,
    ) -> Self {
        Self {
            chain,
            store,
            clock,
            address,
            retry,
            epoch_length,
        }
    }

    /// Scan the epoch's bounty events and append new ids to the queue.
    pub async fn record_new(&self, epoch: Epoch) -> EngineResult<usize> {
        let from_block = self
            .retry
            .run(self.clock.as_ref(), "epoch start block", || {
                self.chain.epoch_start_block(epoch)
            })
            .await
            .map_err(EngineError::from)?;
        let granted = self
            .retry
            .run(self.clock.as_ref(), "bounty events", || {
                self.chain.bounty_events(from_block, self.address)
            })
            .await
            .map_err(EngineError::from)?;
        if granted.is_empty() {
            return Ok(0);
        }

        let mut file = self.store.read_dispute()?.unwrap_or_default();
        let mut added = 0;
        for id in granted {
            if file.push_bounty(id) {
                added += 1;
            }
        }
        if added > 0 {
            self.store.write_dispute(&file)?;
            info!(epoch, added, "new bounties queued");
        }
        Ok(added)
    }

    /// Walk the queue in FIFO order: drop spent bounties, redeem matured
    /// ones, keep the rest with their remaining wait.
    pub async fn claim_due(&self, current_epoch: Epoch) -> EngineResult<ClaimReport> {
        let Some(mut file) = self.store.read_dispute()? else {
            return Ok(ClaimReport::default());
        };

        let queue: Vec<BountyId> = file.bounty_id_queue.iter().copied().collect();
        let mut report = ClaimReport::default();
        let mut changed = false;

        for id in queue {
            let lock = match self
                .retry
                .run(self.clock.as_ref(), "bounty lock", || {
                    self.chain.get_bounty_lock(id)
                })
                .await
            {
                Ok(lock) => lock,
                Err(err) => {
                    warn!(bounty_id = id, error = %err, "cannot read bounty lock, keeping queued");
                    continue;
                }
            };

            if lock.is_spent() {
                debug!(bounty_id = id, "bounty already spent, dropping");
                file.remove_bounty(id);
                changed = true;
                report.outcomes.push(ClaimOutcome::AlreadySpent(id));
                continue;
            }

            let wait = lock.epochs_until_redeemable(current_epoch);
            if wait > 0 {
                info!(
                    bounty_id = id,
                    wait_epochs = wait,
                    approx = %seconds_to_readable(wait as u64 * self.epoch_length),
                    "bounty still locked"
                );
                report.outcomes.push(ClaimOutcome::Waiting { id, epochs: wait });
                continue;
            }

            match self.redeem(id).await {
                Ok(()) => {
                    info!(bounty_id = id, "bounty redeemed");
                    file.remove_bounty(id);
                    changed = true;
                    report.outcomes.push(ClaimOutcome::Claimed(id));
                }
                Err(err) => {
                    warn!(bounty_id = id, error = %err, "redeem failed, keeping queued");
                }
            }
        }

        if changed {
            self.store.write_dispute(&file)?;
        }
        Ok(report)
    }

    async fn redeem(&self, id: BountyId) -> EngineResult<()> {
        let tx = self
            .retry
            .run(self.clock.as_ref(), "redeem bounty", || {
                self.chain.redeem_bounty(id)
            })
            .await
            .map_err(EngineError::from)?;
        self.chain
            .wait_for_confirmation(tx)
            .await
            .map_err(EngineError::from)
    }
}

/// Render a duration in seconds as a rough human-readable string.
pub fn seconds_to_readable(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}
