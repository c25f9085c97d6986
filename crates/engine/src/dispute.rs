//! Dispute stage: verify every proposed block, dispute the first
//! violation found.
//!
//! The engine re-derives the canonical aggregates from chain reveal
//! events, never from its own propose artifact, so every honest client
//! reaches the same verdicts independently. Per block the checks run in
//! a fixed priority and the first hit decides the dispute class; later
//! classes are not evaluated:
//!
//! 1. `biggest_stake` disagrees with the chain-derived maximum;
//! 2. the id list is out of order, missing a revealed id, or carrying an
//!    unrevealed one;
//! 3. a median disagrees with the canonical value, which requires
//!    streaming the collection's sorted reveals (`giveSorted`) before
//!    `finalizeDispute`.
//!
//! Blocks are visited in an order shuffled per staker so concurrent
//! disputers spread across blocks instead of racing the first one. A
//! block whose on-chain dispute record is already non-zero is skipped
//! silently. One successful dispute per block is enough.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{keccak256, Address, B256, U256};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::{debug, info, warn};

use medianet_core::{ChainError, ChainRpc, Clock, EngineError, EngineResult, Retry, Store};
use medianet_types::{
    BlockId, CollectionId, Epoch, ProposedBlock, RevealedDataMaps, StakerId,
};

/// First `giveSorted` batch size; halved on gas-limit reverts, down to 1.
pub const INITIAL_GIVE_SORTED_BATCH: usize = 20;

/// Largest randomized delay before a median dispute's first batch, to
/// spread concurrent disputers (milliseconds).
const GIVE_SORTED_JITTER_MS: u64 = 500;

/// What a dispute pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisputeSummary {
    /// Blocks examined this pass.
    pub blocks_checked: usize,
    /// Disputes successfully submitted.
    pub disputes_submitted: usize,
}

/// The id-list violation classes, in detection order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum IdsViolation {
    /// First adjacent pair out of ascending order.
    Order { index0: usize, index1: usize },
    /// A revealed collection id the block omits.
    Missing { id: CollectionId },
    /// An id the block carries that nobody revealed.
    Extra { id: CollectionId, position: u16 },
}

/// Find the first id-list violation, if any.
fn check_ids(canonical: &[CollectionId], block_ids: &[CollectionId]) -> Option<IdsViolation> {
    if let Some(index0) = block_ids.windows(2).position(|w| w[0] >= w[1]) {
        return Some(IdsViolation::Order {
            index0,
            index1: index0 + 1,
        });
    }

    let block_set: BTreeSet<CollectionId> = block_ids.iter().copied().collect();
    if let Some(id) = canonical.iter().find(|id| !block_set.contains(id)) {
        return Some(IdsViolation::Missing { id: *id });
    }

    let canonical_set: BTreeSet<CollectionId> = canonical.iter().copied().collect();
    if let Some((position, id)) = block_ids
        .iter()
        .enumerate()
        .find(|(_, id)| !canonical_set.contains(id))
    {
        return Some(IdsViolation::Extra {
            id: *id,
            position: position as u16,
        });
    }

    None
}

/// The dispute engine.
pub struct DisputeEngine {
    chain: Arc<dyn ChainRpc>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    address: Address,
    retry: Retry,
    gas_multiplier: f64,
    initial_batch: usize,
}

impl DisputeEngine {
    /// Wire up a dispute engine for the given account.
    pub fn new(
        chain: Arc<dyn ChainRpc>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        address: Address,
        retry: Retry,
        gas_multiplier: f64,
    ) -> Self {
        Self {
            chain,
            store,
            clock,
            address,
            retry,
            gas_multiplier,
            initial_batch: INITIAL_GIVE_SORTED_BATCH,
        }
    }

    /// Override the initial `giveSorted` batch size.
    pub fn with_initial_batch(mut self, batch: usize) -> Self {
        self.initial_batch = batch.max(1);
        self
    }

    /// Run the dispute pass for `epoch`.
    pub async fn run(&self, epoch: Epoch) -> EngineResult<DisputeSummary> {
        let chain_epoch = self
            .retry
            .run(self.clock.as_ref(), "read chain epoch", || {
                self.chain.get_epoch()
            })
            .await
            .map_err(EngineError::from)?;
        if chain_epoch != epoch {
            return Err(EngineError::StateMismatch {
                local: epoch,
                chain: chain_epoch,
            });
        }

        // Canonical aggregates. Any failure here aborts the pass: an
        // uncertain dispute must never be submitted.
        let events = self
            .retry
            .run(self.clock.as_ref(), "reveal events", || {
                self.chain.reveal_events(epoch)
            })
            .await
            .map_err(|e| EngineError::skip(epoch, format!("cannot derive canonical data: {e}")))?;
        let maps = RevealedDataMaps::from_events(&events);
        maps.validate()
            .map_err(|e| EngineError::skip(epoch, format!("canonical data inconsistent: {e}")))?;
        let canonical_ids = maps.revealed_collection_ids();
        let canonical_medians = maps.medians();
        let biggest_stake = self
            .chain_biggest_stake(&events)
            .await
            .map_err(|e| EngineError::skip(epoch, format!("cannot derive biggest stake: {e}")))?;

        // A previous run may have died mid-stream; clear that state
        // before replaying anything.
        self.reset(epoch).await;

        let block_ids = self
            .retry
            .run(self.clock.as_ref(), "sorted proposed block ids", || {
                self.chain.get_sorted_proposed_block_ids(epoch)
            })
            .await
            .map_err(|e| EngineError::skip(epoch, format!("cannot list proposed blocks: {e}")))?;

        let mut order = block_ids;
        let mut rng = ChaCha20Rng::from_seed(self.shuffle_seed(epoch));
        order.shuffle(&mut rng);

        let mut summary = DisputeSummary::default();
        for block_id in order {
            summary.blocks_checked += 1;

            let block = match self.chain.get_proposed_block(epoch, block_id).await {
                Ok(block) => block,
                Err(err) => {
                    warn!(epoch, block_id, error = %err, "cannot read proposed block");
                    continue;
                }
            };
            if !block.valid {
                debug!(epoch, block_id, "block already invalid, skipping");
                continue;
            }
            match self.chain.get_dispute(epoch, block_id).await {
                Ok(record) if record.in_progress() => {
                    debug!(epoch, block_id, "already under dispute, skipping");
                    continue;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(epoch, block_id, error = %err, "cannot read dispute record");
                    continue;
                }
            }

            let disputed = match self
                .verify_block(
                    epoch,
                    block_id,
                    &block,
                    &canonical_ids,
                    &canonical_medians,
                    biggest_stake.0,
                    biggest_stake.1,
                    &maps,
                )
                .await
            {
                Ok(disputed) => disputed,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(epoch, block_id, error = %err, "dispute attempt failed");
                    continue;
                }
            };

            if disputed {
                summary.disputes_submitted += 1;
                if let Err(err) = self.record_bounties(epoch).await {
                    if err.is_fatal() {
                        return Err(err);
                    }
                    warn!(epoch, error = %err, "bounty recording failed");
                }
            }
        }

        // PickNext exhausted → Reset → End.
        self.reset(epoch).await;
        info!(
            epoch,
            checked = summary.blocks_checked,
            disputed = summary.disputes_submitted,
            "dispute pass complete"
        );
        Ok(summary)
    }

    /// Check one block in priority order and submit at most one dispute.
    /// Returns true if a dispute was submitted and confirmed.
    #[allow(clippy::too_many_arguments)]
    async fn verify_block(
        &self,
        epoch: Epoch,
        block_id: BlockId,
        block: &ProposedBlock,
        canonical_ids: &[CollectionId],
        canonical_medians: &[U256],
        biggest_stake: U256,
        biggest_stake_id: StakerId,
        maps: &RevealedDataMaps,
    ) -> EngineResult<bool> {
        // Class 1: biggest stake.
        if block.biggest_stake != biggest_stake {
            info!(
                epoch,
                block_id,
                claimed = %block.biggest_stake,
                actual = %biggest_stake,
                "biggest stake mismatch"
            );
            return self
                .submit_and_confirm("disputeBiggestStakeProposed", || {
                    self.chain
                        .dispute_biggest_stake_proposed(epoch, block_id, biggest_stake_id)
                })
                .await;
        }

        // Class 2: the id set.
        if let Some(violation) = check_ids(canonical_ids, &block.ids) {
            info!(epoch, block_id, ?violation, "collection id violation");
            return match violation {
                IdsViolation::Order { index0, index1 } => {
                    self.submit_and_confirm("disputeOnOrderOfIds", || {
                        self.chain
                            .dispute_on_order_of_ids(epoch, block_id, index0, index1)
                    })
                    .await
                }
                IdsViolation::Missing { id } => {
                    let gas = self.bumped_gas("disputeCollectionIdShouldBePresent").await;
                    self.submit_and_confirm("disputeCollectionIdShouldBePresent", || {
                        self.chain
                            .dispute_collection_id_should_be_present(epoch, block_id, id, gas)
                    })
                    .await
                }
                IdsViolation::Extra { id, position } => {
                    let gas = self.bumped_gas("disputeCollectionIdShouldBeAbsent").await;
                    self.submit_and_confirm("disputeCollectionIdShouldBeAbsent", || {
                        self.chain.dispute_collection_id_should_be_absent(
                            epoch,
                            block_id,
                            id,
                            position,
                            gas,
                        )
                    })
                    .await
                }
            };
        }

        // Class 3: medians. Ids are exactly canonical here, so indices
        // line up.
        for (position, (claimed, canonical)) in
            block.medians.iter().zip(canonical_medians).enumerate()
        {
            if claimed != canonical {
                info!(
                    epoch,
                    block_id,
                    position,
                    %claimed,
                    %canonical,
                    "median mismatch"
                );
                let collection_id = block.ids[position];
                return self
                    .dispute_median(epoch, block_id, position as u16, collection_id, maps)
                    .await;
            }
        }

        debug!(epoch, block_id, "block checks out");
        Ok(false)
    }

    /// Median dispute: stream the sorted reveals, then finalize.
    async fn dispute_median(
        &self,
        epoch: Epoch,
        block_id: BlockId,
        position_in_block: u16,
        collection_id: CollectionId,
        maps: &RevealedDataMaps,
    ) -> EngineResult<bool> {
        let values = match maps.sorted_revealed_values.get(&collection_id) {
            Some(values) if !values.is_empty() => values.clone(),
            _ => return Ok(false),
        };

        // Short randomized delay so concurrent disputers do not all pay
        // for the same resetDispute when racing one block.
        let jitter = rand::thread_rng().gen_range(0..GIVE_SORTED_JITTER_MS);
        self.clock.sleep(Duration::from_millis(jitter)).await;

        if self
            .give_sorted_stream(epoch, collection_id, &values)
            .await
            .is_err()
        {
            // Partial stream state must not leak into the next attempt.
            self.reset(epoch).await;
            return Ok(false);
        }

        self.submit_and_confirm("finalizeDispute", || {
            self.chain
                .finalize_dispute(epoch, block_id, position_in_block)
        })
        .await
    }

    /// Stream `values` in ascending batches. Halves the batch size on
    /// gas-limit reverts (down to 1, then gives up); transient errors
    /// replay from the last accepted index, never re-sending an accepted
    /// value.
    async fn give_sorted_stream(
        &self,
        epoch: Epoch,
        collection_id: CollectionId,
        values: &[U256],
    ) -> Result<(), ()> {
        let mut batch = self.initial_batch;
        let mut sent = 0usize;
        let mut attempts_at_index = 0u32;

        while sent < values.len() {
            let end = (sent + batch).min(values.len());
            let outcome = match self
                .chain
                .give_sorted(epoch, collection_id, &values[sent..end])
                .await
            {
                Ok(tx) => self.chain.wait_for_confirmation(tx).await,
                Err(err) => Err(err),
            };

            match outcome {
                Ok(()) => {
                    debug!(
                        epoch,
                        collection_id,
                        from = sent,
                        to = end,
                        "sorted batch accepted"
                    );
                    sent = end;
                    attempts_at_index = 0;
                }
                Err(err) if err.is_gas_limit() => {
                    if batch == 1 {
                        warn!(epoch, collection_id, "gas limit at batch size 1, giving up");
                        return Err(());
                    }
                    batch = (batch / 2).max(1);
                    debug!(epoch, collection_id, batch, "halving sorted batch");
                }
                Err(err) if err.is_benign() => {
                    debug!(epoch, collection_id, error = %err, "stream superseded");
                    return Err(());
                }
                Err(err) => {
                    attempts_at_index += 1;
                    if attempts_at_index >= self.retry.attempts {
                        warn!(epoch, collection_id, error = %err, "sorted stream exhausted");
                        return Err(());
                    }
                    warn!(
                        epoch,
                        collection_id,
                        attempt = attempts_at_index,
                        error = %err,
                        "sorted batch failed, replaying from last accepted index"
                    );
                    self.clock.sleep(self.retry.delay).await;
                }
            }
        }
        Ok(())
    }

    /// Submit one dispute transaction and wait for it. Benign reverts
    /// and transient failures end the attempt without poisoning the
    /// pass.
    async fn submit_and_confirm<F, Fut>(&self, what: &str, op: F) -> EngineResult<bool>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<B256, ChainError>>,
    {
        let submitted = self.retry.run(self.clock.as_ref(), what, &op).await;
        match submitted {
            Ok(tx) => match self.chain.wait_for_confirmation(tx).await {
                Ok(()) => {
                    info!(what, %tx, "dispute confirmed");
                    Ok(true)
                }
                Err(err) if err.is_benign() => {
                    debug!(what, error = %err, "dispute superseded");
                    Ok(false)
                }
                Err(err) => {
                    warn!(what, error = %err, "dispute not confirmed");
                    Ok(false)
                }
            },
            Err(err) if err.is_benign() => {
                debug!(what, error = %err, "dispute superseded");
                Ok(false)
            }
            Err(err) => {
                warn!(what, error = %err, "dispute submission failed");
                Ok(false)
            }
        }
    }

    /// Node gas estimate times the configured multiplier, capped at the
    /// block gas limit. The id-presence dispute calls under-estimate
    /// consistently; without the bump they revert. Falls back to the
    /// node default when no estimate is available.
    async fn bumped_gas(&self, method: &str) -> Option<u64> {
        let estimate = match self.chain.estimate_gas(method).await {
            Ok(estimate) => estimate,
            Err(err) => {
                warn!(method, error = %err, "gas estimate unavailable");
                return None;
            }
        };
        let limit = match self.chain.block_gas_limit().await {
            Ok(limit) => limit,
            Err(err) => {
                warn!(method, error = %err, "block gas limit unavailable");
                return None;
            }
        };
        let bumped = (estimate as f64 * self.gas_multiplier) as u64;
        Some(bumped.min(limit))
    }

    /// Largest stake among the epoch's revealers.
    async fn chain_biggest_stake(
        &self,
        events: &[medianet_types::RevealEvent],
    ) -> Result<(U256, StakerId), ChainError> {
        let revealers: BTreeSet<StakerId> = events.iter().map(|e| e.staker_id).collect();
        let mut biggest = (U256::ZERO, 0);
        for id in revealers {
            let staker = self.chain.get_staker(id).await?;
            if staker.stake > biggest.0 {
                biggest = (staker.stake, id);
            }
        }
        Ok(biggest)
    }

    /// Queue any bounties the chain has granted us this epoch.
    async fn record_bounties(&self, epoch: Epoch) -> EngineResult<()> {
        let from_block = self
            .chain
            .epoch_start_block(epoch)
            .await
            .map_err(EngineError::from)?;
        let granted = self
            .chain
            .bounty_events(from_block, self.address)
            .await
            .map_err(EngineError::from)?;
        if granted.is_empty() {
            return Ok(());
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
            info!(epoch, added, "bounties queued");
        }
        Ok(())
    }

    /// Clear partial on-chain dispute state. Errors here are harmless
    /// (usually "nothing to reset") and only logged.
    async fn reset(&self, epoch: Epoch) {
        match self.chain.reset_dispute(epoch).await {
            Ok(_) => debug!(epoch, "dispute state reset"),
            Err(err) => debug!(epoch, error = %err, "reset not needed"),
        }
    }

    /// Per-staker deterministic shuffle seed.
    fn shuffle_seed(&self, epoch: Epoch) -> [u8; 32] {
        let mut preimage = Vec::with_capacity(32 + 20);
        preimage.extend_from_slice(&U256::from(epoch).to_be_bytes::<32>());
        preimage.extend_from_slice(self.address.as_slice());
        keccak256(&preimage).0
    }
}

/// Expose the shuffle for tests that need to predict the visit order.
#[doc(hidden)]
pub fn shuffled_visit_order(epoch: Epoch, address: Address, block_ids: &[BlockId]) -> Vec<BlockId> {
    let mut order = block_ids.to_vec();
    let mut preimage = Vec::with_capacity(32 + 20);
    preimage.extend_from_slice(&U256::from(epoch).to_be_bytes::<32>());
    preimage.extend_from_slice(address.as_slice());
    let mut rng = ChaCha20Rng::from_seed(keccak256(&preimage).0);
    order.shuffle(&mut rng);
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_matching_ids_pass() {
        assert_eq!(check_ids(&[1, 2, 3], &[1, 2, 3]), None);
        assert_eq!(check_ids(&[], &[]), None);
    }

    #[test]
    fn descending_pair_is_found_first() {
        // Order violations outrank missing/extra ids.
        assert_eq!(
            check_ids(&[1, 2, 3], &[1, 3, 2]),
            Some(IdsViolation::Order {
                index0: 1,
                index1: 2
            })
        );
    }

    #[test]
    fn duplicate_adjacent_ids_violate_strict_ascent() {
        assert_eq!(
            check_ids(&[1, 2], &[1, 1, 2]),
            Some(IdsViolation::Order {
                index0: 0,
                index1: 1
            })
        );
    }

    #[test]
    fn missing_id_is_reported() {
        assert_eq!(
            check_ids(&[1, 2, 3], &[1, 2, 4]),
            Some(IdsViolation::Missing { id: 3 })
        );
    }

    #[test]
    fn extra_id_reports_its_position() {
        assert_eq!(
            check_ids(&[1, 2, 3], &[1, 2, 3, 4]),
            Some(IdsViolation::Extra { id: 4, position: 3 })
        );
    }

    #[test]
    fn missing_outranks_extra() {
        // Block [1,2,4] vs canonical [1,2,3]: 3 is missing AND 4 is
        // extra; the missing check fires first.
        assert_eq!(
            check_ids(&[1, 2, 3], &[1, 2, 4]),
            Some(IdsViolation::Missing { id: 3 })
        );
    }

    #[test]
    fn shuffle_is_deterministic_per_staker() {
        let address = Address::repeat_byte(0xaa);
        let ids = [10, 11, 12, 13, 14];
        let a = shuffled_visit_order(4, address, &ids);
        let b = shuffled_visit_order(4, address, &ids);
        assert_eq!(a, b);

        // The visit order is a permutation: every block id exactly once.
        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, ids);
    }
}
