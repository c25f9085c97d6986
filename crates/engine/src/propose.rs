//! Propose stage: election test and block assembly.
//!
//! Election is a bounded search for the smallest `iteration` whose
//! pseudo-random draw lands under the staker's stake:
//!
//! ```text
//! keccak256(staker_id ‖ iteration ‖ salt) mod biggest_stake < stake
//! ```
//!
//! which elects with probability `stake / biggest_stake` per iteration.
//! An elected proposer rebuilds the canonical aggregates from the
//! epoch's reveal events, persists the `ProposeFile`, and only then
//! broadcasts the proposal; the dispute pass depends on that file being
//! on disk.

use std::collections::BTreeSet;
use std::sync::Arc;

use alloy_primitives::{keccak256, Address, B256, U256};
use tracing::{debug, info};

use medianet_core::{ChainRpc, Clock, EngineError, EngineResult, Retry, Store};
use medianet_types::{Epoch, ProposeFile, RevealEvent, RevealedDataMaps, StakerId};

/// Word width used in the election preimage.
const WORD: usize = 32;

/// Find the smallest election iteration for this staker, if any exists
/// within the search bound.
pub fn election_iteration(
    staker_id: StakerId,
    salt: B256,
    stake: U256,
    biggest_stake: U256,
    max_iterations: u64,
) -> Option<u64> {
    if biggest_stake == U256::ZERO || stake == U256::ZERO {
        return None;
    }
    (0..max_iterations).find(|iteration| {
        let mut preimage = Vec::with_capacity(WORD * 3);
        preimage.extend_from_slice(&U256::from(staker_id).to_be_bytes::<WORD>());
        preimage.extend_from_slice(&U256::from(*iteration).to_be_bytes::<WORD>());
        preimage.extend_from_slice(salt.as_slice());
        let draw = U256::from_be_bytes::<WORD>(keccak256(&preimage).0);
        draw % biggest_stake < stake
    })
}

/// Outcome of a successful proposal.
#[derive(Debug, Clone)]
pub struct Proposal {
    /// Broadcast transaction hash.
    pub tx: B256,
    /// Winning election iteration.
    pub iteration: u64,
}

/// Runs the propose stage when this staker wins the election.
pub struct Proposer {
    chain: Arc<dyn ChainRpc>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    address: Address,
    retry: Retry,
    max_iterations: u64,
}

impl Proposer {
    /// Wire up a proposer for the given account.
    pub fn new(
        chain: Arc<dyn ChainRpc>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        address: Address,
        retry: Retry,
        max_iterations: u64,
    ) -> Self {
        Self {
            chain,
            store,
            clock,
            address,
            retry,
            max_iterations,
        }
    }

    /// Run the propose stage. Returns `None` when not elected or when
    /// there is nothing to propose.
    pub async fn run(&self, epoch: Epoch) -> EngineResult<Option<Proposal>> {
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

        let staker_id = self
            .retry
            .run(self.clock.as_ref(), "staker id", || {
                self.chain.get_staker_id(self.address)
            })
            .await
            .map_err(EngineError::from)?;
        let staker = self
            .retry
            .run(self.clock.as_ref(), "staker", || {
                self.chain.get_staker(staker_id)
            })
            .await
            .map_err(EngineError::from)?;

        let events = self
            .retry
            .run(self.clock.as_ref(), "reveal events", || {
                self.chain.reveal_events(epoch)
            })
            .await
            .map_err(EngineError::from)?;
        if events.is_empty() {
            debug!(epoch, "nobody revealed, nothing to propose");
            return Ok(None);
        }

        let (biggest_stake, biggest_stake_id) = self.biggest_stake(&events).await?;
        let salt = self
            .retry
            .run(self.clock.as_ref(), "salt", || self.chain.get_salt())
            .await
            .map_err(EngineError::from)?;

        let iteration = match election_iteration(
            staker_id,
            salt,
            staker.stake,
            biggest_stake,
            self.max_iterations,
        ) {
            Some(iteration) => iteration,
            None => {
                debug!(epoch, staker_id, "not elected this epoch");
                return Ok(None);
            }
        };

        let maps = RevealedDataMaps::from_events(&events);
        let ids = maps.revealed_collection_ids();
        let medians = maps.medians();

        let file = ProposeFile {
            epoch,
            medians: medians.clone(),
            revealed_collection_ids: ids.clone(),
            revealed_data: maps,
        };
        // Durable before broadcast.
        self.store.write_propose(&file)?;

        let tx = self
            .retry
            .run(self.clock.as_ref(), "propose", || {
                self.chain
                    .propose(epoch, &ids, &medians, iteration, biggest_stake_id)
            })
            .await
            .map_err(EngineError::from)?;
        self.chain
            .wait_for_confirmation(tx)
            .await
            .map_err(EngineError::from)?;

        info!(
            epoch,
            staker_id,
            iteration,
            collections = ids.len(),
            %tx,
            "block proposed"
        );
        Ok(Some(Proposal { tx, iteration }))
    }

    /// Largest stake among this epoch's revealers, with its staker id.
    pub(crate) async fn biggest_stake(
        &self,
        events: &[RevealEvent],
    ) -> EngineResult<(U256, StakerId)> {
        let revealers: BTreeSet<StakerId> = events.iter().map(|e| e.staker_id).collect();
        let mut biggest = (U256::ZERO, 0);
        for id in revealers {
            let staker = self
                .retry
                .run(self.clock.as_ref(), "staker", || self.chain.get_staker(id))
                .await
                .map_err(EngineError::from)?;
            if staker.stake > biggest.0 {
                biggest = (staker.stake, id);
            }
        }
        Ok(biggest)
    }
}
