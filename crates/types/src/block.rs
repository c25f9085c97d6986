//! Proposed blocks and staker records as read from the chain.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{CollectionId, StakerId};

/// A block proposed on chain for the current epoch.
///
/// Read-only to the client: the dispute engine compares each proposed
/// block against the canonical aggregates it derives independently from
/// the epoch's reveal events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedBlock {
    /// Staker who proposed the block.
    pub proposer_id: StakerId,
    /// Collection ids the block claims were revealed, in the order the
    /// proposer submitted them. Must be strictly ascending to be valid.
    pub ids: Vec<CollectionId>,
    /// Claimed influence-weighted median per collection, aligned with
    /// [`ids`](Self::ids).
    pub medians: Vec<U256>,
    /// Election iteration the proposer claims.
    pub iteration: u64,
    /// Largest revealer stake the proposer observed.
    pub biggest_stake: U256,
    /// Whether the contract still considers the block valid. Invalid
    /// blocks are already rejected on chain and need no dispute.
    pub valid: bool,
}

/// A registered staker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staker {
    /// On-chain staker id.
    pub id: StakerId,
    /// Controlling address.
    pub address: Address,
    /// Current stake.
    pub stake: U256,
}

/// On-chain dispute progress for one `(epoch, block id)` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeRecord {
    /// Last value accepted by the dispute contract's sorted stream.
    /// Non-zero means someone is already part-way through a dispute of
    /// this block and it should be skipped.
    pub last_visited_value: U256,
}

impl DisputeRecord {
    /// True if a dispute of this block is already underway.
    pub fn in_progress(&self) -> bool {
        self.last_visited_value != U256::ZERO
    }
}
