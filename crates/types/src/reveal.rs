//! Reveal-event aggregation and the influence-weighted median.
//!
//! During the reveal window every committed staker discloses their vote on
//! chain. Each honest client rebuilds the same canonical aggregates from
//! those events independently: the proposer uses them to build its block,
//! and the dispute engine uses them to check everyone else's. The three
//! maps carried here mirror the dispute contract's own bookkeeping, so a
//! `giveSorted` stream can be replayed straight out of
//! [`sorted_revealed_values`](RevealedDataMaps::sorted_revealed_values).

use std::collections::BTreeMap;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::{CollectionId, LeafId, StakerId};

/// One collection's value inside a staker's revealed vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedVote {
    /// Leaf position the value was committed under.
    pub leaf_id: LeafId,
    /// Collection the value belongs to.
    pub collection_id: CollectionId,
    /// The revealed value.
    pub value: U256,
}

/// A reveal log entry: one staker's disclosed vote plus their influence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealEvent {
    /// Revealing staker.
    pub staker_id: StakerId,
    /// The staker's vote weight at reveal time.
    pub influence: U256,
    /// Values revealed, one per collection the staker reported.
    pub values: Vec<AssignedVote>,
}

/// Canonical aggregates reconstructed from an epoch's reveal events.
///
/// Invariants (checked by [`validate`](Self::validate)):
/// - each `sorted_revealed_values` list is strictly ascending;
/// - `influence_sum[cid]` equals the sum of `vote_weights[v]` over that
///   collection's values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedDataMaps {
    /// Distinct revealed values per collection, ascending.
    pub sorted_revealed_values: BTreeMap<CollectionId, Vec<U256>>,
    /// Cumulative influence behind each revealed value.
    pub vote_weights: BTreeMap<U256, U256>,
    /// Total revealing influence per collection.
    pub influence_sum: BTreeMap<CollectionId, U256>,
}

impl RevealedDataMaps {
    /// Fold one reveal event into the aggregates.
    pub fn ingest(&mut self, event: &RevealEvent) {
        for vote in &event.values {
            let values = self
                .sorted_revealed_values
                .entry(vote.collection_id)
                .or_default();
            if let Err(pos) = values.binary_search(&vote.value) {
                values.insert(pos, vote.value);
            }

            let weight = self.vote_weights.entry(vote.value).or_default();
            *weight += event.influence;

            let sum = self.influence_sum.entry(vote.collection_id).or_default();
            *sum += event.influence;
        }
    }

    /// Build aggregates from a full set of reveal events.
    pub fn from_events(events: &[RevealEvent]) -> Self {
        let mut maps = Self::default();
        for event in events {
            maps.ingest(event);
        }
        maps
    }

    /// Collection ids that saw at least one reveal, ascending.
    pub fn revealed_collection_ids(&self) -> Vec<CollectionId> {
        self.sorted_revealed_values.keys().copied().collect()
    }

    /// Influence-weighted median of one collection.
    ///
    /// The median is the smallest revealed value whose cumulative weight
    /// reaches half the collection's total influence (integer half,
    /// truncated). Returns `None` for a collection nobody revealed.
    pub fn median(&self, collection_id: CollectionId) -> Option<U256> {
        let values = self.sorted_revealed_values.get(&collection_id)?;
        let total = self.influence_sum.get(&collection_id)?;
        let half = *total / U256::from(2u64);

        let mut accumulated = U256::ZERO;
        for value in values {
            accumulated += self.vote_weights.get(value).copied().unwrap_or_default();
            if accumulated >= half {
                return Some(*value);
            }
        }
        // Unreachable when the invariants hold; the last value's
        // cumulative weight is the full influence sum.
        values.last().copied()
    }

    /// Medians for every revealed collection, aligned with
    /// [`revealed_collection_ids`](Self::revealed_collection_ids).
    pub fn medians(&self) -> Vec<U256> {
        self.sorted_revealed_values
            .keys()
            .filter_map(|cid| self.median(*cid))
            .collect()
    }

    /// Check the structural invariants, returning a description of the
    /// first violation found.
    pub fn validate(&self) -> Result<(), String> {
        for (cid, values) in &self.sorted_revealed_values {
            if values.is_empty() {
                return Err(format!("collection {cid} has an empty value list"));
            }
            if !values.windows(2).all(|w| w[0] < w[1]) {
                return Err(format!("collection {cid} values are not strictly ascending"));
            }
            let mut weight_total = U256::ZERO;
            for value in values {
                match self.vote_weights.get(value) {
                    Some(w) => weight_total += *w,
                    None => return Err(format!("value {value} of collection {cid} has no weight")),
                }
            }
            let declared = self.influence_sum.get(cid).copied().unwrap_or_default();
            if weight_total < declared {
                return Err(format!(
                    "collection {cid} influence sum {declared} exceeds the weight total {weight_total}"
                ));
            }
        }
        for cid in self.influence_sum.keys() {
            if !self.sorted_revealed_values.contains_key(cid) {
                return Err(format!("influence recorded for unrevealed collection {cid}"));
            }
        }
        Ok(())
    }
}
