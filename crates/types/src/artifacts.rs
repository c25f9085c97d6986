//! On-disk artifacts persisted between epoch sub-states.
//!
//! Each file is written durably *before* the transaction it backs is
//! broadcast, so a crash between the two leaves enough on disk to resume:
//! a commit already on chain can still be revealed, and a proposed block
//! can still be defended. Validation here is structural; a file that fails
//! it is corrupt and must never be silently overwritten.

use std::collections::VecDeque;

use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    reveal::RevealedDataMaps,
    vote::vote_commitment,
    BountyId, CollectionId, Epoch,
};

/// Structural violations detected when reading an artifact back.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The stored commitment does not match the stored vote.
    #[error("commitment does not match the stored vote for epoch {epoch}")]
    CommitmentMismatch {
        /// Epoch the file claims.
        epoch: Epoch,
    },

    /// Medians and collection ids have different lengths.
    #[error("{medians} medians for {ids} revealed collection ids")]
    LengthMismatch {
        /// Number of medians stored.
        medians: usize,
        /// Number of revealed collection ids stored.
        ids: usize,
    },

    /// Revealed collection ids are not strictly ascending.
    #[error("revealed collection ids are not strictly ascending")]
    UnsortedCollectionIds,

    /// The reveal maps violate their own invariants.
    #[error("reveal maps invalid: {0}")]
    RevealMaps(String),

    /// The bounty queue contains a duplicate id.
    #[error("duplicate bounty id {0} in queue")]
    DuplicateBounty(BountyId),
}

/// Artifact written during the commit window, required at reveal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitFile {
    /// Epoch the vote was committed in.
    pub epoch: Epoch,
    /// Commitment hash broadcast on chain.
    pub commitment: B256,
    /// Vote values in leaf order, one per active collection.
    pub values: Vec<U256>,
    /// The vote secret.
    pub secret: B256,
}

impl CommitFile {
    /// Check that the stored commitment seals the stored vote.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if vote_commitment(self.epoch, &self.values, &self.secret) != self.commitment {
            return Err(ArtifactError::CommitmentMismatch { epoch: self.epoch });
        }
        Ok(())
    }
}

/// Artifact written by an elected proposer, required by the dispute pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposeFile {
    /// Epoch the block was proposed in.
    pub epoch: Epoch,
    /// Influence-weighted median per revealed collection.
    pub medians: Vec<U256>,
    /// Revealed collection ids, strictly ascending.
    pub revealed_collection_ids: Vec<CollectionId>,
    /// The canonical aggregates the medians were derived from.
    pub revealed_data: RevealedDataMaps,
}

impl ProposeFile {
    /// Check the structural invariants: aligned lengths, ascending ids,
    /// and internally consistent reveal maps.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.medians.len() != self.revealed_collection_ids.len() {
            return Err(ArtifactError::LengthMismatch {
                medians: self.medians.len(),
                ids: self.revealed_collection_ids.len(),
            });
        }
        if !self
            .revealed_collection_ids
            .windows(2)
            .all(|w| w[0] < w[1])
        {
            return Err(ArtifactError::UnsortedCollectionIds);
        }
        self.revealed_data
            .validate()
            .map_err(ArtifactError::RevealMaps)?;
        Ok(())
    }
}

/// Artifact tracking granted-but-unclaimed bounties.
///
/// Append on successful dispute, pop on successful claim. Strict FIFO;
/// ids are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeFile {
    /// Granted bounty ids awaiting redemption, oldest first.
    pub bounty_id_queue: VecDeque<BountyId>,
}

impl DisputeFile {
    /// Append a bounty id unless it is already queued.
    ///
    /// Returns true if the id was added.
    pub fn push_bounty(&mut self, id: BountyId) -> bool {
        if self.bounty_id_queue.contains(&id) {
            return false;
        }
        self.bounty_id_queue.push_back(id);
        true
    }

    /// Remove a bounty id wherever it sits in the queue.
    pub fn remove_bounty(&mut self, id: BountyId) {
        self.bounty_id_queue.retain(|queued| *queued != id);
    }

    /// Check that no bounty id appears twice.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        let mut seen = std::collections::BTreeSet::new();
        for id in &self.bounty_id_queue {
            if !seen.insert(*id) {
                return Err(ArtifactError::DuplicateBounty(*id));
            }
        }
        Ok(())
    }
}
