//! # Medianet Types
//!
//! Shared data model for the medianet oracle staker client.
//!
//! This crate defines the chain-facing types the protocol engine works
//! with: data collections and their source jobs, epoch votes and their
//! commitments, proposed blocks, the reveal-aggregation maps the canonical
//! medians are derived from, bounty locks, and the on-disk artifacts the
//! engine persists between epoch sub-states.
//!
//! Everything numeric that crosses the chain boundary is a [`U256`]; all
//! aggregation is exact big-integer arithmetic with an explicit decimal
//! power, matching the on-chain contracts bit for bit. No floating point
//! is involved in any value that ends up in a vote or a block.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod artifacts;
pub mod block;
pub mod bounty;
pub mod collection;
pub mod reveal;
pub mod vote;

pub use alloy_primitives::{Address, B256, U256};

pub use artifacts::{ArtifactError, CommitFile, DisputeFile, ProposeFile};
pub use block::{DisputeRecord, ProposedBlock, Staker};
pub use bounty::BountyLock;
pub use collection::{AggregationMethod, Collection, Job, SelectorKind};
pub use reveal::{AssignedVote, RevealEvent, RevealedDataMaps};
pub use vote::{encode_vote, vote_commitment};

/// Epoch number. Advances once per configured epoch length.
pub type Epoch = u32;

/// Identifier of a data collection on chain.
pub type CollectionId = u16;

/// Index of a collection in the current Merkle leaf ordering.
pub type LeafId = u16;

/// Identifier of a registered staker.
pub type StakerId = u32;

/// Identifier of a proposed block within an epoch.
pub type BlockId = u32;

/// Identifier of a granted bounty.
pub type BountyId = u32;
