//! The chain seam: everything the engine reads from and submits to the
//! oracle contracts.
//!
//! ABI encoding, gas pricing and transaction signing live behind the
//! implementation; the engine only sees typed reads, typed transaction
//! submissions returning a transaction hash, and
//! [`wait_for_confirmation`](ChainRpc::wait_for_confirmation).

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use thiserror::Error;

use medianet_types::{
    BlockId, BountyId, BountyLock, Collection, CollectionId, DisputeRecord, Epoch, ProposedBlock,
    RevealEvent, Staker, StakerId,
};

/// Revert reasons the dispute engine treats as benign: somebody else got
/// there first, or the contract is in a state where the call is simply
/// not applicable.
pub const BENIGN_REVERT_REASONS: &[&str] = &[
    "already disputed",
    "not a dispute",
    "dispute already resolved",
    "withdraw lock not reached",
];

/// Errors surfaced by a chain adapter.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The RPC endpoint could not be reached or answered garbage.
    #[error("transport: {0}")]
    Transport(String),

    /// The call exceeded its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The transaction reverted with the given reason.
    #[error("reverted: {reason}")]
    Revert {
        /// Reason string reported by the node.
        reason: String,
    },

    /// The transaction ran out of gas.
    #[error("gas limit reached")]
    OutOfGas,

    /// The node's response could not be decoded.
    #[error("decode: {0}")]
    Decode(String),
}

impl ChainError {
    /// True if this error means the submission hit the gas ceiling and a
    /// smaller payload should be tried.
    pub fn is_gas_limit(&self) -> bool {
        match self {
            ChainError::OutOfGas => true,
            ChainError::Revert { reason } => {
                let reason = reason.to_ascii_lowercase();
                reason.contains("gas limit") || reason.contains("out of gas")
            }
            _ => false,
        }
    }

    /// True if the revert reason is one of the recognized benign ones.
    pub fn is_benign_reason(reason: &str) -> bool {
        let reason = reason.to_ascii_lowercase();
        BENIGN_REVERT_REASONS
            .iter()
            .any(|benign| reason.contains(benign))
    }

    /// True if this error is a benign revert.
    pub fn is_benign(&self) -> bool {
        matches!(self, ChainError::Revert { reason } if Self::is_benign_reason(reason))
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Behavioral contract of the oracle chain, as consumed by the engine.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    // --- reads ---

    /// Current epoch as the chain sees it.
    async fn get_epoch(&self) -> ChainResult<Epoch>;

    /// Unix timestamp the epoch numbering is anchored to.
    async fn genesis_timestamp(&self) -> ChainResult<u64>;

    /// Staker id registered for an address.
    async fn get_staker_id(&self, address: Address) -> ChainResult<StakerId>;

    /// Staker record by id.
    async fn get_staker(&self, id: StakerId) -> ChainResult<Staker>;

    /// Number of collections active this epoch.
    async fn get_num_active_collections(&self) -> ChainResult<u16>;

    /// Active collection by index (`0..num_active`).
    async fn get_active_collection(&self, index: u16) -> ChainResult<Collection>;

    /// Election salt for the current epoch.
    async fn get_salt(&self) -> ChainResult<B256>;

    /// Ids of the blocks proposed for an epoch, in contract order.
    async fn get_sorted_proposed_block_ids(&self, epoch: Epoch) -> ChainResult<Vec<BlockId>>;

    /// A proposed block by id.
    async fn get_proposed_block(&self, epoch: Epoch, id: BlockId) -> ChainResult<ProposedBlock>;

    /// Dispute progress for a proposed block within an epoch.
    async fn get_dispute(&self, epoch: Epoch, block_id: BlockId) -> ChainResult<DisputeRecord>;

    /// Lock state of a granted bounty.
    async fn get_bounty_lock(&self, id: BountyId) -> ChainResult<BountyLock>;

    /// The chain's block gas limit, the ceiling for any gas override.
    async fn block_gas_limit(&self) -> ChainResult<u64>;

    /// Node-side gas estimate for a named operation.
    async fn estimate_gas(&self, method: &str) -> ChainResult<u64>;

    /// First chain block of an epoch, for event scans.
    async fn epoch_start_block(&self, epoch: Epoch) -> ChainResult<u64>;

    /// All reveal events of an epoch.
    async fn reveal_events(&self, epoch: Epoch) -> ChainResult<Vec<RevealEvent>>;

    /// Bounty ids granted to `hunter` since `from_block`.
    async fn bounty_events(&self, from_block: u64, hunter: Address) -> ChainResult<Vec<BountyId>>;

    // --- transactions ---

    /// Seal this epoch's vote.
    async fn commit(&self, epoch: Epoch, commitment: B256) -> ChainResult<B256>;

    /// Disclose the committed vote.
    async fn reveal(&self, epoch: Epoch, values: &[U256], secret: &B256) -> ChainResult<B256>;

    /// Submit an aggregated block as the elected proposer.
    async fn propose(
        &self,
        epoch: Epoch,
        ids: &[CollectionId],
        medians: &[U256],
        iteration: u64,
        biggest_stake_id: StakerId,
    ) -> ChainResult<B256>;

    /// Stream one ascending batch of revealed values to the dispute
    /// contract.
    async fn give_sorted(
        &self,
        epoch: Epoch,
        collection_id: CollectionId,
        values: &[U256],
    ) -> ChainResult<B256>;

    /// Finalize a median dispute after the full sorted stream.
    async fn finalize_dispute(
        &self,
        epoch: Epoch,
        block_id: BlockId,
        position_in_block: u16,
    ) -> ChainResult<B256>;

    /// Dispute a block whose `biggest_stake` disagrees with the chain.
    async fn dispute_biggest_stake_proposed(
        &self,
        epoch: Epoch,
        block_id: BlockId,
        correct_biggest_stake_id: StakerId,
    ) -> ChainResult<B256>;

    /// Dispute a block whose ids are not sorted; `index0`/`index1` name
    /// the first descending pair.
    async fn dispute_on_order_of_ids(
        &self,
        epoch: Epoch,
        block_id: BlockId,
        index0: usize,
        index1: usize,
    ) -> ChainResult<B256>;

    /// Dispute a block missing a revealed collection id. `gas_limit`
    /// overrides the node's estimate (these calls under-estimate).
    async fn dispute_collection_id_should_be_present(
        &self,
        epoch: Epoch,
        block_id: BlockId,
        id: CollectionId,
        gas_limit: Option<u64>,
    ) -> ChainResult<B256>;

    /// Dispute a block carrying an id nobody revealed.
    async fn dispute_collection_id_should_be_absent(
        &self,
        epoch: Epoch,
        block_id: BlockId,
        id: CollectionId,
        position_in_block: u16,
        gas_limit: Option<u64>,
    ) -> ChainResult<B256>;

    /// Clear any partial dispute state left by an aborted sorted stream.
    async fn reset_dispute(&self, epoch: Epoch) -> ChainResult<B256>;

    /// Redeem a matured bounty.
    async fn redeem_bounty(&self, id: BountyId) -> ChainResult<B256>;

    /// Claim the block reward owed to the confirmed proposer.
    async fn claim_block_reward(&self) -> ChainResult<B256>;

    /// Stake the given amount.
    async fn stake(&self, epoch: Epoch, amount: U256) -> ChainResult<B256>;

    /// Begin unstaking the given amount.
    async fn unstake(&self, staker_id: StakerId, amount: U256) -> ChainResult<B256>;

    /// Start the withdraw lock after unstaking.
    async fn initiate_withdraw(&self, staker_id: StakerId) -> ChainResult<B256>;

    /// Release funds once the withdraw lock has passed.
    async fn unlock_withdraw(&self, staker_id: StakerId) -> ChainResult<B256>;

    /// Block until a submitted transaction is mined, or fail with its
    /// revert reason.
    async fn wait_for_confirmation(&self, tx: B256) -> ChainResult<()>;
}
