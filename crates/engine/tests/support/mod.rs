//! Shared test doubles: a scripted chain and an instant clock.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use alloy_primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use medianet_core::{ChainError, ChainResult, ChainRpc, Clock};
use medianet_types::{
    BlockId, BountyId, BountyLock, Collection, CollectionId, DisputeRecord, Epoch, ProposedBlock,
    RevealEvent, Staker, StakerId,
};

/// A clock that never actually sleeps.
#[derive(Default)]
pub struct InstantClock;

#[async_trait]
impl Clock for InstantClock {
    fn now_unix(&self) -> u64 {
        0
    }

    async fn sleep(&self, _duration: Duration) {}
}

/// Every state-changing call the engine makes, as recorded by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Commit {
        epoch: Epoch,
        commitment: B256,
    },
    Reveal {
        epoch: Epoch,
        values: Vec<U256>,
        secret: B256,
    },
    Propose {
        epoch: Epoch,
        ids: Vec<CollectionId>,
        medians: Vec<U256>,
        iteration: u64,
        biggest_stake_id: StakerId,
    },
    GiveSorted {
        epoch: Epoch,
        collection_id: CollectionId,
        values: Vec<U256>,
    },
    FinalizeDispute {
        epoch: Epoch,
        block_id: BlockId,
        position_in_block: u16,
    },
    DisputeBiggestStake {
        epoch: Epoch,
        block_id: BlockId,
        correct_biggest_stake_id: StakerId,
    },
    DisputeOrder {
        epoch: Epoch,
        block_id: BlockId,
        index0: usize,
        index1: usize,
    },
    DisputePresent {
        epoch: Epoch,
        block_id: BlockId,
        id: CollectionId,
        gas: Option<u64>,
    },
    DisputeAbsent {
        epoch: Epoch,
        block_id: BlockId,
        id: CollectionId,
        position_in_block: u16,
        gas: Option<u64>,
    },
    ResetDispute {
        epoch: Epoch,
    },
    RedeemBounty {
        id: BountyId,
    },
    ClaimBlockReward,
}

/// Scripted chain state a test sets up front.
#[derive(Default)]
pub struct ChainState {
    pub epoch: Epoch,
    pub genesis_ts: u64,
    pub stakers: BTreeMap<StakerId, Staker>,
    pub staker_ids: BTreeMap<Address, StakerId>,
    pub collections: Vec<Collection>,
    pub salt: B256,
    pub block_ids: Vec<BlockId>,
    pub blocks: BTreeMap<BlockId, ProposedBlock>,
    pub disputes: BTreeMap<BlockId, DisputeRecord>,
    pub bounty_locks: BTreeMap<BountyId, BountyLock>,
    pub reveal_events: Vec<RevealEvent>,
    pub bounty_grants: Vec<BountyId>,
    pub gas_estimate: u64,
    pub gas_limit: u64,
    /// Batches longer than this are rejected with a gas-limit error.
    pub give_sorted_max_batch: Option<usize>,
}

/// Scripted [`ChainRpc`] double that records every submission.
pub struct MockChain {
    state: Mutex<ChainState>,
    calls: Mutex<Vec<Call>>,
    tx_counter: Mutex<u64>,
}

impl MockChain {
    pub fn new(state: ChainState) -> Self {
        Self {
            state: Mutex::new(state),
            calls: Mutex::new(Vec::new()),
            tx_counter: Mutex::new(0),
        }
    }

    /// Snapshot of the recorded submissions.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded submissions of one shape.
    pub fn calls_matching(&self, predicate: impl Fn(&Call) -> bool) -> Vec<Call> {
        self.calls().into_iter().filter(|c| predicate(c)).collect()
    }

    /// Every value accepted by `giveSorted`, in acceptance order.
    pub fn accepted_sorted_values(&self) -> Vec<U256> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::GiveSorted { values, .. } => Some(values),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn set_epoch(&self, epoch: Epoch) {
        self.state.lock().unwrap().epoch = epoch;
    }

    fn record(&self, call: Call) -> ChainResult<B256> {
        self.calls.lock().unwrap().push(call);
        let mut counter = self.tx_counter.lock().unwrap();
        *counter += 1;
        Ok(keccak256(counter.to_be_bytes()))
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn get_epoch(&self) -> ChainResult<Epoch> {
        Ok(self.state.lock().unwrap().epoch)
    }

    async fn genesis_timestamp(&self) -> ChainResult<u64> {
        Ok(self.state.lock().unwrap().genesis_ts)
    }

    async fn get_staker_id(&self, address: Address) -> ChainResult<StakerId> {
        self.state
            .lock()
            .unwrap()
            .staker_ids
            .get(&address)
            .copied()
            .ok_or_else(|| ChainError::Decode(format!("unknown staker {address}")))
    }

    async fn get_staker(&self, id: StakerId) -> ChainResult<Staker> {
        self.state
            .lock()
            .unwrap()
            .stakers
            .get(&id)
            .cloned()
            .ok_or_else(|| ChainError::Decode(format!("unknown staker id {id}")))
    }

    async fn get_num_active_collections(&self) -> ChainResult<u16> {
        Ok(self.state.lock().unwrap().collections.len() as u16)
    }

    async fn get_active_collection(&self, index: u16) -> ChainResult<Collection> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(index as usize)
            .cloned()
            .ok_or_else(|| ChainError::Decode(format!("no collection at {index}")))
    }

    async fn get_salt(&self) -> ChainResult<B256> {
        Ok(self.state.lock().unwrap().salt)
    }

    async fn get_sorted_proposed_block_ids(&self, _epoch: Epoch) -> ChainResult<Vec<BlockId>> {
        Ok(self.state.lock().unwrap().block_ids.clone())
    }

    async fn get_proposed_block(&self, _epoch: Epoch, id: BlockId) -> ChainResult<ProposedBlock> {
        self.state
            .lock()
            .unwrap()
            .blocks
            .get(&id)
            .cloned()
            .ok_or_else(|| ChainError::Decode(format!("no proposed block {id}")))
    }

    async fn get_dispute(&self, _epoch: Epoch, block_id: BlockId) -> ChainResult<DisputeRecord> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .disputes
            .get(&block_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_bounty_lock(&self, id: BountyId) -> ChainResult<BountyLock> {
        self.state
            .lock()
            .unwrap()
            .bounty_locks
            .get(&id)
            .cloned()
            .ok_or_else(|| ChainError::Decode(format!("no bounty lock {id}")))
    }

    async fn block_gas_limit(&self) -> ChainResult<u64> {
        Ok(self.state.lock().unwrap().gas_limit)
    }

    async fn estimate_gas(&self, _method: &str) -> ChainResult<u64> {
        Ok(self.state.lock().unwrap().gas_estimate)
    }

    async fn epoch_start_block(&self, epoch: Epoch) -> ChainResult<u64> {
        Ok(epoch as u64 * 100)
    }

    async fn reveal_events(&self, _epoch: Epoch) -> ChainResult<Vec<RevealEvent>> {
        Ok(self.state.lock().unwrap().reveal_events.clone())
    }

    async fn bounty_events(
        &self,
        _from_block: u64,
        _hunter: Address,
    ) -> ChainResult<Vec<BountyId>> {
        Ok(self.state.lock().unwrap().bounty_grants.clone())
    }

    async fn commit(&self, epoch: Epoch, commitment: B256) -> ChainResult<B256> {
        self.record(Call::Commit { epoch, commitment })
    }

    async fn reveal(&self, epoch: Epoch, values: &[U256], secret: &B256) -> ChainResult<B256> {
        self.record(Call::Reveal {
            epoch,
            values: values.to_vec(),
            secret: *secret,
        })
    }

    async fn propose(
        &self,
        epoch: Epoch,
        ids: &[CollectionId],
        medians: &[U256],
        iteration: u64,
        biggest_stake_id: StakerId,
    ) -> ChainResult<B256> {
        self.record(Call::Propose {
            epoch,
            ids: ids.to_vec(),
            medians: medians.to_vec(),
            iteration,
            biggest_stake_id,
        })
    }

    async fn give_sorted(
        &self,
        epoch: Epoch,
        collection_id: CollectionId,
        values: &[U256],
    ) -> ChainResult<B256> {
        let max_batch = self.state.lock().unwrap().give_sorted_max_batch;
        if let Some(max) = max_batch {
            if values.len() > max {
                return Err(ChainError::OutOfGas);
            }
        }
        self.record(Call::GiveSorted {
            epoch,
            collection_id,
            values: values.to_vec(),
        })
    }

    async fn finalize_dispute(
        &self,
        epoch: Epoch,
        block_id: BlockId,
        position_in_block: u16,
    ) -> ChainResult<B256> {
        self.record(Call::FinalizeDispute {
            epoch,
            block_id,
            position_in_block,
        })
    }

    async fn dispute_biggest_stake_proposed(
        &self,
        epoch: Epoch,
        block_id: BlockId,
        correct_biggest_stake_id: StakerId,
    ) -> ChainResult<B256> {
        self.record(Call::DisputeBiggestStake {
            epoch,
            block_id,
            correct_biggest_stake_id,
        })
    }

    async fn dispute_on_order_of_ids(
        &self,
        epoch: Epoch,
        block_id: BlockId,
        index0: usize,
        index1: usize,
    ) -> ChainResult<B256> {
        self.record(Call::DisputeOrder {
            epoch,
            block_id,
            index0,
            index1,
        })
    }

    async fn dispute_collection_id_should_be_present(
        &self,
        epoch: Epoch,
        block_id: BlockId,
        id: CollectionId,
        gas_limit: Option<u64>,
    ) -> ChainResult<B256> {
        self.record(Call::DisputePresent {
            epoch,
            block_id,
            id,
            gas: gas_limit,
        })
    }

    async fn dispute_collection_id_should_be_absent(
        &self,
        epoch: Epoch,
        block_id: BlockId,
        id: CollectionId,
        position_in_block: u16,
        gas_limit: Option<u64>,
    ) -> ChainResult<B256> {
        self.record(Call::DisputeAbsent {
            epoch,
            block_id,
            id,
            position_in_block,
            gas: gas_limit,
        })
    }

    async fn reset_dispute(&self, epoch: Epoch) -> ChainResult<B256> {
        self.record(Call::ResetDispute { epoch })
    }

    async fn redeem_bounty(&self, id: BountyId) -> ChainResult<B256> {
        self.record(Call::RedeemBounty { id })
    }

    async fn claim_block_reward(&self) -> ChainResult<B256> {
        self.record(Call::ClaimBlockReward)
    }

    async fn stake(&self, _epoch: Epoch, _amount: U256) -> ChainResult<B256> {
        Err(ChainError::Transport("not scripted".into()))
    }

    async fn unstake(&self, _staker_id: StakerId, _amount: U256) -> ChainResult<B256> {
        Err(ChainError::Transport("not scripted".into()))
    }

    async fn initiate_withdraw(&self, _staker_id: StakerId) -> ChainResult<B256> {
        Err(ChainError::Transport("not scripted".into()))
    }

    async fn unlock_withdraw(&self, _staker_id: StakerId) -> ChainResult<B256> {
        Err(ChainError::Transport("not scripted".into()))
    }

    async fn wait_for_confirmation(&self, _tx: B256) -> ChainResult<()> {
        Ok(())
    }
}

/// One assigned vote for collection `cid` (leaf id mirrors the cid).
pub fn vote(cid: CollectionId, value: u64) -> medianet_types::AssignedVote {
    medianet_types::AssignedVote {
        leaf_id: cid,
        collection_id: cid,
        value: U256::from(value),
    }
}

/// A reveal event for one staker.
pub fn reveal_event(
    staker_id: StakerId,
    influence: u64,
    votes: Vec<medianet_types::AssignedVote>,
) -> RevealEvent {
    RevealEvent {
        staker_id,
        influence: U256::from(influence),
        values: votes,
    }
}

/// A staker record.
pub fn staker(id: StakerId, stake: U256) -> Staker {
    Staker {
        id,
        address: Address::repeat_byte(id as u8),
        stake,
    }
}
