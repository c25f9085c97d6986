//! Dispute engine tests: dispatch priority, scenario coverage, and the
//! sorted-stream protocol.

mod support;

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use medianet_core::{EngineError, Retry, Store};
use medianet_engine::DisputeEngine;
use medianet_store::FileStore;
use medianet_types::{BountyLock, DisputeRecord, ProposedBlock};

use support::{reveal_event, staker, vote, Call, ChainState, InstantClock, MockChain};

const EPOCH: u32 = 40;

fn tokens(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

fn hunter() -> Address {
    Address::repeat_byte(0x77)
}

/// Canonical fixture: collection 1 revealed as [100, 200, 300] with
/// weights {1, 2, 1}; biggest revealer stake 5356e18 held by staker 2.
fn canonical_state() -> ChainState {
    let mut state = ChainState {
        epoch: EPOCH,
        gas_estimate: 50_000,
        gas_limit: 30_000_000,
        ..Default::default()
    };
    state.stakers.insert(1, staker(1, tokens(1)));
    state.stakers.insert(2, staker(2, tokens(5_356)));
    state.stakers.insert(3, staker(3, tokens(2)));
    state.reveal_events = vec![
        reveal_event(1, 1, vec![vote(1, 100)]),
        reveal_event(2, 2, vec![vote(1, 200)]),
        reveal_event(3, 1, vec![vote(1, 300)]),
    ];
    state
}

fn block(ids: Vec<u16>, medians: Vec<u64>, biggest_stake: U256) -> ProposedBlock {
    ProposedBlock {
        proposer_id: 9,
        ids,
        medians: medians.into_iter().map(U256::from).collect(),
        iteration: 0,
        biggest_stake,
        valid: true,
    }
}

fn engine(chain: Arc<MockChain>, dir: &tempfile::TempDir) -> DisputeEngine {
    let store = Arc::new(FileStore::open(dir.path(), hunter()).unwrap());
    DisputeEngine::new(
        chain,
        store,
        Arc::new(InstantClock),
        hunter(),
        Retry::fixed(2, Duration::ZERO),
        2.0,
    )
}

#[tokio::test]
async fn median_mismatch_streams_then_finalizes() {
    let mut state = canonical_state();
    state.block_ids = vec![5];
    state
        .blocks
        .insert(5, block(vec![1], vec![250], tokens(5_356)));

    let chain = Arc::new(MockChain::new(state));
    let dir = tempfile::tempdir().unwrap();
    let summary = engine(Arc::clone(&chain), &dir).run(EPOCH).await.unwrap();

    assert_eq!(summary.disputes_submitted, 1);
    // The full sorted list went over the wire, ascending, exactly once.
    assert_eq!(
        chain.accepted_sorted_values(),
        vec![U256::from(100u64), U256::from(200u64), U256::from(300u64)]
    );
    assert_eq!(
        chain.calls_matching(|c| matches!(c, Call::FinalizeDispute { .. })),
        vec![Call::FinalizeDispute {
            epoch: EPOCH,
            block_id: 5,
            position_in_block: 0,
        }]
    );
}

#[tokio::test]
async fn out_of_order_ids_dispute_the_first_descending_pair() {
    let mut state = canonical_state();
    // Collections 2 and 3 also revealed so [1, 3, 2] is plausible.
    state.reveal_events.push(reveal_event(1, 1, vec![vote(2, 7), vote(3, 8)]));
    state.block_ids = vec![5];
    state
        .blocks
        .insert(5, block(vec![1, 3, 2], vec![200, 8, 7], tokens(5_356)));

    let chain = Arc::new(MockChain::new(state));
    let dir = tempfile::tempdir().unwrap();
    let summary = engine(Arc::clone(&chain), &dir).run(EPOCH).await.unwrap();

    assert_eq!(summary.disputes_submitted, 1);
    assert_eq!(
        chain.calls_matching(|c| matches!(c, Call::DisputeOrder { .. })),
        vec![Call::DisputeOrder {
            epoch: EPOCH,
            block_id: 5,
            index0: 1,
            index1: 2,
        }]
    );
    // An id-order dispute never needs the sorted stream.
    assert!(chain
        .calls_matching(|c| matches!(c, Call::GiveSorted { .. }))
        .is_empty());
}

#[tokio::test]
async fn missing_id_disputes_with_doubled_gas() {
    let mut state = canonical_state();
    state.reveal_events.push(reveal_event(1, 1, vec![vote(2, 7), vote(3, 8)]));
    state.block_ids = vec![5];
    // Canonical ids are [1, 2, 3]; the block carries [1, 2, 4].
    state
        .blocks
        .insert(5, block(vec![1, 2, 4], vec![200, 7, 9], tokens(5_356)));

    let chain = Arc::new(MockChain::new(state));
    let dir = tempfile::tempdir().unwrap();
    engine(Arc::clone(&chain), &dir).run(EPOCH).await.unwrap();

    assert_eq!(
        chain.calls_matching(|c| matches!(c, Call::DisputePresent { .. })),
        vec![Call::DisputePresent {
            epoch: EPOCH,
            block_id: 5,
            id: 3,
            gas: Some(100_000),
        }]
    );
}

#[tokio::test]
async fn gas_bump_caps_at_the_block_gas_limit() {
    let mut state = canonical_state();
    state.gas_estimate = 20_000_000;
    state.gas_limit = 30_000_000;
    state.reveal_events.push(reveal_event(1, 1, vec![vote(2, 7), vote(3, 8)]));
    state.block_ids = vec![5];
    state
        .blocks
        .insert(5, block(vec![1, 2, 4], vec![200, 7, 9], tokens(5_356)));

    let chain = Arc::new(MockChain::new(state));
    let dir = tempfile::tempdir().unwrap();
    engine(Arc::clone(&chain), &dir).run(EPOCH).await.unwrap();

    match chain
        .calls_matching(|c| matches!(c, Call::DisputePresent { .. }))
        .first()
    {
        Some(Call::DisputePresent { gas, .. }) => assert_eq!(*gas, Some(30_000_000)),
        other => panic!("expected a present-dispute, got {other:?}"),
    }
}

#[tokio::test]
async fn extra_id_disputes_with_its_position() {
    let mut state = canonical_state();
    state.reveal_events.push(reveal_event(1, 1, vec![vote(2, 7), vote(3, 8)]));
    state.block_ids = vec![5];
    // Canonical [1, 2, 3]; block [1, 2, 3, 4] carries unrevealed id 4.
    state
        .blocks
        .insert(5, block(vec![1, 2, 3, 4], vec![200, 7, 8, 9], tokens(5_356)));

    let chain = Arc::new(MockChain::new(state));
    let dir = tempfile::tempdir().unwrap();
    engine(Arc::clone(&chain), &dir).run(EPOCH).await.unwrap();

    assert_eq!(
        chain.calls_matching(|c| matches!(c, Call::DisputeAbsent { .. })),
        vec![Call::DisputeAbsent {
            epoch: EPOCH,
            block_id: 5,
            id: 4,
            position_in_block: 3,
            gas: Some(100_000),
        }]
    );
}

#[tokio::test]
async fn biggest_stake_mismatch_outranks_everything() {
    let mut state = canonical_state();
    state.block_ids = vec![5];
    // Wrong biggest stake AND wrong median: only the stake dispute may
    // fire.
    state
        .blocks
        .insert(5, block(vec![1], vec![999], tokens(4_356)));

    let chain = Arc::new(MockChain::new(state));
    let dir = tempfile::tempdir().unwrap();
    let summary = engine(Arc::clone(&chain), &dir).run(EPOCH).await.unwrap();

    assert_eq!(summary.disputes_submitted, 1);
    assert_eq!(
        chain.calls_matching(|c| matches!(c, Call::DisputeBiggestStake { .. })),
        vec![Call::DisputeBiggestStake {
            epoch: EPOCH,
            block_id: 5,
            correct_biggest_stake_id: 2,
        }]
    );
    assert!(chain
        .calls_matching(|c| matches!(c, Call::GiveSorted { .. }))
        .is_empty());
    assert!(chain
        .calls_matching(|c| matches!(c, Call::FinalizeDispute { .. }))
        .is_empty());
}

#[tokio::test]
async fn a_correct_block_raises_no_dispute() {
    let mut state = canonical_state();
    state.block_ids = vec![5];
    state
        .blocks
        .insert(5, block(vec![1], vec![200], tokens(5_356)));

    let chain = Arc::new(MockChain::new(state));
    let dir = tempfile::tempdir().unwrap();
    let summary = engine(Arc::clone(&chain), &dir).run(EPOCH).await.unwrap();

    assert_eq!(summary.blocks_checked, 1);
    assert_eq!(summary.disputes_submitted, 0);
    // Only the pass-boundary resets touched the chain.
    assert!(chain
        .calls()
        .iter()
        .all(|c| matches!(c, Call::ResetDispute { .. })));
}

#[tokio::test]
async fn already_disputed_blocks_are_skipped_silently() {
    let mut state = canonical_state();
    state.block_ids = vec![5];
    state
        .blocks
        .insert(5, block(vec![1], vec![250], tokens(5_356)));
    state.disputes.insert(
        5,
        DisputeRecord {
            last_visited_value: U256::from(100u64),
        },
    );

    let chain = Arc::new(MockChain::new(state));
    let dir = tempfile::tempdir().unwrap();
    let summary = engine(Arc::clone(&chain), &dir).run(EPOCH).await.unwrap();

    assert_eq!(summary.disputes_submitted, 0);
    assert!(chain
        .calls_matching(|c| matches!(c, Call::GiveSorted { .. }))
        .is_empty());
}

#[tokio::test]
async fn invalid_blocks_need_no_dispute() {
    let mut state = canonical_state();
    state.block_ids = vec![5];
    let mut bad = block(vec![1], vec![250], tokens(5_356));
    bad.valid = false;
    state.blocks.insert(5, bad);

    let chain = Arc::new(MockChain::new(state));
    let dir = tempfile::tempdir().unwrap();
    let summary = engine(Arc::clone(&chain), &dir).run(EPOCH).await.unwrap();

    assert_eq!(summary.disputes_submitted, 0);
}

#[tokio::test]
async fn sorted_stream_halves_batches_until_they_fit() {
    let mut state = canonical_state();
    // Five distinct values for collection 1.
    state.reveal_events = vec![
        reveal_event(1, 1, vec![vote(1, 100)]),
        reveal_event(2, 2, vec![vote(1, 200)]),
        reveal_event(3, 1, vec![vote(1, 300)]),
        reveal_event(4, 1, vec![vote(1, 400)]),
        reveal_event(5, 1, vec![vote(1, 500)]),
    ];
    state.stakers.insert(4, staker(4, tokens(3)));
    state.stakers.insert(5, staker(5, tokens(4)));
    state.give_sorted_max_batch = Some(2);
    state.block_ids = vec![5];
    state
        .blocks
        .insert(5, block(vec![1], vec![999], tokens(5_356)));

    let chain = Arc::new(MockChain::new(state));
    let dir = tempfile::tempdir().unwrap();
    let summary = engine(Arc::clone(&chain), &dir).run(EPOCH).await.unwrap();

    assert_eq!(summary.disputes_submitted, 1);
    // Accepted batches are [100,200], [300,400], [500]: every value
    // exactly once, strictly ascending across submissions.
    let accepted = chain.accepted_sorted_values();
    assert_eq!(
        accepted,
        [100u64, 200, 300, 400, 500]
            .iter()
            .map(|v| U256::from(*v))
            .collect::<Vec<_>>()
    );
    let batches: Vec<usize> = chain
        .calls_matching(|c| matches!(c, Call::GiveSorted { .. }))
        .into_iter()
        .map(|c| match c {
            Call::GiveSorted { values, .. } => values.len(),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(batches, vec![2, 2, 1]);
}

#[tokio::test]
async fn gas_limit_at_batch_one_abandons_and_resets() {
    let mut state = canonical_state();
    state.give_sorted_max_batch = Some(0);
    state.block_ids = vec![5];
    state
        .blocks
        .insert(5, block(vec![1], vec![999], tokens(5_356)));

    let chain = Arc::new(MockChain::new(state));
    let dir = tempfile::tempdir().unwrap();
    let summary = engine(Arc::clone(&chain), &dir).run(EPOCH).await.unwrap();

    assert_eq!(summary.disputes_submitted, 0);
    assert!(chain
        .calls_matching(|c| matches!(c, Call::FinalizeDispute { .. }))
        .is_empty());
    // Pass-start reset, abort reset, pass-end reset.
    assert_eq!(
        chain
            .calls_matching(|c| matches!(c, Call::ResetDispute { .. }))
            .len(),
        3
    );
}

#[tokio::test]
async fn successful_disputes_queue_their_bounties() {
    let mut state = canonical_state();
    state.block_ids = vec![5];
    state
        .blocks
        .insert(5, block(vec![1], vec![250], tokens(5_356)));
    state.bounty_grants = vec![7];
    state.bounty_locks.insert(
        7,
        BountyLock {
            amount: tokens(1),
            redeem_after: EPOCH + 2,
            bounty_hunter: hunter(),
        },
    );

    let chain = Arc::new(MockChain::new(state));
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path(), Address::repeat_byte(0x01)).unwrap());
    let engine = DisputeEngine::new(
        Arc::clone(&chain) as Arc<dyn medianet_core::ChainRpc>,
        Arc::clone(&store) as Arc<dyn Store>,
        Arc::new(InstantClock),
        hunter(),
        Retry::fixed(2, Duration::ZERO),
        2.0,
    );
    engine.run(EPOCH).await.unwrap();

    let file = store.read_dispute().unwrap().unwrap();
    assert_eq!(
        file.bounty_id_queue.iter().copied().collect::<Vec<_>>(),
        vec![7]
    );
}

#[tokio::test]
async fn epoch_disagreement_refuses_to_run() {
    let mut state = canonical_state();
    state.epoch = EPOCH + 1;

    let chain = Arc::new(MockChain::new(state));
    let dir = tempfile::tempdir().unwrap();
    let err = engine(Arc::clone(&chain), &dir).run(EPOCH).await.unwrap_err();

    assert!(matches!(
        err,
        EngineError::StateMismatch {
            local: EPOCH,
            chain: e
        } if e == EPOCH + 1
    ));
    assert!(chain.calls().is_empty());
}

#[tokio::test]
async fn every_proposed_block_is_visited() {
    let mut state = canonical_state();
    state.block_ids = vec![11, 12, 13];
    state
        .blocks
        .insert(11, block(vec![1], vec![200], tokens(5_356)));
    state
        .blocks
        .insert(12, block(vec![1], vec![250], tokens(5_356)));
    state
        .blocks
        .insert(13, block(vec![1], vec![200], tokens(5_356)));

    let chain = Arc::new(MockChain::new(state));
    let dir = tempfile::tempdir().unwrap();
    let summary = engine(Arc::clone(&chain), &dir).run(EPOCH).await.unwrap();

    assert_eq!(summary.blocks_checked, 3);
    // Only the malformed block is disputed, under its own block id.
    assert_eq!(summary.disputes_submitted, 1);
    assert_eq!(
        chain.calls_matching(|c| matches!(c, Call::FinalizeDispute { .. })),
        vec![Call::FinalizeDispute {
            epoch: EPOCH,
            block_id: 12,
            position_in_block: 0,
        }]
    );
}
