//! Epoch clock: wall time → `(epoch, sub-state)`.
//!
//! The chain's genesis timestamp is read once per run; from there every
//! transition is wall-clock arithmetic. The chain is never asked what
//! state it is in; actions re-check the chain *epoch* before acting and
//! refuse on disagreement, which covers the few seconds of skew a local
//! clock may carry.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use medianet_core::{ChainRpc, Clock, EngineError, EngineResult, Retry};
use medianet_types::Epoch;

/// Number of sub-state windows per epoch.
pub const NUM_EPOCH_STATES: u64 = 5;

/// The ordered sub-states of an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EpochState {
    /// Sample data and seal the vote.
    Commit,
    /// Disclose the committed vote.
    Reveal,
    /// Submit an aggregated block if elected.
    Propose,
    /// Verify and dispute peer blocks.
    Dispute,
    /// Block confirmation and reward claims.
    Confirm,
}

impl EpochState {
    /// All states in window order.
    pub const ALL: [EpochState; NUM_EPOCH_STATES as usize] = [
        EpochState::Commit,
        EpochState::Reveal,
        EpochState::Propose,
        EpochState::Dispute,
        EpochState::Confirm,
    ];

    /// Window index within the epoch.
    pub fn index(self) -> u64 {
        match self {
            EpochState::Commit => 0,
            EpochState::Reveal => 1,
            EpochState::Propose => 2,
            EpochState::Dispute => 3,
            EpochState::Confirm => 4,
        }
    }

    fn from_index(index: u64) -> Self {
        Self::ALL[(index % NUM_EPOCH_STATES) as usize]
    }
}

impl fmt::Display for EpochState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EpochState::Commit => "commit",
            EpochState::Reveal => "reveal",
            EpochState::Propose => "propose",
            EpochState::Dispute => "dispute",
            EpochState::Confirm => "confirm",
        };
        f.write_str(name)
    }
}

/// Maps wall time onto `(epoch, state)` and sleeps until boundaries.
pub struct EpochClock {
    clock: Arc<dyn Clock>,
    epoch_length: u64,
    genesis_ts: u64,
}

impl EpochClock {
    /// Read the genesis timestamp from the chain (bounded retries) and
    /// build the clock. Fails closed if the RPC stays unavailable.
    pub async fn init(
        chain: &dyn ChainRpc,
        clock: Arc<dyn Clock>,
        epoch_length: u64,
        retry: Retry,
    ) -> EngineResult<Self> {
        let genesis_ts = retry
            .run(clock.as_ref(), "read genesis timestamp", || {
                chain.genesis_timestamp()
            })
            .await
            .map_err(|e| EngineError::RpcTransient {
                context: format!("genesis timestamp: {e}"),
                attempts: retry.attempts,
            })?;

        info!(genesis_ts, epoch_length, "epoch clock initialized");
        Ok(Self {
            clock,
            epoch_length,
            genesis_ts,
        })
    }

    /// Build a clock from a known genesis timestamp.
    pub fn with_genesis(clock: Arc<dyn Clock>, epoch_length: u64, genesis_ts: u64) -> Self {
        Self {
            clock,
            epoch_length,
            genesis_ts,
        }
    }

    /// Seconds per sub-state window.
    pub fn state_length(&self) -> u64 {
        self.epoch_length / NUM_EPOCH_STATES
    }

    /// Epoch and sub-state at a given unix time.
    pub fn state_at(&self, now: u64) -> (Epoch, EpochState) {
        let elapsed = now.saturating_sub(self.genesis_ts);
        let epoch = (elapsed / self.epoch_length) as Epoch;
        let offset = elapsed % self.epoch_length;
        (epoch, EpochState::from_index(offset / self.state_length()))
    }

    /// Epoch and sub-state right now.
    pub fn current(&self) -> (Epoch, EpochState) {
        self.state_at(self.clock.now_unix())
    }

    /// Sleep until the next sub-state window opens, whichever it is,
    /// then return it.
    pub async fn next_state(&self) -> (Epoch, EpochState) {
        let now = self.clock.now_unix();
        let elapsed = now.saturating_sub(self.genesis_ts);
        let into_window = elapsed % self.state_length();
        let wait = self.state_length() - into_window;
        debug!(wait_secs = wait, "waiting for next sub-state");
        self.clock.sleep(Duration::from_secs(wait)).await;
        self.current()
    }

    /// Sleep until the target sub-state begins (or return immediately if
    /// it is already running), then return `(epoch, state)`.
    pub async fn wait_for_state(&self, target: EpochState) -> (Epoch, EpochState) {
        let now = self.clock.now_unix();
        let (_, state) = self.state_at(now);
        if state == target {
            return self.state_at(now);
        }

        let elapsed = now.saturating_sub(self.genesis_ts);
        let offset = elapsed % self.epoch_length;
        let target_offset = target.index() * self.state_length();
        let wait = (target_offset + self.epoch_length - offset) % self.epoch_length;
        debug!(%target, wait_secs = wait, "waiting for sub-state");
        self.clock.sleep(Duration::from_secs(wait)).await;
        self.current()
    }
}
