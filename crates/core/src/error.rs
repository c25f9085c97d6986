//! Engine-wide error taxonomy.
//!
//! The variants map one-to-one onto the propagation policy: transient and
//! local failures never cross a sub-state boundary (they are retried or
//! collapse into [`SkipEpoch`](EngineError::SkipEpoch)); only
//! [`Config`](EngineError::Config), [`ArtifactCorrupt`](EngineError::ArtifactCorrupt)
//! and [`Fatal`](EngineError::Fatal) stop the process.

use medianet_types::Epoch;
use thiserror::Error;

use crate::traits::{ChainError, FetchError, StoreError};

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the staker engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or invalid startup data. Fatal before the main loop starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// An RPC call kept failing after the retry budget was spent.
    #[error("rpc unavailable after {attempts} attempts: {context}")]
    RpcTransient {
        /// What was being attempted.
        context: String,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// A persisted artifact failed validation. Requires manual
    /// remediation; never auto-overwritten.
    #[error("artifact corrupt: {0}")]
    ArtifactCorrupt(String),

    /// The local epoch disagrees with the chain at action time.
    /// Skip the sub-state and resync.
    #[error("local epoch {local} does not match chain epoch {chain}")]
    StateMismatch {
        /// Epoch derived from the local clock.
        local: Epoch,
        /// Epoch the chain reports.
        chain: Epoch,
    },

    /// A single collection's data could not be fetched. Excludes that
    /// collection only.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A dispute transaction reverted for a recognized benign reason.
    #[error("benign dispute revert: {0}")]
    BenignRevert(String),

    /// The current epoch's work was abandoned; wait for the next commit
    /// window.
    #[error("skipping epoch {epoch}: {reason}")]
    SkipEpoch {
        /// Epoch being skipped.
        epoch: Epoch,
        /// Why it was skipped.
        reason: String,
    },

    /// Unrecoverable condition (nonce divergence, key failure). Exits
    /// the process.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl EngineError {
    /// True for the variants that must stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::Config(_) | EngineError::ArtifactCorrupt(_) | EngineError::Fatal(_)
        )
    }

    /// Skip the given epoch with a reason.
    pub fn skip(epoch: Epoch, reason: impl Into<String>) -> Self {
        EngineError::SkipEpoch {
            epoch,
            reason: reason.into(),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corrupt { .. } => EngineError::ArtifactCorrupt(err.to_string()),
            StoreError::Locked(_) => EngineError::Fatal(err.to_string()),
            other => EngineError::Config(other.to_string()),
        }
    }
}

impl From<ChainError> for EngineError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Revert { ref reason } if ChainError::is_benign_reason(reason) => {
                EngineError::BenignRevert(reason.clone())
            }
            other => EngineError::RpcTransient {
                context: other.to_string(),
                attempts: 1,
            },
        }
    }
}
