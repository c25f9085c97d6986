//! Reveal stage: disclose the committed vote.

use std::sync::Arc;

use alloy_primitives::B256;
use tracing::info;

use medianet_core::{ChainRpc, Clock, EngineError, EngineResult, Retry, Store};
use medianet_types::Epoch;

/// Submits the reveal for the epoch committed in the commit window.
pub struct Revealer {
    chain: Arc<dyn ChainRpc>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    retry: Retry,
}

impl Revealer {
    /// Wire up a revealer.
    pub fn new(
        chain: Arc<dyn ChainRpc>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        retry: Retry,
    ) -> Self {
        Self {
            chain,
            store,
            clock,
            retry,
        }
    }

    /// Run the reveal stage for `epoch`. The commit artifact must exist
    /// and belong to the same epoch.
    pub async fn run(&self, epoch: Epoch) -> EngineResult<B256> {
        let file = self
            .store
            .read_commit()?
            .ok_or_else(|| EngineError::skip(epoch, "no commit artifact to reveal"))?;
        if file.epoch != epoch {
            return Err(EngineError::StateMismatch {
                local: file.epoch,
                chain: epoch,
            });
        }

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

        let tx = self
            .retry
            .run(self.clock.as_ref(), "reveal", || {
                self.chain.reveal(epoch, &file.values, &file.secret)
            })
            .await
            .map_err(|e| EngineError::skip(epoch, format!("reveal kept failing: {e}")))?;
        self.chain
            .wait_for_confirmation(tx)
            .await
            .map_err(|e| EngineError::skip(epoch, format!("reveal not confirmed: {e}")))?;

        info!(epoch, %tx, values = file.values.len(), "vote revealed");
        Ok(tx)
    }
}
