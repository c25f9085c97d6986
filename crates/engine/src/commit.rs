//! Commit stage: sample, seal, persist, broadcast.

use std::sync::Arc;

use alloy_primitives::{B256, U256};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, info};

use medianet_core::{ChainRpc, Clock, EngineError, EngineResult, Retry, Store};
use medianet_fetch::Aggregator;
use medianet_types::{vote_commitment, Collection, CommitFile, Epoch};

/// Builds and submits the epoch's vote commitment.
pub struct Committer {
    chain: Arc<dyn ChainRpc>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    aggregator: Aggregator,
    retry: Retry,
}

impl Committer {
    /// Wire up a committer.
    pub fn new(
        chain: Arc<dyn ChainRpc>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        aggregator: Aggregator,
        retry: Retry,
    ) -> Self {
        Self {
            chain,
            store,
            clock,
            aggregator,
            retry,
        }
    }

    /// Run the commit stage for `epoch`. Returns the commit transaction
    /// hash, or `None` when this epoch is already committed.
    pub async fn run(&self, epoch: Epoch) -> EngineResult<Option<B256>> {
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

        // Crash safety: a CommitFile for this epoch means the commit tx
        // was already broadcast, or was about to be. Re-broadcasting a
        // sealed vote is idempotent on chain; re-sampling is not.
        if let Some(existing) = self.store.read_commit()? {
            if existing.epoch == epoch {
                info!(epoch, "commit artifact already present, skipping");
                return Ok(None);
            }
        }

        let collections = self.active_collections().await?;
        if collections.is_empty() {
            return Err(EngineError::skip(epoch, "no active collections"));
        }

        let aggregated = self.aggregator.collect_all(&collections).await;
        let revealed = aggregated.iter().filter(|v| v.revealed).count();
        if revealed == 0 {
            return Err(EngineError::skip(epoch, "every collection failed to fetch"));
        }

        // Vote vector in leaf order, zero for unrevealed collections.
        let values: Vec<U256> = aggregated.iter().map(|v| v.value).collect();

        let mut secret = B256::ZERO;
        OsRng.fill_bytes(secret.as_mut_slice());

        let commitment = vote_commitment(epoch, &values, &secret);
        let file = CommitFile {
            epoch,
            commitment,
            values,
            secret,
        };
        // Durable before broadcast.
        self.store.write_commit(&file)?;

        let tx = self
            .retry
            .run(self.clock.as_ref(), "commit", || {
                self.chain.commit(epoch, commitment)
            })
            .await
            .map_err(EngineError::from)?;
        self.chain
            .wait_for_confirmation(tx)
            .await
            .map_err(EngineError::from)?;

        info!(epoch, %commitment, %tx, revealed, of = aggregated.len(), "vote committed");
        Ok(Some(tx))
    }

    /// Fetch this epoch's active collection set.
    async fn active_collections(&self) -> EngineResult<Vec<Collection>> {
        let count = self
            .retry
            .run(self.clock.as_ref(), "active collection count", || {
                self.chain.get_num_active_collections()
            })
            .await
            .map_err(EngineError::from)?;

        let mut collections = Vec::with_capacity(count as usize);
        for index in 0..count {
            let collection = self
                .retry
                .run(self.clock.as_ref(), "active collection", || {
                    self.chain.get_active_collection(index)
                })
                .await
                .map_err(EngineError::from)?;
            collections.push(collection);
        }
        debug!(count, "active collections fetched");
        Ok(collections)
    }
}
