//! JSON-RPC chain adapter.
//!
//! Thin client over the staker node's `oracle_*` namespace. Reads map
//! one-to-one onto node methods; state-changing calls go through
//! [`RpcChain::submit`], which attaches the account, a serialized nonce
//! and a signature over the canonical payload, and leaves transaction
//! assembly to the node.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use medianet_core::{ChainError, ChainResult, ChainRpc, Signer};
use medianet_types::{
    BlockId, BountyId, BountyLock, Collection, CollectionId, DisputeRecord, Epoch, ProposedBlock,
    RevealEvent, Staker, StakerId,
};

/// How often a pending submission is re-polled.
const CONFIRM_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How long to wait for a submission to be mined before giving up.
const CONFIRM_DEADLINE: Duration = Duration::from_secs(120);

/// The signed envelope of one state-changing submission.
#[derive(Debug, Serialize)]
struct SubmitPayload<'a> {
    chain_id: u64,
    from: Address,
    nonce: u64,
    method: &'a str,
    params: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    gas: Option<u64>,
}

/// Mined-or-not answer for a submitted transaction.
#[derive(Debug, Deserialize)]
struct TxStatus {
    mined: bool,
    #[serde(default)]
    revert_reason: Option<String>,
}

/// [`ChainRpc`] implementation over jsonrpsee HTTP.
pub struct RpcChain {
    client: HttpClient,
    signer: Arc<dyn Signer>,
    chain_id: u64,
    /// Signing nonce, taken and advanced under this lock so concurrent
    /// sub-states can never race a submission. `None` until first use
    /// and after any failed submit, forcing a resync from the node.
    nonce: tokio::sync::Mutex<Option<u64>>,
}

impl RpcChain {
    /// Connect to the node RPC endpoint.
    pub fn connect(
        url: &str,
        chain_id: u64,
        request_timeout: Duration,
        signer: Arc<dyn Signer>,
    ) -> ChainResult<Self> {
        let client = HttpClientBuilder::default()
            .request_timeout(request_timeout)
            .build(url)
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            signer,
            chain_id,
            nonce: tokio::sync::Mutex::new(None),
        })
    }

    async fn call<T, P>(&self, method: &str, params: P) -> ChainResult<T>
    where
        T: DeserializeOwned,
        P: jsonrpsee::core::traits::ToRpcParams + Send,
    {
        self.client
            .request(method, params)
            .await
            .map_err(classify_error)
    }

    /// Sign and submit one state-changing call, serializing the nonce.
    async fn submit(
        &self,
        method: &str,
        params: serde_json::Value,
        gas: Option<u64>,
    ) -> ChainResult<B256> {
        let mut nonce_slot = self.nonce.lock().await;
        let nonce = match *nonce_slot {
            Some(n) => n,
            None => {
                let fresh: u64 = self
                    .call("oracle_getNonce", rpc_params![self.signer.address()])
                    .await?;
                *nonce_slot = Some(fresh);
                fresh
            }
        };

        let payload = SubmitPayload {
            chain_id: self.chain_id,
            from: self.signer.address(),
            nonce,
            method,
            params,
            gas,
        };
        let encoded = serde_json::to_vec(&payload)
            .map_err(|e| ChainError::Decode(e.to_string()))?;
        let signature = self
            .signer
            .sign_digest(keccak256(&encoded))
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        let result: ChainResult<B256> = self
            .call(
                "oracle_submit",
                rpc_params![payload, format!("0x{}", hex::encode(signature))],
            )
            .await;

        match result {
            Ok(tx) => {
                *nonce_slot = Some(nonce + 1);
                debug!(method, nonce, tx = %tx, "submission accepted");
                Ok(tx)
            }
            Err(err) => {
                // Resync the nonce next time; the node may or may not
                // have consumed this one.
                *nonce_slot = None;
                warn!(method, nonce, error = %err, "submission failed");
                Err(err)
            }
        }
    }
}

/// Map a jsonrpsee error onto the engine's chain error taxonomy.
fn classify_error(err: jsonrpsee::core::client::Error) -> ChainError {
    use jsonrpsee::core::client::Error as RpcError;
    match err {
        RpcError::Call(call) => {
            let message = call.message().to_string();
            let lowered = message.to_ascii_lowercase();
            if lowered.contains("out of gas") || lowered.contains("gas limit") {
                ChainError::OutOfGas
            } else if lowered.contains("revert") {
                ChainError::Revert { reason: message }
            } else {
                ChainError::Transport(message)
            }
        }
        RpcError::RequestTimeout => ChainError::Timeout("request timed out".to_string()),
        RpcError::ParseError(e) => ChainError::Decode(e.to_string()),
        other => ChainError::Transport(other.to_string()),
    }
}

#[async_trait]
impl ChainRpc for RpcChain {
    async fn get_epoch(&self) -> ChainResult<Epoch> {
        self.call("oracle_getEpoch", rpc_params![]).await
    }

    async fn genesis_timestamp(&self) -> ChainResult<u64> {
        self.call("oracle_getGenesisTimestamp", rpc_params![]).await
    }

    async fn get_staker_id(&self, address: Address) -> ChainResult<StakerId> {
        self.call("oracle_getStakerId", rpc_params![address]).await
    }

    async fn get_staker(&self, id: StakerId) -> ChainResult<Staker> {
        self.call("oracle_getStaker", rpc_params![id]).await
    }

    async fn get_num_active_collections(&self) -> ChainResult<u16> {
        self.call("oracle_getNumActiveCollections", rpc_params![])
            .await
    }

    async fn get_active_collection(&self, index: u16) -> ChainResult<Collection> {
        self.call("oracle_getActiveCollection", rpc_params![index])
            .await
    }

    async fn get_salt(&self) -> ChainResult<B256> {
        self.call("oracle_getSalt", rpc_params![]).await
    }

    async fn get_sorted_proposed_block_ids(&self, epoch: Epoch) -> ChainResult<Vec<BlockId>> {
        self.call("oracle_getSortedProposedBlockIds", rpc_params![epoch])
            .await
    }

    async fn get_proposed_block(&self, epoch: Epoch, id: BlockId) -> ChainResult<ProposedBlock> {
        self.call("oracle_getProposedBlock", rpc_params![epoch, id])
            .await
    }

    async fn get_dispute(&self, epoch: Epoch, block_id: BlockId) -> ChainResult<DisputeRecord> {
        self.call("oracle_getDispute", rpc_params![epoch, block_id])
            .await
    }

    async fn get_bounty_lock(&self, id: BountyId) -> ChainResult<BountyLock> {
        self.call("oracle_getBountyLock", rpc_params![id]).await
    }

    async fn block_gas_limit(&self) -> ChainResult<u64> {
        self.call("oracle_getBlockGasLimit", rpc_params![]).await
    }

    async fn estimate_gas(&self, method: &str) -> ChainResult<u64> {
        self.call(
            "oracle_estimateGas",
            rpc_params![self.signer.address(), method],
        )
        .await
    }

    async fn epoch_start_block(&self, epoch: Epoch) -> ChainResult<u64> {
        self.call("oracle_getEpochStartBlock", rpc_params![epoch])
            .await
    }

    async fn reveal_events(&self, epoch: Epoch) -> ChainResult<Vec<RevealEvent>> {
        self.call("oracle_getRevealEvents", rpc_params![epoch]).await
    }

    async fn bounty_events(&self, from_block: u64, hunter: Address) -> ChainResult<Vec<BountyId>> {
        self.call("oracle_getBountyEvents", rpc_params![from_block, hunter])
            .await
    }

    async fn commit(&self, epoch: Epoch, commitment: B256) -> ChainResult<B256> {
        self.submit(
            "commit",
            serde_json::json!({ "epoch": epoch, "commitment": commitment }),
            None,
        )
        .await
    }

    async fn reveal(&self, epoch: Epoch, values: &[U256], secret: &B256) -> ChainResult<B256> {
        self.submit(
            "reveal",
            serde_json::json!({ "epoch": epoch, "values": values, "secret": secret }),
            None,
        )
        .await
    }

    async fn propose(
        &self,
        epoch: Epoch,
        ids: &[CollectionId],
        medians: &[U256],
        iteration: u64,
        biggest_stake_id: StakerId,
    ) -> ChainResult<B256> {
        self.submit(
            "propose",
            serde_json::json!({
                "epoch": epoch,
                "ids": ids,
                "medians": medians,
                "iteration": iteration,
                "biggestStakeId": biggest_stake_id,
            }),
            None,
        )
        .await
    }

    async fn give_sorted(
        &self,
        epoch: Epoch,
        collection_id: CollectionId,
        values: &[U256],
    ) -> ChainResult<B256> {
        self.submit(
            "giveSorted",
            serde_json::json!({
                "epoch": epoch,
                "collectionId": collection_id,
                "values": values,
            }),
            None,
        )
        .await
    }

    async fn finalize_dispute(
        &self,
        epoch: Epoch,
        block_id: BlockId,
        position_in_block: u16,
    ) -> ChainResult<B256> {
        self.submit(
            "finalizeDispute",
            serde_json::json!({
                "epoch": epoch,
                "blockId": block_id,
                "positionInBlock": position_in_block,
            }),
            None,
        )
        .await
    }

    async fn dispute_biggest_stake_proposed(
        &self,
        epoch: Epoch,
        block_id: BlockId,
        correct_biggest_stake_id: StakerId,
    ) -> ChainResult<B256> {
        self.submit(
            "disputeBiggestStakeProposed",
            serde_json::json!({
                "epoch": epoch,
                "blockId": block_id,
                "correctBiggestStakeId": correct_biggest_stake_id,
            }),
            None,
        )
        .await
    }

    async fn dispute_on_order_of_ids(
        &self,
        epoch: Epoch,
        block_id: BlockId,
        index0: usize,
        index1: usize,
    ) -> ChainResult<B256> {
        self.submit(
            "disputeOnOrderOfIds",
            serde_json::json!({
                "epoch": epoch,
                "blockId": block_id,
                "index0": index0,
                "index1": index1,
            }),
            None,
        )
        .await
    }

    async fn dispute_collection_id_should_be_present(
        &self,
        epoch: Epoch,
        block_id: BlockId,
        id: CollectionId,
        gas_limit: Option<u64>,
    ) -> ChainResult<B256> {
        self.submit(
            "disputeCollectionIdShouldBePresent",
            serde_json::json!({
                "epoch": epoch,
                "blockId": block_id,
                "id": id,
            }),
            gas_limit,
        )
        .await
    }

    async fn dispute_collection_id_should_be_absent(
        &self,
        epoch: Epoch,
        block_id: BlockId,
        id: CollectionId,
        position_in_block: u16,
        gas_limit: Option<u64>,
    ) -> ChainResult<B256> {
        self.submit(
            "disputeCollectionIdShouldBeAbsent",
            serde_json::json!({
                "epoch": epoch,
                "blockId": block_id,
                "id": id,
                "positionInBlock": position_in_block,
            }),
            gas_limit,
        )
        .await
    }

    async fn reset_dispute(&self, epoch: Epoch) -> ChainResult<B256> {
        self.submit("resetDispute", serde_json::json!({ "epoch": epoch }), None)
            .await
    }

    async fn redeem_bounty(&self, id: BountyId) -> ChainResult<B256> {
        self.submit("redeemBounty", serde_json::json!({ "id": id }), None)
            .await
    }

    async fn claim_block_reward(&self) -> ChainResult<B256> {
        self.submit("claimBlockReward", serde_json::json!({}), None)
            .await
    }

    async fn stake(&self, epoch: Epoch, amount: U256) -> ChainResult<B256> {
        self.submit(
            "stake",
            serde_json::json!({ "epoch": epoch, "amount": amount }),
            None,
        )
        .await
    }

    async fn unstake(&self, staker_id: StakerId, amount: U256) -> ChainResult<B256> {
        self.submit(
            "unstake",
            serde_json::json!({ "stakerId": staker_id, "amount": amount }),
            None,
        )
        .await
    }

    async fn initiate_withdraw(&self, staker_id: StakerId) -> ChainResult<B256> {
        self.submit(
            "initiateWithdraw",
            serde_json::json!({ "stakerId": staker_id }),
            None,
        )
        .await
    }

    async fn unlock_withdraw(&self, staker_id: StakerId) -> ChainResult<B256> {
        self.submit(
            "unlockWithdraw",
            serde_json::json!({ "stakerId": staker_id }),
            None,
        )
        .await
    }

    async fn wait_for_confirmation(&self, tx: B256) -> ChainResult<()> {
        let deadline = tokio::time::Instant::now() + CONFIRM_DEADLINE;
        loop {
            let status: TxStatus = self
                .call("oracle_getTransactionStatus", rpc_params![tx])
                .await?;
            if let Some(reason) = status.revert_reason {
                return Err(ChainError::Revert { reason });
            }
            if status.mined {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ChainError::Timeout(format!("transaction {tx} not mined")));
            }
            tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_limit_messages_classify_as_out_of_gas() {
        let err = jsonrpsee::types::ErrorObjectOwned::owned(
            3,
            "execution failed: out of gas",
            None::<()>,
        );
        let classified = classify_error(jsonrpsee::core::client::Error::Call(err));
        assert!(matches!(classified, ChainError::OutOfGas));
    }

    #[test]
    fn revert_messages_keep_their_reason() {
        let err = jsonrpsee::types::ErrorObjectOwned::owned(
            3,
            "execution reverted: already disputed",
            None::<()>,
        );
        match classify_error(jsonrpsee::core::client::Error::Call(err)) {
            ChainError::Revert { reason } => assert!(reason.contains("already disputed")),
            other => panic!("expected revert, got {other:?}"),
        }
    }
}
