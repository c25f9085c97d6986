//! # Medianet Chain Adapter
//!
//! [`RpcChain`] implements the engine's [`ChainRpc`](medianet_core::ChainRpc)
//! seam over the staker node's `oracle_*` JSON-RPC namespace. The node
//! owns ABI encoding, gas pricing and transaction assembly; this adapter
//! stays wire-thin: typed params out, typed responses in, and a signature
//! over every state-changing submission.
//!
//! Submissions are serialized per account: one signing nonce, taken and
//! advanced under a lock, so two sub-states can never race a nonce.
//!
//! [`LocalSigner`] holds the account's secp256k1 key for the duration of
//! the run, in memory only.

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

mod rpc;
mod signer;

pub use rpc::RpcChain;
pub use signer::LocalSigner;
