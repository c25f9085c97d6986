//! The signing seam.
//!
//! The engine never sees key material; it knows the account address and
//! can ask for a digest signature when the chain adapter assembles a
//! submission. Keys live only in the implementation, only for the run.

use alloy_primitives::{Address, B256};
use thiserror::Error;

/// Signing failures.
#[derive(Debug, Error)]
pub enum SignerError {
    /// The key material could not be used.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Producing the signature failed.
    #[error("signing failed: {0}")]
    Signing(String),
}

/// An account that can sign 32-byte digests.
pub trait Signer: Send + Sync {
    /// Address of the signing account.
    fn address(&self) -> Address;

    /// Sign a digest, returning the 65-byte `r ‖ s ‖ v` signature.
    fn sign_digest(&self, digest: B256) -> Result<[u8; 65], SignerError>;
}
