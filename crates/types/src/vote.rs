//! Vote encoding and commitment hashing.
//!
//! A vote is the tuple `(values, secret)` for one epoch. Its commitment
//! seals the vote during the commit window:
//!
//! ```text
//! commitment = keccak256( epoch ‖ value₀ ‖ value₁ ‖ … ‖ secret )
//! ```
//!
//! where `epoch` and every value occupy one 32-byte big-endian word and
//! `secret` is 32 raw bytes. The layout is fixed by the on-chain verifier;
//! any deviation makes the later reveal unverifiable, so it is reproduced
//! here byte for byte and covered by tests.

use alloy_primitives::{keccak256, B256, U256};

use crate::Epoch;

/// Width of one encoded word.
const WORD: usize = 32;

/// Encode a vote into the exact byte layout the on-chain verifier hashes.
///
/// Returns `32 * (values.len() + 2)` bytes: the epoch word, one word per
/// value in vector order, then the secret.
pub fn encode_vote(epoch: Epoch, values: &[U256], secret: &B256) -> Vec<u8> {
    let mut buf = Vec::with_capacity(WORD * (values.len() + 2));
    buf.extend_from_slice(&U256::from(epoch).to_be_bytes::<WORD>());
    for value in values {
        buf.extend_from_slice(&value.to_be_bytes::<WORD>());
    }
    buf.extend_from_slice(secret.as_slice());
    buf
}

/// Compute the commitment hash sealing a vote.
pub fn vote_commitment(epoch: Epoch, values: &[U256], secret: &B256) -> B256 {
    keccak256(encode_vote(epoch, values, secret))
}
