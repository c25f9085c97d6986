//! Local secp256k1 signer.

use alloy_primitives::{keccak256, Address, B256};
use k256::{
    ecdsa::SigningKey,
    elliptic_curve::sec1::ToEncodedPoint,
    SecretKey,
};

use medianet_core::{Signer, SignerError};

/// In-memory signing key for one account.
///
/// The key is provided at startup (prompted or read from a file by the
/// CLI) and lives only as long as the process. Nothing here ever writes
/// it anywhere.
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl LocalSigner {
    /// Build a signer from a hex-encoded 32-byte private key, with or
    /// without a `0x` prefix.
    pub fn from_hex(hex_key: &str) -> Result<Self, SignerError> {
        let hex_key = hex_key.trim().trim_start_matches("0x");
        let bytes: [u8; 32] = hex::decode(hex_key)
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?
            .try_into()
            .map_err(|_| SignerError::InvalidKey("key must be 32 bytes".to_string()))?;

        let secret =
            SecretKey::from_bytes(&bytes.into()).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        let key = SigningKey::from(secret);
        let address = address_of(&key);
        Ok(Self { key, address })
    }
}

/// Ethereum-style address: last 20 bytes of the keccak of the
/// uncompressed public key.
fn address_of(key: &SigningKey) -> Address {
    let point = key.verifying_key().to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

impl Signer for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_digest(&self, digest: B256) -> Result<[u8; 65], SignerError> {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|e| SignerError::Signing(e.to_string()))?;

        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&signature.r().to_bytes());
        out[32..64].copy_from_slice(&signature.s().to_bytes());
        out[64] = recovery_id.to_byte();
        Ok(out)
    }
}
