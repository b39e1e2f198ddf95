//! Ed25519 keypairs.
//!
//! Solana tooling stores a keypair as 64 bytes: the 32-byte secret seed
//! followed by the 32-byte public key. Configuration documents carry that
//! blob Base64-encoded.

use std::fmt;

use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use zeroize::Zeroizing;

use crate::address::Address;
use crate::error::SolError;

/// Length of the secret||public keypair encoding.
pub const KEYPAIR_LEN: usize = 64;

#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Build a keypair from a 32-byte secret seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Keypair {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Build a keypair from the 64-byte secret||public encoding.
    ///
    /// The public half must match the key derived from the secret half.
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self, SolError> {
        let arr: &[u8; KEYPAIR_LEN] = bytes.try_into().map_err(|_| {
            SolError::InvalidKeypair(format!("expected 64 bytes, got {}", bytes.len()))
        })?;
        let signing_key = SigningKey::from_keypair_bytes(arr)
            .map_err(|e| SolError::InvalidKeypair(e.to_string()))?;
        Ok(Keypair { signing_key })
    }

    /// Decode a Base64 keypair literal.
    pub fn from_base64(encoded: &str) -> Result<Self, SolError> {
        let bytes = Zeroizing::new(
            base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| SolError::InvalidKeypair(format!("base64 decode failed: {e}")))?,
        );
        Self::from_keypair_bytes(&bytes)
    }

    pub fn pubkey(&self) -> Address {
        Address::new(self.signing_key.verifying_key().to_bytes())
    }

    /// The 64-byte secret||public encoding. Wiped when dropped.
    pub fn to_keypair_bytes(&self) -> Zeroizing<[u8; KEYPAIR_LEN]> {
        Zeroizing::new(self.signing_key.to_keypair_bytes())
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.to_keypair_bytes().as_ref())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl PartialEq for Keypair {
    fn eq(&self, other: &Self) -> bool {
        *self.to_keypair_bytes() == *other.to_keypair_bytes()
    }
}

impl Eq for Keypair {}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the secret half.
        write!(f, "Keypair({})", self.pubkey())
    }
}

impl From<SigningKey> for Keypair {
    fn from(signing_key: SigningKey) -> Self {
        Keypair { signing_key }
    }
}
