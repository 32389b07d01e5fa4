//! A single wallet entry: a P-256 keypair as it is persisted on disk.
//!
//! There is no key derivation here — each `create_wallet` call generates an
//! independent keypair, matching the un-hierarchical wallet file model.

use serde::{Deserialize, Serialize};

use ledger_core::crypto::KeyPair;
use ledger_core::error::CryptoError;

/// A keypair as stored in the wallet file: raw scalar and raw `X || Y` bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct WalletKey {
    pub private_key_bytes: Vec<u8>,
    pub public_key_bytes: Vec<u8>,
}

impl WalletKey {
    pub fn generate() -> Self {
        let keypair = KeyPair::generate();
        Self { private_key_bytes: keypair.private_key_bytes(), public_key_bytes: keypair.public_key }
    }

    pub fn to_keypair(&self) -> Result<KeyPair, CryptoError> {
        let mut keypair = KeyPair::from_private_bytes(&self.private_key_bytes)?;
        keypair.public_key = self.public_key_bytes.clone();
        Ok(keypair)
    }

    pub fn pub_key_hash(&self) -> [u8; 20] {
        ledger_core::crypto::hash_pub_key(&self.public_key_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_round_trips_through_keypair() {
        let key = WalletKey::generate();
        let keypair = key.to_keypair().unwrap();
        assert_eq!(keypair.public_key, key.public_key_bytes);
        assert_eq!(keypair.pub_key_hash(), key.pub_key_hash());
    }
}
