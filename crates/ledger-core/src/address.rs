//! Base58Check address encoding.
//!
//! `address = Base58(version || pub_key_hash || checksum)`, where
//! `checksum = SHA-256(SHA-256(version || pub_key_hash))[0..4]`.

use sha2::{Digest, Sha256};

use crate::constants::{ADDRESS_CHECKSUM_LEN, ADDRESS_VERSION, PUBKEY_HASH_LEN};
use crate::error::AddressError;

fn checksum(versioned: &[u8]) -> [u8; ADDRESS_CHECKSUM_LEN] {
    let first = Sha256::digest(versioned);
    let second = Sha256::digest(first);
    let mut out = [0u8; ADDRESS_CHECKSUM_LEN];
    out.copy_from_slice(&second[..ADDRESS_CHECKSUM_LEN]);
    out
}

/// Encode a 20-byte public-key hash as a base58check address string.
pub fn encode(pub_key_hash: &[u8; PUBKEY_HASH_LEN]) -> String {
    let mut versioned = Vec::with_capacity(1 + PUBKEY_HASH_LEN);
    versioned.push(ADDRESS_VERSION);
    versioned.extend_from_slice(pub_key_hash);

    let check = checksum(&versioned);
    let mut full = versioned;
    full.extend_from_slice(&check);

    bs58::encode(full).into_string()
}

/// Decode and validate an address, returning its public-key hash.
pub fn decode(address: &str) -> Result<[u8; PUBKEY_HASH_LEN], AddressError> {
    let full = bs58::decode(address).into_vec().map_err(|_| AddressError::InvalidEncoding)?;
    if full.len() != 1 + PUBKEY_HASH_LEN + ADDRESS_CHECKSUM_LEN {
        return Err(AddressError::InvalidLength);
    }

    let (versioned, check) = full.split_at(1 + PUBKEY_HASH_LEN);
    let expected = checksum(versioned);
    if check != expected {
        return Err(AddressError::InvalidChecksum);
    }

    let version = versioned[0];
    if version != ADDRESS_VERSION {
        return Err(AddressError::UnsupportedVersion(version));
    }

    let mut pub_key_hash = [0u8; PUBKEY_HASH_LEN];
    pub_key_hash.copy_from_slice(&versioned[1..]);
    Ok(pub_key_hash)
}

/// True iff `address` base58check-decodes and its checksum matches.
pub fn is_valid(address: &str) -> bool {
    decode(address).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let hash = [7u8; PUBKEY_HASH_LEN];
        let address = encode(&hash);
        assert_eq!(decode(&address).unwrap(), hash);
        assert!(is_valid(&address));
    }

    #[test]
    fn rejects_flipped_checksum_byte() {
        let hash = [1u8; PUBKEY_HASH_LEN];
        let address = encode(&hash);
        let mut decoded = bs58::decode(&address).into_vec().unwrap();
        let last = decoded.len() - 1;
        decoded[last] ^= 0xFF;
        let tampered = bs58::encode(decoded).into_string();
        assert!(!is_valid(&tampered));
    }

    #[test]
    fn rejects_garbage_input() {
        assert!(!is_valid("not-a-base58-address!!"));
    }

    #[test]
    fn different_hashes_produce_different_addresses() {
        assert_ne!(encode(&[1u8; PUBKEY_HASH_LEN]), encode(&[2u8; PUBKEY_HASH_LEN]));
    }
}
