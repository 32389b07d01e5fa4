//! Fixed-difficulty proof-of-work: nonce search and validation.
//!
//! The difficulty is a compile-time constant (see
//! [`TARGET_BITS`](crate::constants::TARGET_BITS)); there is no retargeting.

use sha2::{Digest, Sha256};

use crate::constants::{MAX_NONCE, TARGET_BITS};
use crate::error::BlockError;
use crate::types::{Block, Hash256};

/// `1 << (256 - TARGET_BITS)`, represented as a big-endian 32-byte array so
/// it can be compared lexicographically against a hash of the same width.
pub fn target_bytes() -> [u8; 32] {
    let mut target = [0u8; 32];
    let shift = 256 - TARGET_BITS as usize;
    let byte_index = 31 - shift / 8;
    let bit_in_byte = shift % 8;
    target[byte_index] = 1u8 << bit_in_byte;
    target
}

fn prepare_data(block: &Block, nonce: i64) -> Vec<u8> {
    let merkle = block.hash_transactions();
    let mut data = Vec::with_capacity(32 + 32 + 8 + 4 + 8);
    data.extend_from_slice(&block.prev_block_hash);
    data.extend_from_slice(&merkle);
    data.extend_from_slice(&block.timestamp.to_be_bytes());
    data.extend_from_slice(&(TARGET_BITS as u32).to_be_bytes());
    data.extend_from_slice(&nonce.to_be_bytes());
    data
}

fn hash_is_below_target(hash: &Hash256, target: &[u8; 32]) -> bool {
    hash.as_slice() < target.as_slice()
}

/// Search for a nonce whose resulting hash is below the PoW target.
/// Returns `(nonce, hash)`. Fails if the 63-bit nonce space is exhausted,
/// which is not expected to happen at this target.
pub fn mine(block: &Block) -> Result<(i64, Hash256), BlockError> {
    let target = target_bytes();
    let mut nonce: i64 = 0;

    while nonce < MAX_NONCE {
        let data = prepare_data(block, nonce);
        let hash: Hash256 = Sha256::digest(&data).into();
        if hash_is_below_target(&hash, &target) {
            return Ok((nonce, hash));
        }
        nonce += 1;
    }

    Err(BlockError::NonceSpaceExhausted)
}

/// Recompute the block's mined hash from its stored nonce and check it
/// against the PoW target.
pub fn validate(block: &Block) -> bool {
    let data = prepare_data(block, block.nonce);
    let hash: Hash256 = Sha256::digest(&data).into();
    hash == block.hash && hash_is_below_target(&hash, &target_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::new_genesis_block;

    #[test]
    fn mined_block_validates() {
        let mut block = new_genesis_block([1u8; 20], 20, 0);
        let (nonce, hash) = mine(&block).unwrap();
        block.nonce = nonce;
        block.hash = hash;
        assert!(validate(&block));
    }

    #[test]
    fn mined_hash_is_below_target() {
        let block = new_genesis_block([2u8; 20], 20, 0);
        let (_, hash) = mine(&block).unwrap();
        assert!(hash_is_below_target(&hash, &target_bytes()));
    }

    #[test]
    fn tampering_with_timestamp_invalidates() {
        let mut block = new_genesis_block([3u8; 20], 20, 0);
        let (nonce, hash) = mine(&block).unwrap();
        block.nonce = nonce;
        block.hash = hash;
        block.timestamp += 1;
        assert!(!validate(&block));
    }

    #[test]
    fn tampering_with_prev_hash_invalidates() {
        let mut block = new_genesis_block([4u8; 20], 20, 0);
        let (nonce, hash) = mine(&block).unwrap();
        block.nonce = nonce;
        block.hash = hash;
        block.prev_block_hash[0] ^= 0xFF;
        assert!(!validate(&block));
    }

    #[test]
    fn tampering_with_transactions_invalidates() {
        let mut block = new_genesis_block([5u8; 20], 20, 0);
        let (nonce, hash) = mine(&block).unwrap();
        block.nonce = nonce;
        block.hash = hash;
        block.transactions[0].vout[0].value += 1;
        assert!(!validate(&block));
    }
}
