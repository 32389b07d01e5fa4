//! Protocol constants.

/// Proof-of-work difficulty: target = `1 << (256 - TARGET_BITS)`.
pub const TARGET_BITS: u32 = 12;

/// Upper bound on the nonce search; exhausting it is a fatal mining error.
pub const MAX_NONCE: i64 = i64::MAX;

/// Units paid to the address supplied to `createblockchain` in the genesis
/// coinbase, and to the miner of every subsequent block.
pub const SUBSIDY: u64 = 20;

/// Arbitrary payload carried by a genesis coinbase input's `pub_key` field.
pub const GENESIS_COINBASE_DATA: &str = "First transaction from Genesis";

/// Version byte prepended to a public-key hash before base58check encoding.
pub const ADDRESS_VERSION: u8 = 0x00;

/// Length in bytes of a base58check checksum.
pub const ADDRESS_CHECKSUM_LEN: usize = 4;

/// Default peer this node announces to and relays transactions through.
pub const SEED_NODE_ADDR: &str = "localhost:3000";

/// Once the mempool holds more than this many transactions, a configured
/// miner is triggered to mine a block.
pub const MEMPOOL_MINE_THRESHOLD: usize = 2;

/// Key under which the current chain head hash is stored.
pub const HEAD_KEY: &[u8] = b"lh";

/// Prefix for UTXO index entries: `UTXO_PREFIX || hex(tx_id)`.
pub const UTXO_PREFIX: &str = "utxo-";

/// Number of keys deleted per write-batch during a UTXO reindex.
pub const REINDEX_BATCH_SIZE: usize = 100_000;

/// Length in bytes of a public-key hash (RIPEMD-160 output).
pub const PUBKEY_HASH_LEN: usize = 20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_bits_is_below_hash_width() {
        assert!(TARGET_BITS < 256);
    }

    #[test]
    fn genesis_coinbase_data_is_stable() {
        assert_eq!(GENESIS_COINBASE_DATA, "First transaction from Genesis");
    }
}
