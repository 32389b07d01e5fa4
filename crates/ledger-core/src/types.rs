//! Core wire and storage types: blocks, transactions, and their pieces.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::GENESIS_COINBASE_DATA;
use crate::error::TransactionError;
use crate::merkle::merkle_root;

/// A SHA-256 digest, used for both block and transaction identities.
pub type Hash256 = [u8; 32];

/// One spendable output: an amount locked to a public-key hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TxOutput {
    pub value: u64,
    pub pub_key_hash: [u8; 20],
}

impl TxOutput {
    pub fn new(value: u64, pub_key_hash: [u8; 20]) -> Self {
        Self { value, pub_key_hash }
    }

    pub fn is_locked_with(&self, pub_key_hash: &[u8; 20]) -> bool {
        &self.pub_key_hash == pub_key_hash
    }
}

/// The outputs of a single transaction, as stored in the UTXO index under
/// `utxo-<hex txid>`. A subset of the original outputs once some are spent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TxOutputs {
    pub outputs: Vec<TxOutput>,
}

/// A reference to a prior transaction's output, carrying the spender's
/// credentials. A coinbase input has `prev_tx_id` empty and `out_index == -1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TxInput {
    pub prev_tx_id: Vec<u8>,
    pub out_index: i64,
    pub signature: Vec<u8>,
    pub pub_key: Vec<u8>,
}

impl TxInput {
    pub fn is_coinbase(&self) -> bool {
        self.prev_tx_id.is_empty() && self.out_index == -1
    }

    /// True once `pub_key` hashes to `pub_key_hash`. Only meaningful before
    /// trimming, since trimmed inputs carry an empty `pub_key`.
    pub fn uses_key(&self, pub_key_hash: &[u8; 20]) -> bool {
        crate::crypto::hash_pub_key(&self.pub_key) == *pub_key_hash
    }
}

/// A UTXO-model transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Transaction {
    pub id: Hash256,
    pub vin: Vec<TxInput>,
    pub vout: Vec<TxOutput>,
}

impl Transaction {
    /// Build a coinbase transaction crediting `subsidy` units to a
    /// public-key hash. `data` is arbitrary and carried verbatim in the
    /// sole input's `pub_key` field, since this model has no script
    /// language to mint through.
    pub fn new_coinbase(to_pub_key_hash: [u8; 20], subsidy: u64, data: Option<String>) -> Self {
        let data = data.unwrap_or_else(|| format!("Reward to {}", hex::encode(to_pub_key_hash)));
        let mut tx = Self {
            id: [0u8; 32],
            vin: vec![TxInput {
                prev_tx_id: Vec::new(),
                out_index: -1,
                signature: Vec::new(),
                pub_key: data.into_bytes(),
            }],
            vout: vec![TxOutput::new(subsidy, to_pub_key_hash)],
        };
        tx.set_id();
        tx
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].is_coinbase()
    }

    /// Recompute `id` as the hash of the transaction with `id` cleared.
    pub fn set_id(&mut self) {
        self.id = [0u8; 32];
        self.id = self.hash();
    }

    /// Hash of the transaction serialized with `id` cleared to all zeroes.
    pub fn hash(&self) -> Hash256 {
        let mut clone = self.clone();
        clone.id = [0u8; 32];
        let bytes = crate::codec::serialize(&clone).expect("transaction always serializes");
        Sha256::digest(bytes).into()
    }

    /// A copy with every input's `signature` and `pub_key` cleared, the
    /// canonical form hashed during signing and verification.
    pub fn trimmed_copy(&self) -> Transaction {
        let vin = self
            .vin
            .iter()
            .map(|input| TxInput {
                prev_tx_id: input.prev_tx_id.clone(),
                out_index: input.out_index,
                signature: Vec::new(),
                pub_key: Vec::new(),
            })
            .collect();
        Transaction { id: self.id, vin, vout: self.vout.clone() }
    }
}

/// A block of transactions, linked to its predecessor by hash and sealed by
/// a proof-of-work nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    pub timestamp: i64,
    pub prev_block_hash: Hash256,
    pub transactions: Vec<Transaction>,
    pub hash: Hash256,
    pub nonce: i64,
    pub height: u64,
}

impl Block {
    /// Merkle root over this block's transactions, per the plain SHA-256
    /// scheme with last-leaf duplication on odd counts.
    pub fn hash_transactions(&self) -> Hash256 {
        let serialized: Vec<Vec<u8>> = self
            .transactions
            .iter()
            .map(|tx| crate::codec::serialize(tx).expect("transaction always serializes"))
            .collect();
        merkle_root(&serialized)
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0 && self.prev_block_hash == [0u8; 32]
    }
}

/// Build (but do not mine) the genesis block paying `to_pub_key_hash` the
/// standard subsidy, timestamped `timestamp`.
pub fn new_genesis_block(to_pub_key_hash: [u8; 20], subsidy: u64, timestamp: i64) -> Block {
    let coinbase = Transaction::new_coinbase(to_pub_key_hash, subsidy, Some(GENESIS_COINBASE_DATA.to_string()));
    Block {
        timestamp,
        prev_block_hash: [0u8; 32],
        transactions: vec![coinbase],
        hash: [0u8; 32],
        nonce: 0,
        height: 0,
    }
}

pub fn check_inputs_and_outputs_present(tx: &Transaction) -> Result<(), TransactionError> {
    if tx.vin.is_empty() || tx.vout.is_empty() {
        return Err(TransactionError::EmptyInputsOrOutputs);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coinbase_is_recognized() {
        let tx = Transaction::new_coinbase([7u8; 20], 20, None);
        assert!(tx.is_coinbase());
        assert!(tx.vin[0].is_coinbase());
    }

    #[test]
    fn set_id_is_deterministic() {
        let tx1 = Transaction::new_coinbase([1u8; 20], 20, Some("x".into()));
        let tx2 = Transaction::new_coinbase([1u8; 20], 20, Some("x".into()));
        assert_eq!(tx1.id, tx2.id);
    }

    #[test]
    fn trimmed_copy_clears_credentials() {
        let mut tx = Transaction::new_coinbase([1u8; 20], 20, None);
        tx.vin[0].signature = vec![1, 2, 3];
        let trimmed = tx.trimmed_copy();
        assert!(trimmed.vin[0].signature.is_empty());
        assert!(trimmed.vin[0].pub_key.is_empty());
    }

    #[test]
    fn genesis_block_has_height_zero_and_null_prev() {
        let block = new_genesis_block([3u8; 20], 20, 0);
        assert!(block.is_genesis());
        assert_eq!(block.transactions.len(), 1);
    }
}
