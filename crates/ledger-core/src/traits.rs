//! Trait interface between the chain store (implemented by `ledger-node`)
//! and the crates that only need to read it: the wallet and the P2P
//! protocol handlers.

use crate::error::LedgerError;
use crate::types::{Block, Hash256, Transaction};

/// Read-only view of the chain store.
pub trait ChainState: Send + Sync {
    /// Current head hash and height.
    fn head(&self) -> Result<(Hash256, u64), LedgerError>;

    /// Look up a block by its hash.
    fn get_block(&self, hash: &Hash256) -> Result<Option<Block>, LedgerError>;

    /// All block hashes from the head back to genesis, head-first.
    fn get_block_hashes(&self) -> Result<Vec<Hash256>, LedgerError>;

    /// Find a transaction anywhere in the chain by id, walking from the
    /// head. Used to assemble the `prev_txs` map for signing/verification.
    fn find_transaction(&self, id: &Hash256) -> Result<Option<Transaction>, LedgerError> {
        for hash in self.get_block_hashes()? {
            if let Some(block) = self.get_block(&hash)? {
                if let Some(tx) = block.transactions.into_iter().find(|tx| &tx.id == id) {
                    return Ok(Some(tx));
                }
            }
        }
        Ok(None)
    }
}
