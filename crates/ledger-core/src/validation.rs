//! Transaction and block validation.
//!
//! Structural checks ([`validate_transaction_structure`],
//! [`validate_block_structure`]) are context-free. Signature verification
//! needs the transactions being spent from and lives in [`crate::crypto`];
//! [`validate_transaction`] and [`validate_block`] thread the two together.

use std::collections::HashMap;

use crate::crypto;
use crate::error::{BlockError, TransactionError};
use crate::pow;
use crate::types::{Block, Hash256, Transaction};

pub fn validate_transaction_structure(tx: &Transaction) -> Result<(), TransactionError> {
    crate::types::check_inputs_and_outputs_present(tx)?;
    if tx.is_coinbase() {
        if tx.vin.len() != 1 || tx.vout.len() != 1 {
            return Err(TransactionError::InvalidCoinbase(
                "coinbase must have exactly one input and one output".into(),
            ));
        }
    } else {
        for input in &tx.vin {
            if input.prev_tx_id.len() != 32 {
                return Err(TransactionError::Serialization(
                    "non-coinbase input must reference a 32-byte previous tx id".into(),
                ));
            }
        }
    }
    Ok(())
}

/// Structurally check, then cryptographically verify, `tx` against the
/// transactions it spends from. Coinbase transactions pass without
/// signature checks.
pub fn validate_transaction(
    tx: &Transaction,
    prev_txs: &HashMap<Hash256, Transaction>,
) -> Result<(), TransactionError> {
    validate_transaction_structure(tx)?;

    if tx.is_coinbase() {
        return Ok(());
    }

    let verified = crypto::verify_transaction(tx, prev_txs)
        .map_err(|_| TransactionError::InvalidSignature { index: 0 })?;
    if !verified {
        return Err(TransactionError::InvalidSignature { index: 0 });
    }
    Ok(())
}

/// Validate every transaction in `block` (other than the coinbase, which is
/// only structurally checked) against `prev_txs`, then check the block's
/// proof of work.
pub fn validate_block(
    block: &Block,
    prev_txs: &HashMap<Hash256, Transaction>,
) -> Result<(), BlockError> {
    for (index, tx) in block.transactions.iter().enumerate() {
        validate_transaction(tx, prev_txs)
            .map_err(|source| BlockError::TransactionError { index, source })?;
    }

    if !pow::validate(block) {
        return Err(BlockError::InvalidPoW);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::genesis::build_genesis;

    #[test]
    fn genesis_block_validates_with_no_prev_txs() {
        let keypair = KeyPair::generate();
        let address = crate::address::encode(&keypair.pub_key_hash());
        let block = build_genesis(&address, 0).unwrap();
        let prev_txs = HashMap::new();
        assert!(validate_block(&block, &prev_txs).is_ok());
    }

    #[test]
    fn empty_transaction_is_rejected() {
        let tx = Transaction { id: [0u8; 32], vin: vec![], vout: vec![] };
        assert!(validate_transaction_structure(&tx).is_err());
    }
}
