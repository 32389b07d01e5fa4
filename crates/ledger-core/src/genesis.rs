//! Genesis block construction.
//!
//! Unlike a network with one fixed genesis block, this protocol mints a
//! fresh genesis paying whatever address the operator supplies to
//! `createblockchain`, so genesis is a function of that address rather than
//! a compile-time constant.

use crate::address;
use crate::constants::SUBSIDY;
use crate::error::{AddressError, BlockError};
use crate::pow;
use crate::types::{new_genesis_block, Block};

/// Build and mine the genesis block, paying [`SUBSIDY`] units to `address`.
pub fn build_genesis(address: &str, timestamp: i64) -> Result<Block, GenesisError> {
    let pub_key_hash = address::decode(address)?;
    let mut block = new_genesis_block(pub_key_hash, SUBSIDY, timestamp);
    let (nonce, hash) = pow::mine(&block)?;
    block.nonce = nonce;
    block.hash = hash;
    Ok(block)
}

#[derive(Debug, thiserror::Error)]
pub enum GenesisError {
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Block(#[from] BlockError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn genesis_pays_subsidy_to_supplied_address() {
        let keypair = KeyPair::generate();
        let address = address::encode(&keypair.pub_key_hash());
        let block = build_genesis(&address, 0).unwrap();
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.transactions[0].vout[0].value, SUBSIDY);
        assert_eq!(block.transactions[0].vout[0].pub_key_hash, keypair.pub_key_hash());
        assert!(pow::validate(&block));
    }

    #[test]
    fn rejects_invalid_address() {
        assert!(build_genesis("not-an-address!!", 0).is_err());
    }
}
