//! ECDSA P-256 signing and verification, and the public-key-hash scheme.
//!
//! Transactions are signed over a "trimmed copy" rather than a flat sighash:
//! each input is signed against a digest computed with every input's
//! credentials cleared except the one being signed, which temporarily
//! carries the previous output's public-key hash in place of a public key.
//! See [`sign_transaction`] and [`verify_transaction`].

use std::collections::HashMap;

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::EncodedPoint;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::error::CryptoError;
use crate::types::{Hash256, Transaction};

/// RIPEMD-160(SHA-256(pub_key)), the 20-byte identifier locked into every
/// output and compared during address decoding.
pub fn hash_pub_key(pub_key: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(pub_key);
    let ripe = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripe);
    out
}

/// An ECDSA P-256 keypair. The public key is stored as raw uncompressed
/// `X || Y` (64 bytes, no SEC1 prefix byte).
pub struct KeyPair {
    pub private_key: SigningKey,
    pub public_key: Vec<u8>,
}

impl KeyPair {
    pub fn generate() -> Self {
        let private_key = SigningKey::random(&mut rand::rngs::OsRng);
        let public_key = raw_public_key_bytes(private_key.verifying_key());
        Self { private_key, public_key }
    }

    pub fn from_private_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let private_key = SigningKey::from_bytes(bytes.into()).map_err(|_| CryptoError::InvalidPublicKey)?;
        let public_key = raw_public_key_bytes(private_key.verifying_key());
        Ok(Self { private_key, public_key })
    }

    pub fn private_key_bytes(&self) -> Vec<u8> {
        self.private_key.to_bytes().to_vec()
    }

    pub fn pub_key_hash(&self) -> [u8; 20] {
        hash_pub_key(&self.public_key)
    }
}

/// Raw `X || Y` bytes for a verifying key, stripping the SEC1 `0x04` prefix.
fn raw_public_key_bytes(key: &VerifyingKey) -> Vec<u8> {
    let encoded = key.to_encoded_point(false);
    encoded.as_bytes()[1..].to_vec()
}

/// Reconstruct a verifying key from raw `X || Y` bytes by restoring the
/// uncompressed SEC1 prefix.
fn decode_public_key(raw: &[u8]) -> Result<VerifyingKey, CryptoError> {
    if raw.len() != 64 {
        return Err(CryptoError::InvalidPublicKey);
    }
    let mut sec1 = [0u8; 65];
    sec1[0] = 0x04;
    sec1[1..].copy_from_slice(raw);
    let point = EncodedPoint::from_bytes(sec1).map_err(|_| CryptoError::InvalidPublicKey)?;
    VerifyingKey::from_encoded_point(&point).map_err(|_| CryptoError::InvalidPublicKey)
}

/// Build the digest signed for input `index`: the trimmed copy of `tx` with
/// that input's `pub_key` temporarily set to the referenced previous
/// output's `pub_key_hash`, then rehashed with `id` cleared.
fn signing_digest(
    tx: &Transaction,
    index: usize,
    prev_pub_key_hash: &[u8; 20],
) -> Hash256 {
    let mut trimmed = tx.trimmed_copy();
    trimmed.vin[index].pub_key = prev_pub_key_hash.to_vec();
    trimmed.id = [0u8; 32];
    let bytes = crate::codec::serialize(&trimmed).expect("transaction always serializes");
    Sha256::digest(bytes).into()
}

/// Sign every non-coinbase input of `tx` in place, using `prev_txs` to look
/// up the transaction each input spends from. Missing entries are fatal.
pub fn sign_transaction(
    tx: &mut Transaction,
    private_key: &SigningKey,
    prev_txs: &HashMap<Hash256, Transaction>,
) -> Result<(), CryptoError> {
    if tx.is_coinbase() {
        return Ok(());
    }

    for input in &tx.vin {
        let prev_id: Hash256 = input
            .prev_tx_id
            .clone()
            .try_into()
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        if !prev_txs.contains_key(&prev_id) {
            return Err(CryptoError::InvalidPublicKey);
        }
    }

    let original = tx.clone();
    for index in 0..tx.vin.len() {
        let prev_id: Hash256 = original.vin[index].prev_tx_id.clone().try_into().unwrap();
        let prev_tx = &prev_txs[&prev_id];
        let out_index = original.vin[index].out_index as usize;
        let prev_pub_key_hash = prev_tx.vout[out_index].pub_key_hash;

        let digest = signing_digest(&original, index, &prev_pub_key_hash);
        let signature: Signature = private_key
            .sign_prehash(&digest)
            .map_err(|_| CryptoError::InvalidSignature)?;
        tx.vin[index].signature = signature.to_bytes().to_vec();
    }

    Ok(())
}

/// Verify every non-coinbase input of `tx` against `prev_txs`. Coinbase
/// transactions are accepted unconditionally.
pub fn verify_transaction(
    tx: &Transaction,
    prev_txs: &HashMap<Hash256, Transaction>,
) -> Result<bool, CryptoError> {
    if tx.is_coinbase() {
        return Ok(true);
    }

    for input in &tx.vin {
        let prev_id: Hash256 = input
            .prev_tx_id
            .clone()
            .try_into()
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        if !prev_txs.contains_key(&prev_id) {
            return Err(CryptoError::InvalidPublicKey);
        }
    }

    for (index, input) in tx.vin.iter().enumerate() {
        let prev_id: Hash256 = input.prev_tx_id.clone().try_into().unwrap();
        let prev_tx = &prev_txs[&prev_id];
        let out_index = input.out_index as usize;
        let prev_pub_key_hash = prev_tx.vout[out_index].pub_key_hash;

        let digest = signing_digest(tx, index, &prev_pub_key_hash);

        if input.signature.len() != 64 {
            return Ok(false);
        }
        let signature = match Signature::from_slice(&input.signature) {
            Ok(sig) => sig,
            Err(_) => return Ok(false),
        };
        let verifying_key = match decode_public_key(&input.pub_key) {
            Ok(key) => key,
            Err(_) => return Ok(false),
        };
        if verifying_key.verify_prehash(&digest, &signature).is_err() {
            return Ok(false);
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Transaction, TxInput, TxOutput};

    fn make_spendable(pub_key_hash: [u8; 20]) -> Transaction {
        Transaction::new_coinbase(pub_key_hash, 20, Some("seed".into()))
    }

    fn spend(prev: &Transaction, spender: &KeyPair, to_hash: [u8; 20], value: u64) -> Transaction {
        let mut tx = Transaction {
            id: [0u8; 32],
            vin: vec![TxInput {
                prev_tx_id: prev.id.to_vec(),
                out_index: 0,
                signature: Vec::new(),
                pub_key: spender.public_key.clone(),
            }],
            vout: vec![TxOutput::new(value, to_hash)],
        };
        tx.set_id();
        let mut prev_txs = HashMap::new();
        prev_txs.insert(prev.id, prev.clone());
        sign_transaction(&mut tx, &spender.private_key, &prev_txs).unwrap();
        tx
    }

    #[test]
    fn signed_transaction_verifies() {
        let spender = KeyPair::generate();
        let prev = make_spendable(spender.pub_key_hash());
        let tx = spend(&prev, &spender, [9u8; 20], 10);

        let mut prev_txs = HashMap::new();
        prev_txs.insert(prev.id, prev);
        assert!(verify_transaction(&tx, &prev_txs).unwrap());
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let spender = KeyPair::generate();
        let prev = make_spendable(spender.pub_key_hash());
        let mut tx = spend(&prev, &spender, [9u8; 20], 10);
        tx.vin[0].signature[0] ^= 0xFF;

        let mut prev_txs = HashMap::new();
        prev_txs.insert(prev.id, prev);
        assert!(!verify_transaction(&tx, &prev_txs).unwrap());
    }

    #[test]
    fn missing_prev_tx_is_fatal() {
        let spender = KeyPair::generate();
        let prev = make_spendable(spender.pub_key_hash());
        let tx = spend(&prev, &spender, [9u8; 20], 10);
        let empty = HashMap::new();
        assert!(verify_transaction(&tx, &empty).is_err());
    }

    #[test]
    fn pub_key_hash_is_twenty_bytes() {
        let keypair = KeyPair::generate();
        assert_eq!(keypair.pub_key_hash().len(), 20);
    }
}
