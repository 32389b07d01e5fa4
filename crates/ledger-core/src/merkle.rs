//! Merkle root over a block's serialized transactions.

use sha2::{Digest, Sha256};

use crate::types::Hash256;

/// Root of the Merkle tree built over `leaves`, each already the serialized
/// bytes of one transaction. A level with an odd number of nodes duplicates
/// its last node before hashing pairs. The root of an empty list is the
/// SHA-256 of the empty string.
pub fn merkle_root(leaves: &[Vec<u8>]) -> Hash256 {
    if leaves.is_empty() {
        return Sha256::digest([]).into();
    }

    let mut level: Vec<Hash256> = leaves.iter().map(|leaf| Sha256::digest(leaf).into()).collect();

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut hasher = Sha256::new();
                hasher.update(pair[0]);
                hasher.update(pair[1]);
                hasher.finalize().into()
            })
            .collect();
    }

    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_hashes_the_empty_string() {
        let expected: Hash256 = Sha256::digest([]).into();
        assert_eq!(merkle_root(&[]), expected);
    }

    #[test]
    fn single_leaf_root_is_its_own_hash() {
        let leaf = b"hello".to_vec();
        let expected: Hash256 = Sha256::digest(&leaf).into();
        assert_eq!(merkle_root(&[leaf]), expected);
    }

    #[test]
    fn odd_leaf_count_duplicates_the_last_leaf() {
        let a = b"a".to_vec();
        let b = b"b".to_vec();
        let c = b"c".to_vec();
        let three = merkle_root(&[a.clone(), b.clone(), c.clone()]);
        let four = merkle_root(&[a, b, c.clone(), c]);
        assert_eq!(three, four);
    }

    #[test]
    fn order_matters() {
        let a = b"a".to_vec();
        let b = b"b".to_vec();
        assert_ne!(merkle_root(&[a.clone(), b.clone()]), merkle_root(&[b, a]));
    }

    #[test]
    fn identical_inputs_produce_identical_roots() {
        let leaves = vec![b"x".to_vec(), b"y".to_vec(), b"z".to_vec()];
        assert_eq!(merkle_root(&leaves), merkle_root(&leaves));
    }
}
