//! Deterministic binary encoding used for every consensus-relevant type.
//!
//! Block, transaction, and UTXO-index identities are hashes of their
//! serialized form, so encoding must be both deterministic and shared by
//! every crate that touches the wire or the store.

use bincode::config::{self, Configuration};
use bincode::{Decode, Encode};

fn config() -> Configuration {
    config::standard()
}

pub fn serialize<T: Encode>(value: &T) -> Result<Vec<u8>, bincode::error::EncodeError> {
    bincode::encode_to_vec(value, config())
}

pub fn deserialize<T: Decode<()>>(bytes: &[u8]) -> Result<T, bincode::error::DecodeError> {
    bincode::decode_from_slice(bytes, config()).map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_vec_of_bytes() {
        let original = vec![1u8, 2, 3, 4, 5];
        let bytes = serialize(&original).unwrap();
        let decoded: Vec<u8> = deserialize(&bytes).unwrap();
        assert_eq!(original, decoded);
    }
}
