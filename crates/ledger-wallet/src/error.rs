//! Wallet error types.

use thiserror::Error;

use ledger_core::error::{AddressError, CryptoError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("no wallet found for address {0}")]
    UnknownAddress(String),

    #[error("wallet file is corrupted: {0}")]
    CorruptedFile(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_address_message() {
        let err = WalletError::UnknownAddress("abc".into());
        assert_eq!(err.to_string(), "no wallet found for address abc");
    }
}
