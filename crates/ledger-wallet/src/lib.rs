//! # ledger-wallet — flat-file wallet.
//!
//! A `Wallets` container persists a map of address to P-256 keypair, one
//! file per node id. There is no key derivation, encryption, or mnemonic
//! support — each address is an independently generated keypair.
//!
//! # Modules
//!
//! - [`error`] — `WalletError`
//! - [`keys`] — [`keys::WalletKey`], the on-disk keypair representation
//! - [`wallet`] — [`wallet::Wallets`], the persisted address-to-key map

pub mod error;
pub mod keys;
pub mod wallet;

pub use error::WalletError;
pub use keys::WalletKey;
pub use wallet::Wallets;
