//! The `Wallets` container: a flat file mapping address to keypair.
//!
//! One file per node id at `./tmp/wallet_<NODE_ID>.dat`, loaded wholesale at
//! startup and rewritten wholesale on every mutation — there is no append
//! log or partial update, since wallet files are small and local-only.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use ledger_core::address;
use ledger_core::codec;

use crate::error::WalletError;
use crate::keys::WalletKey;

#[derive(Debug, Default, bincode::Encode, bincode::Decode)]
pub struct Wallets {
    wallets: HashMap<String, WalletKey>,
}

impl Wallets {
    /// Load `path` if it exists, otherwise start with an empty container —
    /// a missing file just means this is the node's first run.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = fs::read(path).map_err(|e| WalletError::Io(e.to_string()))?;
        codec::deserialize(&bytes).map_err(|e| WalletError::CorruptedFile(e.to_string()))
    }

    /// Generate a new keypair, insert it, and return its address. Callers
    /// must call [`Wallets::save_to_file`] to persist the change.
    pub fn create_wallet(&mut self) -> String {
        let key = WalletKey::generate();
        let addr = address::encode(&key.pub_key_hash());
        self.wallets.insert(addr.clone(), key);
        addr
    }

    pub fn get_wallet(&self, address: &str) -> Option<&WalletKey> {
        self.wallets.get(address)
    }

    pub fn get_all_addresses(&self) -> Vec<String> {
        let mut addrs: Vec<String> = self.wallets.keys().cloned().collect();
        addrs.sort();
        addrs
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), WalletError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| WalletError::Io(e.to_string()))?;
        }
        let bytes = codec::serialize(self).map_err(|e| WalletError::CorruptedFile(e.to_string()))?;
        fs::write(path, bytes).map_err(|e| WalletError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_empty_wallets() {
        let wallets = Wallets::new("/nonexistent/path/wallet.dat").unwrap();
        assert!(wallets.get_all_addresses().is_empty());
    }

    #[test]
    fn create_wallet_produces_a_resolvable_address() {
        let mut wallets = Wallets::default();
        let addr = wallets.create_wallet();
        assert!(ledger_core::address::is_valid(&addr));
        assert!(wallets.get_wallet(&addr).is_some());
        assert_eq!(wallets.get_all_addresses(), vec![addr]);
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.dat");

        let mut wallets = Wallets::default();
        let addr = wallets.create_wallet();
        wallets.save_to_file(&path).unwrap();

        let reloaded = Wallets::new(&path).unwrap();
        assert_eq!(reloaded.get_all_addresses(), vec![addr.clone()]);
        assert_eq!(reloaded.get_wallet(&addr).unwrap(), wallets.get_wallet(&addr).unwrap());
    }
}
