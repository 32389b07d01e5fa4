//! Node configuration resolved from the `NODE_ID` environment variable.
//!
//! Everything — storage directory, wallet file, and listen port — is
//! derived from a single `NODE_ID`, matching the convention used throughout
//! this protocol's tooling to run several nodes side by side on one host.

use std::path::PathBuf;

use ledger_core::constants::SEED_NODE_ADDR;
use ledger_core::error::ConfigError;

/// Configuration for a single node instance, keyed entirely by `node_id`.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub node_id: String,
    pub listen_port: u16,
    pub log_level: String,
}

impl NodeConfig {
    /// Resolve configuration from the `NODE_ID` environment variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let node_id = std::env::var("NODE_ID").map_err(|_| ConfigError::MissingNodeId)?;
        let listen_port: u16 = node_id
            .parse()
            .map_err(|_| ConfigError::InvalidNodeId(node_id.clone()))?;
        Ok(Self { node_id, listen_port, log_level: "info".to_string() })
    }

    /// Root directory for this node's chain store.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(format!("./tmp/blocks_{}", self.node_id))
    }

    /// Path to this node's wallet file.
    pub fn wallet_file(&self) -> PathBuf {
        PathBuf::from(format!("./tmp/wallet_{}.dat", self.node_id))
    }

    /// This node's own TCP listen address.
    pub fn listen_addr(&self) -> String {
        format!("localhost:{}", self.listen_port)
    }

    /// The network's designated seed node.
    pub fn seed_addr(&self) -> &'static str {
        SEED_NODE_ADDR
    }

    pub fn is_seed(&self) -> bool {
        self.listen_addr() == self.seed_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // NODE_ID is process-global state; serialize tests that touch it.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_node_id_is_a_config_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("NODE_ID");
        assert!(matches!(NodeConfig::from_env(), Err(ConfigError::MissingNodeId)));
    }

    #[test]
    fn non_numeric_node_id_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("NODE_ID", "not-a-port");
        assert!(matches!(NodeConfig::from_env(), Err(ConfigError::InvalidNodeId(_))));
        std::env::remove_var("NODE_ID");
    }

    #[test]
    fn paths_and_addresses_are_keyed_by_node_id() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("NODE_ID", "3001");
        let cfg = NodeConfig::from_env().unwrap();
        assert_eq!(cfg.data_dir(), PathBuf::from("./tmp/blocks_3001"));
        assert_eq!(cfg.wallet_file(), PathBuf::from("./tmp/wallet_3001.dat"));
        assert_eq!(cfg.listen_addr(), "localhost:3001");
        assert!(!cfg.is_seed());
        std::env::remove_var("NODE_ID");
    }

    #[test]
    fn seed_node_id_is_recognized_as_seed() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("NODE_ID", "3000");
        let cfg = NodeConfig::from_env().unwrap();
        assert!(cfg.is_seed());
        std::env::remove_var("NODE_ID");
    }
}
