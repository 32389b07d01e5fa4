//! Peer-to-peer state machine: version handshake, inventory exchange, block
//! and transaction relay, and the miner trigger.
//!
//! [`Node`] owns the process-wide mutable state — the mempool, known peers,
//! and per-peer `blocks_in_transit` — behind [`parking_lot::Mutex`]es, and
//! implements [`ledger_network::PeerHandler`] so [`ledger_network::service`]
//! can dispatch inbound messages into it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, warn};

use ledger_core::constants::{MEMPOOL_MINE_THRESHOLD, SEED_NODE_ADDR, SUBSIDY};
use ledger_core::mempool::Mempool;
use ledger_core::traits::ChainState;
use ledger_core::types::{Hash256, Transaction};
use ledger_network::protocol::{
    AddrPayload, BlockPayload, GetBlocksPayload, GetDataPayload, InvKind, InvPayload, Message,
    TxPayload, VersionPayload,
};
use ledger_network::PeerHandler;

use crate::storage::Store;

const PROTOCOL_VERSION: i32 = 1;

pub struct Node {
    pub store: Arc<Store>,
    mempool: Mutex<Mempool>,
    known_nodes: Mutex<Vec<String>>,
    blocks_in_transit: Mutex<HashMap<String, Vec<Hash256>>>,
    self_addr: String,
    miner_pub_key_hash: Option<[u8; 20]>,
}

impl Node {
    pub fn new(
        store: Arc<Store>,
        self_addr: String,
        seed_addr: String,
        miner_pub_key_hash: Option<[u8; 20]>,
    ) -> Self {
        let mut known_nodes = vec![seed_addr];
        known_nodes.retain(|addr| addr != &self_addr);
        Self {
            store,
            mempool: Mutex::new(Mempool::new()),
            known_nodes: Mutex::new(known_nodes),
            blocks_in_transit: Mutex::new(HashMap::new()),
            self_addr,
            miner_pub_key_hash,
        }
    }

    pub fn is_miner(&self) -> bool {
        self.miner_pub_key_hash.is_some()
    }

    pub fn mempool_len(&self) -> usize {
        self.mempool.lock().len()
    }

    /// If this node isn't the seed, announce our tip height to it.
    pub async fn bootstrap(&self, seed_addr: &str) {
        if self.self_addr == seed_addr {
            return;
        }
        self.send_version(seed_addr).await;
    }

    async fn send_version(&self, to: &str) {
        let best_height = self.store.best_height().unwrap_or(0);
        let payload = VersionPayload { version: PROTOCOL_VERSION, best_height, addr_from: self.self_addr.clone() };
        if let Err(err) = ledger_network::send_message(to, &Message::Version(payload)).await {
            warn!(peer = %to, %err, "failed to send version");
        }
    }

    async fn send_getblocks(&self, to: &str) {
        let payload = GetBlocksPayload { addr_from: self.self_addr.clone() };
        if let Err(err) = ledger_network::send_message(to, &Message::GetBlocks(payload)).await {
            warn!(peer = %to, %err, "failed to send getblocks");
        }
    }

    async fn send_inv(&self, to: &str, kind: InvKind, items: Vec<Hash256>) {
        let payload = InvPayload { addr_from: self.self_addr.clone(), kind, items };
        if let Err(err) = ledger_network::send_message(to, &Message::Inv(payload)).await {
            warn!(peer = %to, %err, "failed to send inv");
        }
    }

    async fn send_getdata(&self, to: &str, kind: InvKind, id: Hash256) {
        let payload = GetDataPayload { addr_from: self.self_addr.clone(), kind, id };
        if let Err(err) = ledger_network::send_message(to, &Message::GetData(payload)).await {
            warn!(peer = %to, %err, "failed to send getdata");
        }
    }

    fn remember_peer(&self, addr: &str) {
        if addr == self.self_addr {
            return;
        }
        let mut nodes = self.known_nodes.lock();
        if !nodes.iter().any(|n| n == addr) {
            nodes.push(addr.to_string());
        }
    }

    fn known_peers(&self) -> Vec<String> {
        self.known_nodes.lock().clone()
    }

    /// Mine every transaction currently in the mempool that still verifies,
    /// crediting the configured miner address, then repeat while work
    /// remains. No-op if this node has no miner address configured.
    pub async fn mine_pending(&self) {
        let Some(miner_hash) = self.miner_pub_key_hash else { return };

        loop {
            let pending: Vec<Transaction> = self.mempool.lock().values().cloned().collect();
            if pending.is_empty() {
                return;
            }

            let coinbase = Transaction::new_coinbase(miner_hash, SUBSIDY, None);
            let mut txs = vec![coinbase];
            txs.extend(pending.iter().cloned());

            let block = match self.store.mine_block(txs) {
                Ok(block) => block,
                Err(err) => {
                    warn!(%err, "mining failed, dropping pending mempool entries");
                    return;
                }
            };
            info!(height = block.height, hash = %hex::encode(block.hash), "mined block");

            if let Err(err) = self.store.update_utxo(&block) {
                warn!(%err, "failed to update utxo index after mining");
            }

            self.mempool.lock().purge_block(&block);

            let peers: Vec<String> = self.known_peers().into_iter().filter(|p| p != &self.self_addr).collect();
            for peer in &peers {
                self.send_inv(peer, InvKind::Block, vec![block.hash]).await;
            }
        }
    }
}

#[async_trait]
impl PeerHandler for Node {
    async fn handle_version(&self, payload: VersionPayload) {
        self.remember_peer(&payload.addr_from);
        let my_height = self.store.best_height().unwrap_or(0);
        if my_height < payload.best_height {
            self.send_getblocks(&payload.addr_from).await;
        } else if my_height > payload.best_height {
            self.send_version(&payload.addr_from).await;
        }
    }

    async fn handle_addr(&self, payload: AddrPayload) {
        for addr in payload.addr_list {
            self.remember_peer(&addr);
        }
    }

    async fn handle_getblocks(&self, payload: GetBlocksPayload) {
        let hashes = ChainState::get_block_hashes(self.store.as_ref()).unwrap_or_default();
        self.send_inv(&payload.addr_from, InvKind::Block, hashes).await;
    }

    async fn handle_inv(&self, payload: InvPayload) {
        match payload.kind {
            InvKind::Block => {
                let first = {
                    let mut transit = self.blocks_in_transit.lock();
                    transit.insert(payload.addr_from.clone(), payload.items.clone());
                    transit
                        .get_mut(&payload.addr_from)
                        .and_then(|items| if items.is_empty() { None } else { Some(items.remove(0)) })
                };
                if let Some(hash) = first {
                    self.send_getdata(&payload.addr_from, InvKind::Block, hash).await;
                }
            }
            InvKind::Tx => {
                if let Some(id) = payload.items.first() {
                    if !self.mempool.lock().contains(id) {
                        self.send_getdata(&payload.addr_from, InvKind::Tx, *id).await;
                    }
                }
            }
        }
    }

    async fn handle_getdata(&self, payload: GetDataPayload) {
        match payload.kind {
            InvKind::Block => {
                let block = ChainState::get_block(self.store.as_ref(), &payload.id).ok().flatten();
                if let Some(block) = block {
                    let msg = Message::Block(Box::new(BlockPayload { addr_from: self.self_addr.clone(), block }));
                    if let Err(err) = ledger_network::send_message(&payload.addr_from, &msg).await {
                        warn!(peer = %payload.addr_from, %err, "failed to send block");
                    }
                }
            }
            InvKind::Tx => {
                let tx = self.mempool.lock().get(&hex::encode(payload.id)).cloned();
                if let Some(transaction) = tx {
                    let msg = Message::Tx(TxPayload { addr_from: self.self_addr.clone(), transaction });
                    if let Err(err) = ledger_network::send_message(&payload.addr_from, &msg).await {
                        warn!(peer = %payload.addr_from, %err, "failed to send tx");
                    }
                }
            }
        }
    }

    async fn handle_block(&self, payload: BlockPayload) {
        self.remember_peer(&payload.addr_from);
        if let Err(err) = self.store.add_block(&payload.block) {
            warn!(%err, "failed to add received block");
            return;
        }
        info!(height = payload.block.height, "received block");

        let next = {
            let mut transit = self.blocks_in_transit.lock();
            transit
                .get_mut(&payload.addr_from)
                .and_then(|items| if items.is_empty() { None } else { Some(items.remove(0)) })
        };

        if let Some(hash) = next {
            self.send_getdata(&payload.addr_from, InvKind::Block, hash).await;
        } else if let Err(err) = self.store.reindex_utxo() {
            warn!(%err, "failed to reindex utxo set after sync");
        }
    }

    async fn handle_tx(&self, payload: TxPayload) {
        let txid = payload.transaction.id;
        self.mempool.lock().insert(payload.transaction);
        info!(txid = %hex::encode(txid), "received transaction");

        if self.self_addr == SEED_NODE_ADDR {
            let peers: Vec<String> = self
                .known_peers()
                .into_iter()
                .filter(|p| p != &payload.addr_from && p != &self.self_addr)
                .collect();
            for peer in &peers {
                self.send_inv(peer, InvKind::Tx, vec![txid]).await;
            }
        } else if self.is_miner() && self.mempool_len() > MEMPOOL_MINE_THRESHOLD {
            self.mine_pending().await;
        }
    }
}

/// Run the P2P server until it errors or the caller drops the future:
/// construct a [`Node`] over `store`, announce to the seed if we aren't it,
/// then accept connections on `listen_addr` forever. Shared by the
/// `ledger-node` server binary and the CLI's `startnode` subcommand.
pub async fn serve(
    store: Arc<Store>,
    listen_addr: String,
    seed_addr: String,
    miner_pub_key_hash: Option<[u8; 20]>,
) -> Result<(), ledger_core::error::LedgerError> {
    let node = Arc::new(Node::new(store, listen_addr.clone(), seed_addr.clone(), miner_pub_key_hash));
    node.bootstrap(&seed_addr).await;
    ledger_network::run_server(&listen_addr, node)
        .await
        .map_err(|e| ledger_core::error::LedgerError::Storage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::crypto::KeyPair;

    fn temp_node(self_addr: &str, seed: &str, miner: Option<[u8; 20]>) -> (Node, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let node = Node::new(store, self_addr.to_string(), seed.to_string(), miner);
        (node, dir)
    }

    #[test]
    fn new_node_knows_the_seed_unless_it_is_the_seed() {
        let (node, _d) = temp_node("localhost:3001", "localhost:3000", None);
        assert_eq!(node.known_peers(), vec!["localhost:3000".to_string()]);

        let (seed_node, _d2) = temp_node("localhost:3000", "localhost:3000", None);
        assert!(seed_node.known_peers().is_empty());
    }

    #[tokio::test]
    async fn mine_pending_mints_a_block_and_clears_mempool() {
        let keypair = KeyPair::generate();
        let (node, _dir) = temp_node("localhost:3000", "localhost:3000", Some(keypair.pub_key_hash()));
        let address = ledger_core::address::encode(&keypair.pub_key_hash());
        node.store.init(&address, 0).unwrap();
        node.store.reindex_utxo().unwrap();

        node.handle_tx(TxPayload {
            addr_from: "peer".into(),
            transaction: Transaction::new_coinbase([9u8; 20], 1, Some("filler".into())),
        })
        .await;
        node.mine_pending().await;

        assert_eq!(node.mempool_len(), 0);
        assert_eq!(node.store.best_height().unwrap(), 1);
    }
}
