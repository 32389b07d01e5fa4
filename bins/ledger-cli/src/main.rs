//! ledger-cli — command-line interface to a local ledger node.
//!
//! Every subcommand operates directly on this node id's chain store and
//! wallet file; there is no RPC client, since the store is local state, not
//! a remote service.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use ledger_core::constants::SUBSIDY;
use ledger_core::traits::ChainState;
use ledger_core::types::{Hash256, Transaction, TxInput, TxOutput};
use ledger_node_lib::{node, NodeConfig, Store};
use ledger_wallet::Wallets;

#[derive(Parser)]
#[command(name = "ledger-cli", version, about = "Command-line interface to a ledger node")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the chain store, mining a genesis block paying `address`.
    CreateBlockchain { #[arg(long)] address: String },
    /// Sum the UTXO set for `address`.
    GetBalance { #[arg(long)] address: String },
    /// Build, sign, and submit a transaction.
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
        /// Mine the transaction into a local block instead of relaying it to the seed.
        #[arg(long)]
        mine: bool,
    },
    /// Print every block in the chain, head-first.
    Print,
    /// Generate a new keypair and append it to the wallet file.
    CreateWallet,
    /// List every address held in the wallet file.
    ListAddresses,
    /// Rebuild the UTXO index from the chain.
    ReindexUtxo,
    /// Start the P2P server.
    StartNode {
        /// Address to credit when this node mines a block.
        #[arg(long)]
        miner: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .init();

    let cfg = NodeConfig::from_env().context("resolving NODE_ID")?;
    let cli = Cli::parse();

    match cli.command {
        Commands::CreateBlockchain { address } => create_blockchain(&cfg, &address),
        Commands::GetBalance { address } => get_balance(&cfg, &address),
        Commands::Send { from, to, amount, mine } => send(&cfg, &from, &to, amount, mine).await,
        Commands::Print => print_chain(&cfg),
        Commands::CreateWallet => create_wallet(&cfg),
        Commands::ListAddresses => list_addresses(&cfg),
        Commands::ReindexUtxo => reindex_utxo(&cfg),
        Commands::StartNode { miner } => start_node(&cfg, miner).await,
    }
}

fn open_store(cfg: &NodeConfig) -> Result<Store> {
    Store::open(cfg.data_dir()).context("opening chain store")
}

fn create_blockchain(cfg: &NodeConfig, address: &str) -> Result<()> {
    let store = open_store(cfg)?;
    let genesis = store.init(address, current_unix_time()).context("initializing blockchain")?;
    store.reindex_utxo().context("reindexing utxo set")?;
    println!("created blockchain, genesis hash {}", hex::encode(genesis.hash));
    Ok(())
}

fn get_balance(cfg: &NodeConfig, address: &str) -> Result<()> {
    let pub_key_hash = ledger_core::address::decode(address).context("invalid address")?;
    let store = open_store(cfg)?;
    let utxos = store.find_utxo(&pub_key_hash).context("reading utxo set")?;
    let balance: u64 = utxos.iter().map(|o| o.value).sum();
    println!("balance of {address}: {balance}");
    Ok(())
}

async fn send(cfg: &NodeConfig, from: &str, to: &str, amount: u64, mine: bool) -> Result<()> {
    let wallets = Wallets::new(cfg.wallet_file()).context("loading wallet file")?;
    let sender = wallets.get_wallet(from).with_context(|| format!("no wallet found for address {from}"))?;
    let keypair = sender.to_keypair().context("reconstructing sender keypair")?;
    let from_hash = ledger_core::address::decode(from).context("invalid sender address")?;
    let to_hash = ledger_core::address::decode(to).context("invalid recipient address")?;

    let store = open_store(cfg)?;
    let (accumulated, spendable) = store.find_spendable_outputs(&from_hash, amount).context("finding spendable outputs")?;
    if accumulated < amount {
        bail!("insufficient funds: have {accumulated}, need {amount}");
    }

    let mut vin = Vec::new();
    for (txid, indices) in &spendable {
        for &index in indices {
            vin.push(TxInput {
                prev_tx_id: txid.to_vec(),
                out_index: index,
                signature: Vec::new(),
                pub_key: keypair.public_key.clone(),
            });
        }
    }

    let mut vout = vec![TxOutput::new(amount, to_hash)];
    if accumulated > amount {
        vout.push(TxOutput::new(accumulated - amount, from_hash));
    }

    let mut tx = Transaction { id: [0u8; 32], vin, vout };
    tx.set_id();

    let mut prev_txs: HashMap<Hash256, Transaction> = HashMap::new();
    for txid in spendable.keys() {
        if let Some(prev) = store.find_transaction(txid)? {
            prev_txs.insert(*txid, prev);
        }
    }
    ledger_core::crypto::sign_transaction(&mut tx, &keypair.private_key, &prev_txs).context("signing transaction")?;

    if mine {
        let coinbase = Transaction::new_coinbase(from_hash, SUBSIDY, None);
        let block = store.mine_block(vec![coinbase, tx]).context("mining transaction")?;
        store.update_utxo(&block).context("updating utxo index")?;
        println!("mined block {}", hex::encode(block.hash));
    } else {
        let seed_addr = cfg.seed_addr();
        let message = ledger_network::Message::Tx(ledger_network::protocol::TxPayload {
            addr_from: cfg.listen_addr(),
            transaction: tx,
        });
        ledger_network::send_message(seed_addr, &message).await.context("sending transaction to seed")?;
        println!("sent transaction to {seed_addr}");
    }
    Ok(())
}

fn print_chain(cfg: &NodeConfig) -> Result<()> {
    let store = open_store(cfg)?;
    for block in store.iter_blocks() {
        let block = block?;
        println!("height: {}", block.height);
        println!("hash:   {}", hex::encode(block.hash));
        println!("prev:   {}", hex::encode(block.prev_block_hash));
        for tx in &block.transactions {
            println!("  tx {}", hex::encode(tx.id));
        }
        println!();
    }
    Ok(())
}

fn create_wallet(cfg: &NodeConfig) -> Result<()> {
    let mut wallets = Wallets::new(cfg.wallet_file()).context("loading wallet file")?;
    let address = wallets.create_wallet();
    wallets.save_to_file(cfg.wallet_file()).context("saving wallet file")?;
    println!("{address}");
    Ok(())
}

fn list_addresses(cfg: &NodeConfig) -> Result<()> {
    let wallets = Wallets::new(cfg.wallet_file()).context("loading wallet file")?;
    for address in wallets.get_all_addresses() {
        println!("{address}");
    }
    Ok(())
}

fn reindex_utxo(cfg: &NodeConfig) -> Result<()> {
    let store = open_store(cfg)?;
    store.reindex_utxo().context("reindexing utxo set")?;
    let count = store.count_utxo_transactions().context("counting utxo transactions")?;
    println!("reindexed, {count} transactions in utxo set");
    Ok(())
}

async fn start_node(cfg: &NodeConfig, miner: Option<String>) -> Result<()> {
    let miner_pub_key_hash = miner.map(|a| ledger_core::address::decode(&a)).transpose().context("invalid miner address")?;
    let store = Arc::new(open_store(cfg)?);
    info!(listen = %cfg.listen_addr(), seed = %cfg.seed_addr(), "starting node");
    node::serve(store, cfg.listen_addr(), cfg.seed_addr().to_string(), miner_pub_key_hash)
        .await
        .context("running p2p server")
}

fn current_unix_time() -> i64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).expect("system clock before epoch").as_secs() as i64
}
