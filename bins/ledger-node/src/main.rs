//! ledger-node — the P2P server binary.
//!
//! Resolves `NODE_ID`, opens the chain store, and serves peers until
//! SIGINT/SIGTERM, at which point in-flight store operations are allowed to
//! finish before the process exits.

use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use ledger_node_lib::{node, NodeConfig, Store};

#[derive(Parser, Debug)]
#[command(name = "ledger-node", version, about = "P2P server for the ledger protocol")]
struct Args {
    /// Address to credit when this node mines a block. Omit to run as a relay only.
    #[arg(long)]
    miner: Option<String>,

    /// Log output format ("text" or "json").
    #[arg(long, default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args.log_format);

    let cfg = match NodeConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("failed to resolve NODE_ID: {e}");
            process::exit(1);
        }
    };

    let miner_pub_key_hash = match args.miner.as_deref().map(ledger_core::address::decode).transpose() {
        Ok(hash) => hash,
        Err(e) => {
            error!("invalid miner address: {e}");
            process::exit(1);
        }
    };

    let store = match Store::open(cfg.data_dir()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("failed to open chain store: {e}");
            process::exit(1);
        }
    };

    info!(node_id = %cfg.node_id, listen = %cfg.listen_addr(), seed = %cfg.seed_addr(), miner = ?args.miner, "starting ledger-node");

    let shutdown = shutdown_signal();
    tokio::select! {
        result = node::serve(store, cfg.listen_addr(), cfg.seed_addr().to_string(), miner_pub_key_hash) => {
            if let Err(e) = result {
                error!("p2p server exited with error: {e}");
                process::exit(1);
            }
        }
        _ = shutdown => {
            info!("shutdown signal received, exiting");
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    }
}

fn init_logging(format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if format == "json" {
        tracing_subscriber::registry().with(filter).with(fmt::layer().json()).init();
    } else {
        tracing_subscriber::registry().with(filter).with(fmt::layer().with_target(true).with_level(true)).init();
    }
}
