//! TCP transport: one message per connection.
//!
//! The server accepts connections sequentially and spawns a task per
//! connection so many peers can be served concurrently. Each task reads its
//! socket to EOF, decodes exactly one [`Message`], and dispatches it to a
//! [`PeerHandler`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use ledger_core::error::NetworkError;

use crate::protocol::{
    AddrPayload, BlockPayload, GetBlocksPayload, GetDataPayload, InvPayload, Message,
    TxPayload, VersionPayload,
};

const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Callbacks invoked as each P2P message is dispatched. Implemented by the
/// full node; the network layer itself holds no chain or mempool state.
#[async_trait]
pub trait PeerHandler: Send + Sync {
    async fn handle_version(&self, payload: VersionPayload);
    async fn handle_addr(&self, payload: AddrPayload);
    async fn handle_getblocks(&self, payload: GetBlocksPayload);
    async fn handle_inv(&self, payload: InvPayload);
    async fn handle_getdata(&self, payload: GetDataPayload);
    async fn handle_block(&self, payload: BlockPayload);
    async fn handle_tx(&self, payload: TxPayload);
}

/// Dial `addr`, send `message`, close the write half. Fire-and-forget: the
/// caller does not wait for a reply on this connection, since replies (if
/// any) arrive as a new inbound connection.
pub async fn send_message(addr: &str, message: &Message) -> Result<(), NetworkError> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|e| NetworkError::PeerDisconnected(format!("{addr}: {e}")))?;
    let bytes = message.encode()?;
    stream
        .write_all(&bytes)
        .await
        .map_err(|e| NetworkError::PeerDisconnected(e.to_string()))?;
    stream
        .shutdown()
        .await
        .map_err(|e| NetworkError::PeerDisconnected(e.to_string()))?;
    Ok(())
}

/// Best-effort send to every peer in `addrs` except `skip`. Dial failures
/// are logged and otherwise ignored — there is no retry queue.
pub async fn broadcast(addrs: &[String], skip: &str, message: Message) {
    for addr in addrs {
        if addr == skip {
            continue;
        }
        if let Err(err) = send_message(addr, &message).await {
            tracing::warn!(peer = %addr, %err, "failed to deliver message to peer");
        }
    }
}

/// Accept connections on `listen_addr` until the process exits, dispatching
/// each to a freshly spawned task.
pub async fn run_server(listen_addr: &str, handler: Arc<dyn PeerHandler>) -> Result<(), NetworkError> {
    let listener = TcpListener::bind(listen_addr)
        .await
        .map_err(|e| NetworkError::PeerDisconnected(e.to_string()))?;
    tracing::info!(addr = %listen_addr, "listening for peers");

    loop {
        let (socket, peer_addr) = listener
            .accept()
            .await
            .map_err(|e| NetworkError::PeerDisconnected(e.to_string()))?;
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(socket, handler).await {
                tracing::warn!(peer = %peer_addr, %err, "connection handling failed");
            }
        });
    }
}

async fn handle_connection(mut socket: TcpStream, handler: Arc<dyn PeerHandler>) -> Result<(), NetworkError> {
    let mut buf = Vec::new();
    tokio::time::timeout(READ_TIMEOUT, socket.read_to_end(&mut buf))
        .await
        .map_err(|_| NetworkError::Timeout("reading peer payload".into()))?
        .map_err(|e| NetworkError::PeerDisconnected(e.to_string()))?;

    let message = Message::decode(&buf)?;
    match message {
        Message::Version(p) => handler.handle_version(p).await,
        Message::Addr(p) => handler.handle_addr(p).await,
        Message::GetBlocks(p) => handler.handle_getblocks(p).await,
        Message::Inv(p) => handler.handle_inv(p).await,
        Message::GetData(p) => handler.handle_getdata(p).await,
        Message::Block(p) => handler.handle_block(*p).await,
        Message::Tx(p) => handler.handle_tx(p).await,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        versions: AtomicUsize,
    }

    #[async_trait]
    impl PeerHandler for CountingHandler {
        async fn handle_version(&self, _payload: VersionPayload) {
            self.versions.fetch_add(1, Ordering::SeqCst);
        }
        async fn handle_addr(&self, _payload: AddrPayload) {}
        async fn handle_getblocks(&self, _payload: GetBlocksPayload) {}
        async fn handle_inv(&self, _payload: InvPayload) {}
        async fn handle_getdata(&self, _payload: GetDataPayload) {}
        async fn handle_block(&self, _payload: BlockPayload) {}
        async fn handle_tx(&self, _payload: TxPayload) {}
    }

    #[tokio::test]
    async fn server_dispatches_a_version_message() {
        let handler = Arc::new(CountingHandler { versions: AtomicUsize::new(0) });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let handler_clone = handler.clone();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            handle_connection(socket, handler_clone).await.unwrap();
        });

        let msg = Message::Version(VersionPayload { version: 1, best_height: 0, addr_from: "x".into() });
        send_message(&addr, &msg).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.versions.load(Ordering::SeqCst), 1);
    }
}
