//! # ledger-network — raw-TCP P2P transport.
//!
//! One message per connection: a 12-byte command tag plus a payload read to
//! EOF (see [`protocol`]). [`service::run_server`] accepts connections and
//! dispatches each to a [`service::PeerHandler`] implemented by the node.

pub mod protocol;
pub mod service;

pub use protocol::Message;
pub use service::{broadcast, run_server, send_message, PeerHandler};
