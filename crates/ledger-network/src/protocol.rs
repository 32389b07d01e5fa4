//! Wire framing for the P2P protocol.
//!
//! Each TCP connection carries exactly one message: a 12-byte ASCII command
//! tag, right-padded with zero bytes, followed by the command's
//! [`ledger_core::codec`]-encoded payload running to the end of the stream.
//! The sender closes the write half once the payload is written; the
//! receiver reads to EOF before decoding.

use serde::{Deserialize, Serialize};

use ledger_core::codec;
use ledger_core::error::NetworkError;
use ledger_core::types::{Block, Hash256, Transaction};

pub const COMMAND_LEN: usize = 12;

/// An inventory kind: either a block hash or a transaction id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum InvKind {
    Block,
    Tx,
}

#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct VersionPayload {
    pub version: i32,
    pub best_height: u64,
    pub addr_from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct AddrPayload {
    pub addr_list: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct GetBlocksPayload {
    pub addr_from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct InvPayload {
    pub addr_from: String,
    pub kind: InvKind,
    pub items: Vec<Hash256>,
}

#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct GetDataPayload {
    pub addr_from: String,
    pub kind: InvKind,
    pub id: Hash256,
}

#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct BlockPayload {
    pub addr_from: String,
    pub block: Block,
}

#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TxPayload {
    pub addr_from: String,
    pub transaction: Transaction,
}

/// The seven message kinds exchanged between peers.
#[derive(Debug, Clone)]
pub enum Message {
    Version(VersionPayload),
    Addr(AddrPayload),
    GetBlocks(GetBlocksPayload),
    Inv(InvPayload),
    GetData(GetDataPayload),
    Block(Box<BlockPayload>),
    Tx(TxPayload),
}

impl Message {
    fn command(&self) -> &'static str {
        match self {
            Message::Version(_) => "version",
            Message::Addr(_) => "addr",
            Message::GetBlocks(_) => "getblocks",
            Message::Inv(_) => "inv",
            Message::GetData(_) => "getdata",
            Message::Block(_) => "block",
            Message::Tx(_) => "tx",
        }
    }

    /// Encode the 12-byte command tag followed by the payload.
    pub fn encode(&self) -> Result<Vec<u8>, NetworkError> {
        let mut tag = [0u8; COMMAND_LEN];
        let cmd = self.command().as_bytes();
        tag[..cmd.len()].copy_from_slice(cmd);

        let payload = match self {
            Message::Version(p) => codec::serialize(p),
            Message::Addr(p) => codec::serialize(p),
            Message::GetBlocks(p) => codec::serialize(p),
            Message::Inv(p) => codec::serialize(p),
            Message::GetData(p) => codec::serialize(p),
            Message::Block(p) => codec::serialize(p.as_ref()),
            Message::Tx(p) => codec::serialize(p),
        }
        .map_err(|e| NetworkError::MalformedMessage(e.to_string()))?;

        let mut out = Vec::with_capacity(COMMAND_LEN + payload.len());
        out.extend_from_slice(&tag);
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Decode a full frame: the 12-byte tag plus the payload that follows.
    pub fn decode(bytes: &[u8]) -> Result<Self, NetworkError> {
        if bytes.len() < COMMAND_LEN {
            return Err(NetworkError::MalformedMessage("frame shorter than command tag".into()));
        }
        let command = bytes_to_cmd(&bytes[..COMMAND_LEN]);
        let payload = &bytes[COMMAND_LEN..];

        let decode_err = |e: bincode::error::DecodeError| NetworkError::MalformedMessage(e.to_string());

        match command.as_str() {
            "version" => Ok(Message::Version(codec::deserialize(payload).map_err(decode_err)?)),
            "addr" => Ok(Message::Addr(codec::deserialize(payload).map_err(decode_err)?)),
            "getblocks" => Ok(Message::GetBlocks(codec::deserialize(payload).map_err(decode_err)?)),
            "inv" => Ok(Message::Inv(codec::deserialize(payload).map_err(decode_err)?)),
            "getdata" => Ok(Message::GetData(codec::deserialize(payload).map_err(decode_err)?)),
            "block" => Ok(Message::Block(Box::new(codec::deserialize(payload).map_err(decode_err)?))),
            "tx" => Ok(Message::Tx(codec::deserialize(payload).map_err(decode_err)?)),
            other => Err(NetworkError::UnknownCommand(other.to_string())),
        }
    }
}

/// Strip the trailing zero padding from a 12-byte command tag.
fn bytes_to_cmd(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_round_trips() {
        let msg = Message::Version(VersionPayload { version: 1, best_height: 5, addr_from: "localhost:3000".into() });
        let bytes = msg.encode().unwrap();
        match Message::decode(&bytes).unwrap() {
            Message::Version(p) => {
                assert_eq!(p.best_height, 5);
                assert_eq!(p.addr_from, "localhost:3000");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn command_tag_is_padded_to_twelve_bytes() {
        let msg = Message::Inv(InvPayload { addr_from: "x".into(), kind: InvKind::Block, items: vec![] });
        let bytes = msg.encode().unwrap();
        assert_eq!(&bytes[..3], b"inv");
        assert_eq!(bytes[3], 0);
        assert_eq!(bytes[11], 0);
    }

    #[test]
    fn unknown_command_is_an_error() {
        let mut bytes = vec![0u8; COMMAND_LEN];
        bytes[..7].copy_from_slice(b"bogus12");
        assert!(Message::decode(&bytes).is_err());
    }

    #[test]
    fn truncated_frame_is_an_error() {
        assert!(Message::decode(&[1, 2, 3]).is_err());
    }

    #[test]
    fn block_message_round_trips() {
        let block = ledger_core::types::new_genesis_block([1u8; 20], 20, 0);
        let msg = Message::Block(Box::new(BlockPayload { addr_from: "p".into(), block: block.clone() }));
        let bytes = msg.encode().unwrap();
        match Message::decode(&bytes).unwrap() {
            Message::Block(p) => assert_eq!(p.block, block),
            _ => panic!("wrong variant"),
        }
    }
}
