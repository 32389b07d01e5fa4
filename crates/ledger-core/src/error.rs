//! Error types for the ledger protocol.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("unknown previous transaction: {0}")] UnknownPrevTx(String),
    #[error("insufficient funds: have {have}, need {need}")] InsufficientFunds { have: u64, need: u64 },
    #[error("invalid signature on input {index}")] InvalidSignature { index: usize },
    #[error("empty inputs or outputs")] EmptyInputsOrOutputs,
    #[error("invalid coinbase: {0}")] InvalidCoinbase(String),
    #[error("serialization: {0}")] Serialization(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("invalid proof of work")] InvalidPoW,
    #[error("nonce space exhausted")] NonceSpaceExhausted,
    #[error("invalid merkle root")] InvalidMerkleRoot,
    #[error("tx error in {index}: {source}")] TransactionError { index: usize, source: TransactionError },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("peer disconnected: {0}")] PeerDisconnected(String),
    #[error("unknown command: {0}")] UnknownCommand(String),
    #[error("malformed message: {0}")] MalformedMessage(String),
    #[error("timeout waiting on peer {0}")] Timeout(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58check encoding")] InvalidEncoding,
    #[error("invalid checksum")] InvalidChecksum,
    #[error("invalid length")] InvalidLength,
    #[error("unsupported version byte: {0}")] UnsupportedVersion(u8),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainStateError {
    #[error("blockchain already initialized")] AlreadyInitialized,
    #[error("blockchain not initialized, run createblockchain first")] NotInitialized,
    #[error("block not found: {0}")] BlockNotFound(String),
    #[error("no transactions to mine")] NothingToMine,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("NODE_ID environment variable is not set")] MissingNodeId,
    #[error("NODE_ID {0:?} is not a valid u16 port")] InvalidNodeId(String),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)] Transaction(#[from] TransactionError),
    #[error(transparent)] Block(#[from] BlockError),
    #[error(transparent)] Network(#[from] NetworkError),
    #[error(transparent)] Crypto(#[from] CryptoError),
    #[error(transparent)] Address(#[from] AddressError),
    #[error(transparent)] ChainState(#[from] ChainStateError),
    #[error(transparent)] Config(#[from] ConfigError),
    #[error("storage: {0}")] Storage(String),
}
