//! Error types for the index monitor

use solana_client::client_error::ClientError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Debug, Error)]
pub enum IndexerError {
    /// Invalid monitoring or registry input (empty basket, unknown symbol, ...)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No usable wallet keypair at the configured path
    #[error("wallet unavailable at {path}: {reason}")]
    WalletUnavailable { path: String, reason: String },

    /// RPC or transaction failure against the cluster
    #[error("remote call failed: {0}")]
    RemoteCall(#[from] ClientError),

    /// Storage account bytes did not match the index program layout
    #[error("storage account decode failed: {0}")]
    StorageDecode(String),

    /// Instruction argument serialization failure
    #[error("instruction encoding failed: {0}")]
    Encode(#[from] std::io::Error),

    /// Oracle subscription failure
    #[error("price feed error: {0}")]
    Feed(String),
}

impl IndexerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
