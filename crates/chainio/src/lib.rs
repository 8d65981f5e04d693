//! Base-chain access: consensus contract bindings, the websocket RPC
//! client, the block head watcher and the devnet bootstrap.

pub mod bindings;
pub mod bootstrap;
pub mod client;
pub mod traits;
pub mod watcher;

use alloy::primitives::B256;
use thiserror::Error;

pub use bootstrap::{bootstrap_devnet, DevnetAddresses};
pub use client::EthClient;
pub use traits::{ChainHead, ChainReader, ConsensusTransactor, MinedTx};
pub use watcher::{HeadWatcher, WatcherConfig};

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("rpc transport: {0}")]
    Transport(String),

    #[error("transaction {0} reverted")]
    TxReverted(B256),

    #[error("no creation event in receipt of transaction {0}")]
    MissingCreationEvent(B256),
}

impl From<alloy::transports::TransportError> for ChainError {
    fn from(err: alloy::transports::TransportError) -> Self {
        ChainError::Transport(err.to_string())
    }
}

pub type ChainResult<T> = Result<T, ChainError>;
