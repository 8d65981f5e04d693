//! Seams between the pipeline and the chain; mocked out in tests.

use alloy::{
    primitives::{Address, B256},
    rpc::types::Log,
};
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::ChainResult;

/// A delivered chain head.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChainHead {
    pub number: u64,
    pub hash: B256,
}

/// A mined transaction as seen by the claim pipeline.
#[derive(Clone, Debug)]
pub struct MinedTx {
    pub tx_hash: B256,
    pub success: bool,
    pub logs: Vec<Log>,
}

/// Read access to the base chain.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Current tip height.
    async fn block_number(&self) -> ChainResult<u64>;

    /// Hash of the block at `height`, if the chain has reached it.
    async fn block_hash(&self, height: u64) -> ChainResult<Option<B256>>;

    /// Opens one live head subscription. The channel closes when the
    /// underlying subscription drops; resubscription is the caller's job.
    async fn subscribe_heads(&self) -> ChainResult<mpsc::Receiver<ChainHead>>;
}

/// Write access to the consensus contract.
#[async_trait]
pub trait ConsensusTransactor: Send + Sync {
    /// Sends `submitClaim(app, last_processed_block, claim)` to `consensus`,
    /// returning the transaction hash.
    async fn submit_claim(
        &self,
        consensus: Address,
        app: Address,
        last_processed_block: u64,
        claim: B256,
    ) -> ChainResult<B256>;

    /// Waits for the transaction to be mined and returns its receipt view.
    async fn wait_mined(&self, tx_hash: B256) -> ChainResult<MinedTx>;
}
