use claro_chainio::ChainError;
use claro_merkle::MerkleError;
use claro_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClaimError {
    /// No outputs in the epoch; the scheduler skips the claim and keeps
    /// running. Never a pipeline failure.
    #[error("epoch has no outputs")]
    EmptyEpoch,

    /// Two outputs were assigned the same leaf slot. Caller bug, not retried.
    #[error("duplicate output index {0}")]
    DuplicateIndex(u64),

    #[error("no consensus contract address available")]
    MissingConsensusAddress,

    #[error("no epoch end block available")]
    MissingEndBlock,

    #[error(transparent)]
    Merkle(#[from] MerkleError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}
