//! Persistence contracts consumed by the rollup model and the claim
//! pipeline, plus the in-memory implementations backing the dev node.
//!
//! Durable backends (SQL and friends) implement these same traits; nothing
//! in the pipeline assumes the in-memory versions.

use claro_primitives::{AdvanceInput, CompletionStatus, Output, OutputProof, Report};
use thiserror::Error;

pub mod mem;

pub use mem::{MemInputStore, MemOutputStore, MemProofStore, MemReportStore};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("advance input {0} not found")]
    MissingInput(u64),

    #[error("output index {0} already stored")]
    DuplicateOutput(u64),

    #[error("storage backend: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Outputs accumulated for later epoch commitment.
///
/// Vouchers and notices share one global index space; `reserve_indices`
/// hands out the next contiguous run so concurrent writers never collide.
pub trait OutputStore: Send + Sync {
    /// Reserves `count` output indices, returning the first.
    fn reserve_indices(&self, count: u64) -> StorageResult<u64>;

    /// Persists finalized outputs, tagged with the block that accepted them.
    /// Writing to an index that is already stored is an error; nothing is
    /// written in that case.
    fn append_outputs(&self, block_number: u64, outputs: Vec<Output>) -> StorageResult<()>;

    /// All outputs accepted within `[start_block, end_block)`, ordered by
    /// `output_index`.
    fn find_outputs(&self, start_block: u64, end_block: u64) -> StorageResult<Vec<Output>>;
}

/// Inclusion proofs generated at epoch close, keyed by output index.
pub trait ProofStore: Send + Sync {
    fn store_proof(&self, proof: &OutputProof) -> StorageResult<()>;

    fn load_proof(&self, output_index: u64) -> StorageResult<Option<OutputProof>>;
}

/// Advance inputs and their lifecycle.
pub trait InputStore: Send + Sync {
    /// Next input index (monotonic, equals the number of inputs created).
    fn next_index(&self) -> StorageResult<u64>;

    fn create(&self, input: AdvanceInput) -> StorageResult<()>;

    /// Replaces the stored input with the same index.
    fn update(&self, input: AdvanceInput) -> StorageResult<()>;

    /// Oldest input with the given status, if any.
    fn find_first_by_status(&self, status: CompletionStatus)
        -> StorageResult<Option<AdvanceInput>>;

    /// Number of inputs that have left `Unprocessed`.
    fn count_processed(&self) -> StorageResult<u64>;
}

/// Reports, kept for diagnostics; never part of a commitment.
pub trait ReportStore: Send + Sync {
    fn append_reports(&self, reports: Vec<Report>) -> StorageResult<()>;

    fn find_by_input(&self, input_index: u64) -> StorageResult<Vec<Report>>;
}
