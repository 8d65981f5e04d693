//! Core domain types shared across the claro workspace.

pub mod claim;
pub mod encode;
pub mod output;

pub use claim::{Claim, Epoch, OutputProof};
pub use encode::leaf_hash;
pub use output::{
    AdvanceInput, CompletionStatus, InspectInput, Output, OutputKind, Report, RollupRequest,
};
