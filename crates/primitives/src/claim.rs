//! Epoch commitments as they travel to and from the consensus contract.

use alloy::primitives::B256;
use serde::{Deserialize, Serialize};

/// Half-open block range `[start_block, end_block)` covered by one claim.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Epoch {
    pub start_block: u64,
    pub end_block: u64,
}

impl Epoch {
    pub fn new(start_block: u64, end_block: u64) -> Self {
        Self {
            start_block,
            end_block,
        }
    }

    /// Epoch ending at `end_block` with the given fixed length.
    pub fn ending_at(end_block: u64, epoch_length: u64) -> Self {
        Self {
            start_block: end_block.saturating_sub(epoch_length),
            end_block,
        }
    }

    pub fn contains_block(&self, block: u64) -> bool {
        block >= self.start_block && block < self.end_block
    }
}

/// A root hash plus the block range it commits to. Immutable once submitted.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub root: B256,
    pub epoch: Epoch,
}

impl Claim {
    pub fn new(root: B256, epoch: Epoch) -> Self {
        Self { root, epoch }
    }
}

/// Sibling path proving one output's inclusion under a claim root.
///
/// `siblings` holds exactly one digest per tree level, ordered leaf to root.
/// Bit `k` of `output_index` says whether the output's node is the left
/// (bit 0) or right (bit 1) child at level `k`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct OutputProof {
    pub output_index: u64,
    pub siblings: Vec<B256>,
}

impl OutputProof {
    pub fn new(output_index: u64, siblings: Vec<B256>) -> Self {
        Self {
            output_index,
            siblings,
        }
    }
}
