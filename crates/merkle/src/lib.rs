//! Fixed-depth sparse merkle accumulator for epoch output commitments.
//!
//! The tree is conceptually a complete binary tree of depth `D` (2^D leaf
//! slots), but only populated slots are ever materialized. Every
//! unpopulated subtree collapses to a precomputed zero hash for its level,
//! so computing the root and extracting proofs over `n` leaves costs
//! `O(n * D)` regardless of how sparse the indices are.

use std::{collections::BTreeMap, sync::OnceLock};

use alloy::primitives::{keccak256, B256};

pub mod error;

pub use error::MerkleError;

/// Depth of the epoch output tree (2^63 leaf slots).
pub const OUTPUT_TREE_DEPTH: usize = 63;

/// Sparse map from leaf slot to leaf digest.
pub type LeafMap = BTreeMap<u64, B256>;

/// Pairwise combine used at every level: `keccak256(left || right)`.
/// The same function drives root computation, proof extraction, and
/// [`fold_proof`], so proofs verify without the original leaf set.
fn combine(left: &B256, right: &B256) -> B256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left.as_slice());
    buf[32..].copy_from_slice(right.as_slice());
    keccak256(buf)
}

/// `zero[0]` is the hash of an all-zero leaf; `zero[k + 1] = H(zero[k] || zero[k])`.
/// The table has `depth + 1` entries, with `zero[depth]` the empty root.
fn build_zero_table(depth: usize) -> Vec<B256> {
    let mut table = Vec::with_capacity(depth + 1);
    let mut acc = keccak256([0u8; 32]);
    table.push(acc);
    for _ in 0..depth {
        acc = combine(&acc, &acc);
        table.push(acc);
    }
    table
}

/// A fixed-depth accumulator with its zero-hash table.
///
/// Stateless with respect to leaves: concurrent root/proof computations over
/// different snapshots need no synchronization.
#[derive(Debug)]
pub struct OutputTree {
    depth: usize,
    zero: Vec<B256>,
}

impl OutputTree {
    pub fn new(depth: usize) -> Result<Self, MerkleError> {
        if depth == 0 || depth > OUTPUT_TREE_DEPTH {
            return Err(MerkleError::UnsupportedDepth(depth));
        }
        Ok(Self {
            depth,
            zero: build_zero_table(depth),
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Root of the empty tree, `zero[depth]`.
    pub fn empty_root(&self) -> B256 {
        self.zero[self.depth]
    }

    /// Computes the root over the supplied sparse leaves.
    pub fn root(&self, leaves: &LeafMap) -> Result<B256, MerkleError> {
        Ok(self.fill(leaves)?.root())
    }

    /// Builds the sibling path for one leaf slot; exactly `depth` digests,
    /// ordered leaf to root.
    pub fn proof(&self, index: u64, leaves: &LeafMap) -> Result<Vec<B256>, MerkleError> {
        self.fill(leaves)?.proof(index)
    }

    /// One bottom-up pass retaining the touched nodes of every level, so a
    /// caller producing proofs for all populated slots pays `O(n * depth)`
    /// once instead of per proof.
    pub fn fill(&self, leaves: &LeafMap) -> Result<FilledTree<'_>, MerkleError> {
        for index in leaves.keys() {
            self.check_index(*index)?;
        }

        let mut levels = Vec::with_capacity(self.depth + 1);
        levels.push(leaves.clone());
        for level in 0..self.depth {
            let cur = &levels[level];
            let mut next = LeafMap::new();
            for &index in cur.keys() {
                let parent = index >> 1;
                if next.contains_key(&parent) {
                    continue;
                }
                let left = self.node(cur, level, parent << 1);
                let right = self.node(cur, level, (parent << 1) | 1);
                next.insert(parent, combine(&left, &right));
            }
            levels.push(next);
        }

        Ok(FilledTree { tree: self, levels })
    }

    /// Rejects indices at or beyond 2^depth; never truncates.
    fn check_index(&self, index: u64) -> Result<(), MerkleError> {
        if index >> self.depth != 0 {
            return Err(MerkleError::IndexOutOfRange(index));
        }
        Ok(())
    }

    fn node(&self, level_map: &LeafMap, level: usize, index: u64) -> B256 {
        level_map
            .get(&index)
            .copied()
            .unwrap_or(self.zero[level])
    }
}

/// The touched nodes of a tree built from one leaf snapshot.
pub struct FilledTree<'t> {
    tree: &'t OutputTree,
    levels: Vec<LeafMap>,
}

impl FilledTree<'_> {
    pub fn root(&self) -> B256 {
        let top = self.levels.last().expect("merkle: levels nonempty");
        top.get(&0)
            .copied()
            .unwrap_or(self.tree.zero[self.tree.depth])
    }

    pub fn proof(&self, index: u64) -> Result<Vec<B256>, MerkleError> {
        self.tree.check_index(index)?;
        let mut siblings = Vec::with_capacity(self.tree.depth);
        let mut idx = index;
        for level in 0..self.tree.depth {
            siblings.push(self.tree.node(&self.levels[level], level, idx ^ 1));
            idx >>= 1;
        }
        Ok(siblings)
    }
}

/// Re-derives a root from a leaf and its sibling path, consuming one bit of
/// `index` per level (bit 0 picks left/right at level 0, and so on).
pub fn fold_proof(leaf: B256, index: u64, siblings: &[B256]) -> B256 {
    let mut acc = leaf;
    let mut idx = index;
    for sibling in siblings {
        acc = if idx & 1 == 0 {
            combine(&acc, sibling)
        } else {
            combine(sibling, &acc)
        };
        idx >>= 1;
    }
    acc
}

/// The process-wide depth-63 tree; the zero table is computed once and
/// read-only afterwards.
pub fn output_tree() -> &'static OutputTree {
    static TREE: OnceLock<OutputTree> = OnceLock::new();
    TREE.get_or_init(|| OutputTree::new(OUTPUT_TREE_DEPTH).expect("merkle: output tree depth"))
}
