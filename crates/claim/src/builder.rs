//! Builds the commitment for one epoch's outputs.

use std::collections::BTreeMap;

use alloy::primitives::B256;
use claro_merkle::{output_tree, LeafMap};
use claro_primitives::{leaf_hash, Output, OutputProof};

use crate::ClaimError;

/// An epoch's root together with an inclusion proof for every output.
#[derive(Clone, Debug)]
pub struct EpochCommitment {
    pub root: B256,
    pub proofs: BTreeMap<u64, OutputProof>,
}

/// Hashes every output into its leaf slot and fills the tree once.
///
/// Fails with [`ClaimError::EmptyEpoch`] for an empty slice and with
/// [`ClaimError::DuplicateIndex`] when two outputs share a slot; neither
/// case produces a partial commitment.
pub fn build_epoch_commitment(outputs: &[Output]) -> Result<EpochCommitment, ClaimError> {
    if outputs.is_empty() {
        return Err(ClaimError::EmptyEpoch);
    }

    let mut leaves = LeafMap::new();
    for output in outputs {
        if leaves.insert(output.output_index, leaf_hash(output)).is_some() {
            return Err(ClaimError::DuplicateIndex(output.output_index));
        }
    }

    let filled = output_tree().fill(&leaves)?;
    let root = filled.root();

    let mut proofs = BTreeMap::new();
    for &index in leaves.keys() {
        proofs.insert(index, OutputProof::new(index, filled.proof(index)?));
    }

    Ok(EpochCommitment { root, proofs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use claro_merkle::fold_proof;

    fn notice(output_index: u64, payload: &[u8]) -> Output {
        Output::notice(0, output_index, payload.to_vec())
    }

    #[test]
    fn empty_epoch_is_rejected() {
        assert!(matches!(
            build_epoch_commitment(&[]),
            Err(ClaimError::EmptyEpoch)
        ));
    }

    #[test]
    fn duplicate_index_is_rejected() {
        let outputs = [notice(3, b"a"), notice(5, b"b"), notice(3, b"c")];
        assert!(matches!(
            build_epoch_commitment(&outputs),
            Err(ClaimError::DuplicateIndex(3))
        ));
    }

    #[test]
    fn every_proof_folds_back_to_the_root() {
        let outputs = [notice(0, b"a"), notice(1, b"b"), notice(7, b"c")];
        let commitment = build_epoch_commitment(&outputs).unwrap();

        assert_eq!(commitment.proofs.len(), 3);
        for output in &outputs {
            let proof = &commitment.proofs[&output.output_index];
            let folded = fold_proof(leaf_hash(output), proof.output_index, &proof.siblings);
            assert_eq!(folded, commitment.root);
        }
    }

    #[test]
    fn root_depends_on_leaf_placement() {
        let a = build_epoch_commitment(&[notice(0, b"x")]).unwrap();
        let b = build_epoch_commitment(&[notice(1, b"x")]).unwrap();
        assert_ne!(a.root, b.root);
    }
}
