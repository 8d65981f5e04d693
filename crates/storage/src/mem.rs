//! In-memory stores backing the dev node.

use std::collections::{BTreeMap, BTreeSet};

use claro_primitives::{AdvanceInput, CompletionStatus, Epoch, Output, OutputProof, Report};
use parking_lot::RwLock;

use crate::{InputStore, OutputStore, ProofStore, ReportStore, StorageError, StorageResult};

#[derive(Default)]
struct OutputsInner {
    /// Keyed by output index; iteration order is index order.
    by_index: BTreeMap<u64, (u64, Output)>,
    next_index: u64,
}

#[derive(Default)]
pub struct MemOutputStore {
    inner: RwLock<OutputsInner>,
}

impl MemOutputStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputStore for MemOutputStore {
    fn reserve_indices(&self, count: u64) -> StorageResult<u64> {
        let mut inner = self.inner.write();
        let first = inner.next_index;
        inner.next_index += count;
        Ok(first)
    }

    fn append_outputs(&self, block_number: u64, outputs: Vec<Output>) -> StorageResult<()> {
        let mut inner = self.inner.write();
        let mut batch = BTreeSet::new();
        for output in &outputs {
            if inner.by_index.contains_key(&output.output_index) || !batch.insert(output.output_index)
            {
                return Err(StorageError::DuplicateOutput(output.output_index));
            }
        }
        for output in outputs {
            inner
                .by_index
                .insert(output.output_index, (block_number, output));
        }
        Ok(())
    }

    fn find_outputs(&self, start_block: u64, end_block: u64) -> StorageResult<Vec<Output>> {
        let epoch = Epoch::new(start_block, end_block);
        let inner = self.inner.read();
        Ok(inner
            .by_index
            .values()
            .filter(|(block, _)| epoch.contains_block(*block))
            .map(|(_, output)| output.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct MemProofStore {
    proofs: RwLock<BTreeMap<u64, OutputProof>>,
}

impl MemProofStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProofStore for MemProofStore {
    fn store_proof(&self, proof: &OutputProof) -> StorageResult<()> {
        self.proofs
            .write()
            .insert(proof.output_index, proof.clone());
        Ok(())
    }

    fn load_proof(&self, output_index: u64) -> StorageResult<Option<OutputProof>> {
        Ok(self.proofs.read().get(&output_index).cloned())
    }
}

#[derive(Default)]
pub struct MemInputStore {
    inputs: RwLock<Vec<AdvanceInput>>,
}

impl MemInputStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputStore for MemInputStore {
    fn next_index(&self) -> StorageResult<u64> {
        Ok(self.inputs.read().len() as u64)
    }

    fn create(&self, input: AdvanceInput) -> StorageResult<()> {
        self.inputs.write().push(input);
        Ok(())
    }

    fn update(&self, input: AdvanceInput) -> StorageResult<()> {
        let mut inputs = self.inputs.write();
        let slot = inputs
            .iter_mut()
            .find(|i| i.index == input.index)
            .ok_or(StorageError::MissingInput(input.index))?;
        *slot = input;
        Ok(())
    }

    fn find_first_by_status(
        &self,
        status: CompletionStatus,
    ) -> StorageResult<Option<AdvanceInput>> {
        Ok(self
            .inputs
            .read()
            .iter()
            .find(|i| i.status == status)
            .cloned())
    }

    fn count_processed(&self) -> StorageResult<u64> {
        Ok(self
            .inputs
            .read()
            .iter()
            .filter(|i| i.status != CompletionStatus::Unprocessed)
            .count() as u64)
    }
}

#[derive(Default)]
pub struct MemReportStore {
    reports: RwLock<Vec<Report>>,
}

impl MemReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportStore for MemReportStore {
    fn append_reports(&self, reports: Vec<Report>) -> StorageResult<()> {
        self.reports.write().extend(reports);
        Ok(())
    }

    fn find_by_input(&self, input_index: u64) -> StorageResult<Vec<Report>> {
        Ok(self
            .reports
            .read()
            .iter()
            .filter(|r| r.input_index == input_index)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::Address;

    use super::*;

    #[test]
    fn outputs_filtered_by_block_and_ordered_by_index() {
        let store = MemOutputStore::new();
        let first = store.reserve_indices(3).unwrap();
        assert_eq!(first, 0);

        store
            .append_outputs(
                5,
                vec![Output::notice(0, 2, vec![2]), Output::notice(0, 0, vec![0])],
            )
            .unwrap();
        store
            .append_outputs(12, vec![Output::notice(1, 1, vec![1])])
            .unwrap();

        let in_range = store.find_outputs(0, 10).unwrap();
        let indices: Vec<u64> = in_range.iter().map(|o| o.output_index).collect();
        assert_eq!(indices, vec![0, 2]);

        assert!(store.find_outputs(20, 30).unwrap().is_empty());
    }

    #[test]
    fn append_rejects_reused_output_index() {
        let store = MemOutputStore::new();
        store
            .append_outputs(1, vec![Output::notice(0, 0, vec![0])])
            .unwrap();

        let err = store
            .append_outputs(2, vec![Output::notice(1, 0, vec![1])])
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateOutput(0)));

        // The original output survives untouched.
        let stored = store.find_outputs(0, 10).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].payload, vec![0]);
    }

    #[test]
    fn reserve_indices_is_monotonic() {
        let store = MemOutputStore::new();
        assert_eq!(store.reserve_indices(2).unwrap(), 0);
        assert_eq!(store.reserve_indices(1).unwrap(), 2);
        assert_eq!(store.reserve_indices(4).unwrap(), 3);
    }

    #[test]
    fn proof_round_trip() {
        let store = MemProofStore::new();
        let proof = OutputProof::new(7, vec![Default::default(); 3]);
        store.store_proof(&proof).unwrap();
        assert_eq!(store.load_proof(7).unwrap(), Some(proof));
        assert_eq!(store.load_proof(8).unwrap(), None);
    }

    #[test]
    fn input_lifecycle() {
        let store = MemInputStore::new();
        assert_eq!(store.next_index().unwrap(), 0);

        let mut input = AdvanceInput::new(0, Address::ZERO, vec![1], 3, Default::default());
        store.create(input.clone()).unwrap();
        assert_eq!(store.next_index().unwrap(), 1);
        assert_eq!(store.count_processed().unwrap(), 0);

        input.status = CompletionStatus::Accepted;
        store.update(input.clone()).unwrap();
        assert_eq!(store.count_processed().unwrap(), 1);
        assert!(store
            .find_first_by_status(CompletionStatus::Unprocessed)
            .unwrap()
            .is_none());

        let missing = AdvanceInput::new(9, Address::ZERO, vec![], 0, Default::default());
        assert!(matches!(
            store.update(missing).unwrap_err(),
            StorageError::MissingInput(9)
        ));
    }
}
