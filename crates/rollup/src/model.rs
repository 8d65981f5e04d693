//! The mutex-guarded rollup state machine.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::Arc,
};

use claro_primitives::{
    AdvanceInput, CompletionStatus, InspectInput, Output, Report, RollupRequest,
};
use claro_storage::{InputStore, OutputStore, ReportStore};
use parking_lot::Mutex;
use tracing::*;

use alloy::primitives::{Address, B256, U256};

use crate::{RollupError, RollupResult};

/// An output emitted during the current advance, awaiting its global index.
#[derive(Clone, Debug)]
enum PendingOutput {
    Voucher {
        destination: Address,
        value: U256,
        payload: Vec<u8>,
    },
    Notice {
        payload: Vec<u8>,
    },
}

/// What the machine is currently doing.
enum Phase {
    Idle,
    Advance {
        input: AdvanceInput,
        outputs: Vec<PendingOutput>,
        reports: Vec<Vec<u8>>,
    },
    Inspect {
        input: InspectInput,
    },
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Advance { .. } => "advancing",
            Phase::Inspect { .. } => "inspecting",
        }
    }
}

struct ModelInner {
    phase: Phase,
    pending_advances: VecDeque<AdvanceInput>,
    pending_inspects: VecDeque<InspectInput>,
    completed_inspects: BTreeMap<u64, InspectInput>,
    next_inspect_index: u64,
}

/// Shared rollup state machine.
///
/// A single mutex guards all transitions; every operation holds it for its
/// full duration, so observers never see a half-applied finish.
pub struct RollupModel {
    inner: Mutex<ModelInner>,
    outputs: Arc<dyn OutputStore>,
    inputs: Arc<dyn InputStore>,
    reports: Arc<dyn ReportStore>,
}

impl RollupModel {
    pub fn new(
        outputs: Arc<dyn OutputStore>,
        inputs: Arc<dyn InputStore>,
        reports: Arc<dyn ReportStore>,
    ) -> Self {
        Self {
            inner: Mutex::new(ModelInner {
                phase: Phase::Idle,
                pending_advances: VecDeque::new(),
                pending_inspects: VecDeque::new(),
                completed_inspects: BTreeMap::new(),
                next_inspect_index: 0,
            }),
            outputs,
            inputs,
            reports,
        }
    }

    /// Queues an advance request and persists it as unprocessed, returning
    /// its input index.
    pub fn add_advance_input(
        &self,
        sender: Address,
        payload: Vec<u8>,
        block_number: u64,
        prev_randao: B256,
    ) -> RollupResult<u64> {
        let mut inner = self.inner.lock();
        let index = self.inputs.next_index()?;
        let input = AdvanceInput::new(index, sender, payload, block_number, prev_randao);
        self.inputs.create(input.clone())?;
        inner.pending_advances.push_back(input);
        debug!(%index, "queued advance input");
        Ok(index)
    }

    /// Queues an inspect request, returning its index.
    pub fn add_inspect_input(&self, payload: Vec<u8>) -> u64 {
        let mut inner = self.inner.lock();
        let index = inner.next_inspect_index;
        inner.next_inspect_index += 1;
        inner.pending_inspects.push_back(InspectInput::new(index, payload));
        debug!(%index, "queued inspect input");
        index
    }

    /// Finishes the current request with the given verdict and hands out the
    /// next one, inspects strictly first. Returns `None` when nothing is
    /// pending.
    pub fn finish_and_get_next(&self, accepted: bool) -> RollupResult<Option<RollupRequest>> {
        let mut inner = self.inner.lock();
        match std::mem::replace(&mut inner.phase, Phase::Idle) {
            Phase::Idle => {}
            Phase::Advance {
                input,
                outputs,
                reports,
            } => self.settle_advance(input, outputs, reports, accepted)?,
            Phase::Inspect { input } => self.settle_inspect(&mut inner, input, accepted)?,
        }
        Ok(self.take_next(&mut inner))
    }

    /// Emits a voucher during the current advance, returning its position in
    /// the input's emission order.
    pub fn add_voucher(
        &self,
        destination: Address,
        value: U256,
        payload: Vec<u8>,
    ) -> RollupResult<u64> {
        let mut inner = self.inner.lock();
        match &mut inner.phase {
            Phase::Advance { outputs, .. } => {
                outputs.push(PendingOutput::Voucher {
                    destination,
                    value,
                    payload,
                });
                Ok(outputs.len() as u64 - 1)
            }
            other => Err(wrong_state("add voucher", other)),
        }
    }

    /// Emits a notice during the current advance.
    pub fn add_notice(&self, payload: Vec<u8>) -> RollupResult<u64> {
        let mut inner = self.inner.lock();
        match &mut inner.phase {
            Phase::Advance { outputs, .. } => {
                outputs.push(PendingOutput::Notice { payload });
                Ok(outputs.len() as u64 - 1)
            }
            other => Err(wrong_state("add notice", other)),
        }
    }

    /// Emits a report; valid while advancing or inspecting.
    pub fn add_report(&self, payload: Vec<u8>) -> RollupResult<()> {
        let mut inner = self.inner.lock();
        match &mut inner.phase {
            Phase::Advance { reports, .. } => {
                reports.push(payload);
                Ok(())
            }
            Phase::Inspect { input } => {
                let index = input.reports.len() as u64;
                input.reports.push(Report {
                    input_index: input.index,
                    index,
                    payload,
                });
                Ok(())
            }
            other => Err(wrong_state("add report", other)),
        }
    }

    /// Marks the current request as failed with an application-level
    /// exception and returns the machine to idle.
    pub fn register_exception(&self, payload: Vec<u8>) -> RollupResult<()> {
        let mut inner = self.inner.lock();
        match std::mem::replace(&mut inner.phase, Phase::Idle) {
            Phase::Advance {
                mut input,
                reports,
                ..
            } => {
                input.status = CompletionStatus::Exception;
                input.exception = Some(payload);
                self.persist_reports(input.index, reports)?;
                self.inputs.update(input)?;
                Ok(())
            }
            Phase::Inspect { mut input } => {
                input.status = CompletionStatus::Exception;
                input.exception = Some(payload);
                input.processed_input_count = self.inputs.count_processed()?;
                inner.completed_inspects.insert(input.index, input);
                Ok(())
            }
            Phase::Idle => Err(wrong_state("register exception", &Phase::Idle)),
        }
    }

    /// The resolved inspect with the given index, if it finished.
    pub fn completed_inspect(&self, index: u64) -> Option<InspectInput> {
        self.inner.lock().completed_inspects.get(&index).cloned()
    }

    fn settle_advance(
        &self,
        mut input: AdvanceInput,
        pending: Vec<PendingOutput>,
        reports: Vec<Vec<u8>>,
        accepted: bool,
    ) -> RollupResult<()> {
        if accepted {
            input.status = CompletionStatus::Accepted;
            if !pending.is_empty() {
                let first = self.outputs.reserve_indices(pending.len() as u64)?;
                let outputs = pending
                    .into_iter()
                    .enumerate()
                    .map(|(i, out)| {
                        let output_index = first + i as u64;
                        match out {
                            PendingOutput::Voucher {
                                destination,
                                value,
                                payload,
                            } => Output::voucher(input.index, output_index, destination, value, payload),
                            PendingOutput::Notice { payload } => {
                                Output::notice(input.index, output_index, payload)
                            }
                        }
                    })
                    .collect();
                self.outputs.append_outputs(input.block_number, outputs)?;
            }
            info!(index = %input.index, "advance accepted");
        } else {
            // Rejected inputs keep their reports but lose their outputs.
            input.status = CompletionStatus::Rejected;
            info!(index = %input.index, "advance rejected");
        }
        self.persist_reports(input.index, reports)?;
        self.inputs.update(input)?;
        Ok(())
    }

    fn settle_inspect(
        &self,
        inner: &mut ModelInner,
        mut input: InspectInput,
        accepted: bool,
    ) -> RollupResult<()> {
        input.status = if accepted {
            CompletionStatus::Accepted
        } else {
            CompletionStatus::Rejected
        };
        input.processed_input_count = self.inputs.count_processed()?;
        info!(index = %input.index, "inspect resolved");
        inner.completed_inspects.insert(input.index, input);
        Ok(())
    }

    fn persist_reports(&self, input_index: u64, payloads: Vec<Vec<u8>>) -> RollupResult<()> {
        if payloads.is_empty() {
            return Ok(());
        }
        let reports = payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| Report {
                input_index,
                index: i as u64,
                payload,
            })
            .collect();
        self.reports.append_reports(reports)?;
        Ok(())
    }

    fn take_next(&self, inner: &mut ModelInner) -> Option<RollupRequest> {
        if let Some(input) = inner.pending_inspects.pop_front() {
            let request = RollupRequest::Inspect(input.clone());
            inner.phase = Phase::Inspect { input };
            return Some(request);
        }
        if let Some(input) = inner.pending_advances.pop_front() {
            let request = RollupRequest::Advance(input.clone());
            inner.phase = Phase::Advance {
                input,
                outputs: Vec::new(),
                reports: Vec::new(),
            };
            return Some(request);
        }
        None
    }
}

fn wrong_state(operation: &'static str, phase: &Phase) -> RollupError {
    RollupError::WrongState {
        operation,
        state: phase.name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claro_storage::{MemInputStore, MemOutputStore, MemReportStore};

    fn model() -> (RollupModel, Arc<MemOutputStore>, Arc<MemReportStore>) {
        let outputs = Arc::new(MemOutputStore::new());
        let reports = Arc::new(MemReportStore::new());
        let model = RollupModel::new(
            outputs.clone(),
            Arc::new(MemInputStore::new()),
            reports.clone(),
        );
        (model, outputs, reports)
    }

    fn advance(model: &RollupModel, block_number: u64) -> u64 {
        model
            .add_advance_input(Address::ZERO, b"in".to_vec(), block_number, B256::ZERO)
            .unwrap()
    }

    #[test]
    fn idle_with_nothing_pending_returns_none() {
        let (model, _, _) = model();
        assert!(model.finish_and_get_next(true).unwrap().is_none());
    }

    #[test]
    fn inspects_served_before_advances() {
        let (model, _, _) = model();
        advance(&model, 1);
        let inspect_index = model.add_inspect_input(b"q".to_vec());

        match model.finish_and_get_next(true).unwrap() {
            Some(RollupRequest::Inspect(input)) => assert_eq!(input.index, inspect_index),
            other => panic!("expected inspect first, got {other:?}"),
        }
        match model.finish_and_get_next(true).unwrap() {
            Some(RollupRequest::Advance(_)) => {}
            other => panic!("expected advance second, got {other:?}"),
        }
    }

    #[test]
    fn accepted_advance_persists_outputs_with_global_indices() {
        let (model, outputs, _) = model();
        advance(&model, 3);
        advance(&model, 7);

        // First input emits two outputs.
        model.finish_and_get_next(true).unwrap();
        model.add_voucher(Address::ZERO, U256::from(5), b"v".to_vec()).unwrap();
        model.add_notice(b"n".to_vec()).unwrap();
        // Accepting it starts the second input, which emits one more.
        model.finish_and_get_next(true).unwrap();
        model.add_notice(b"n2".to_vec()).unwrap();
        model.finish_and_get_next(true).unwrap();

        let stored = outputs.find_outputs(0, 10).unwrap();
        let indices: Vec<u64> = stored.iter().map(|o| o.output_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(stored[0].is_voucher());
        assert!(!stored[1].is_voucher());
        assert_eq!(stored[2].input_index, 1);
    }

    #[test]
    fn rejected_advance_discards_outputs_but_keeps_reports() {
        let (model, outputs, reports) = model();
        let index = advance(&model, 2);

        model.finish_and_get_next(true).unwrap();
        model.add_notice(b"gone".to_vec()).unwrap();
        model.add_report(b"diag".to_vec()).unwrap();
        model.finish_and_get_next(false).unwrap();

        assert!(outputs.find_outputs(0, 10).unwrap().is_empty());
        let stored = reports.find_by_input(index).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].payload, b"diag");
    }

    #[test]
    fn output_ops_rejected_outside_advance() {
        let (model, _, _) = model();
        assert!(matches!(
            model.add_voucher(Address::ZERO, U256::ZERO, vec![]),
            Err(RollupError::WrongState { .. })
        ));
        assert!(matches!(
            model.add_notice(vec![]),
            Err(RollupError::WrongState { .. })
        ));
        assert!(matches!(
            model.add_report(vec![]),
            Err(RollupError::WrongState { .. })
        ));
        assert!(matches!(
            model.register_exception(vec![]),
            Err(RollupError::WrongState { .. })
        ));

        // Reports are fine while inspecting, outputs are not.
        model.add_inspect_input(b"q".to_vec());
        model.finish_and_get_next(true).unwrap();
        model.add_report(b"r".to_vec()).unwrap();
        assert!(matches!(
            model.add_notice(vec![]),
            Err(RollupError::WrongState { .. })
        ));
    }

    #[test]
    fn inspect_completion_records_processed_count() {
        let (model, _, _) = model();
        advance(&model, 1);
        model.finish_and_get_next(true).unwrap(); // start the advance
        model.finish_and_get_next(true).unwrap(); // accept it

        let index = model.add_inspect_input(b"q".to_vec());
        model.finish_and_get_next(true).unwrap(); // start the inspect
        model.add_report(b"answer".to_vec()).unwrap();
        model.finish_and_get_next(true).unwrap();

        let done = model.completed_inspect(index).unwrap();
        assert_eq!(done.status, CompletionStatus::Accepted);
        assert_eq!(done.processed_input_count, 1);
        assert_eq!(done.reports.len(), 1);
    }

    #[test]
    fn exception_returns_machine_to_idle() {
        let (model, outputs, _) = model();
        advance(&model, 1);
        model.finish_and_get_next(true).unwrap();
        model.add_notice(b"n".to_vec()).unwrap();
        model.register_exception(b"boom".to_vec()).unwrap();

        // Exception drops the pending outputs and frees the machine.
        assert!(outputs.find_outputs(0, 10).unwrap().is_empty());
        assert!(model.finish_and_get_next(true).unwrap().is_none());
    }
}
