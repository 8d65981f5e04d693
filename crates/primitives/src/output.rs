//! Inputs and the outputs they emit.

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Processing status of an input.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CompletionStatus {
    Unprocessed,
    Accepted,
    Rejected,
    Exception,
}

/// What kind of output a leaf commits to, with the kind-specific fields.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum OutputKind {
    /// Executable on the base chain against `destination`, carrying `value` wei.
    Voucher { destination: Address, value: U256 },
    /// Informational statement, payload only.
    Notice,
}

/// A single output emitted by an accepted input.
///
/// `output_index` is the output's leaf slot within the enclosing epoch's
/// commitment tree. Indices live in one shared space across vouchers and
/// notices and need not be contiguous; reusing an index is a caller error
/// caught at claim-build time.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub input_index: u64,
    pub output_index: u64,
    pub kind: OutputKind,
    pub payload: Vec<u8>,
}

impl Output {
    pub fn voucher(
        input_index: u64,
        output_index: u64,
        destination: Address,
        value: U256,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            input_index,
            output_index,
            kind: OutputKind::Voucher { destination, value },
            payload,
        }
    }

    pub fn notice(input_index: u64, output_index: u64, payload: Vec<u8>) -> Self {
        Self {
            input_index,
            output_index,
            kind: OutputKind::Notice,
            payload,
        }
    }

    pub fn is_voucher(&self) -> bool {
        matches!(self.kind, OutputKind::Voucher { .. })
    }
}

/// Diagnostic output; never committed to the epoch tree.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub input_index: u64,
    pub index: u64,
    pub payload: Vec<u8>,
}

/// An advance request queued for the application.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AdvanceInput {
    pub index: u64,
    pub sender: Address,
    pub payload: Vec<u8>,
    pub block_number: u64,
    pub prev_randao: B256,
    pub status: CompletionStatus,
    pub exception: Option<Vec<u8>>,
}

impl AdvanceInput {
    pub fn new(
        index: u64,
        sender: Address,
        payload: Vec<u8>,
        block_number: u64,
        prev_randao: B256,
    ) -> Self {
        Self {
            index,
            sender,
            payload,
            block_number,
            prev_randao,
            status: CompletionStatus::Unprocessed,
            exception: None,
        }
    }
}

/// An inspect request; resolved out-of-band of the advance stream.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct InspectInput {
    pub index: u64,
    pub payload: Vec<u8>,
    pub status: CompletionStatus,
    pub reports: Vec<Report>,
    /// Number of advance inputs processed when the inspect resolved.
    pub processed_input_count: u64,
    pub exception: Option<Vec<u8>>,
}

impl InspectInput {
    pub fn new(index: u64, payload: Vec<u8>) -> Self {
        Self {
            index,
            payload,
            status: CompletionStatus::Unprocessed,
            reports: Vec::new(),
            processed_input_count: 0,
            exception: None,
        }
    }
}

/// The next request handed to the application after a `finish` call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RollupRequest {
    Advance(AdvanceInput),
    Inspect(InspectInput),
}
