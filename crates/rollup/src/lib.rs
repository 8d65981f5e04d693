//! Input-processing state machine for the dev node.
//!
//! The application drives a [`RollupModel`] through a finish loop: it asks
//! for the next request, processes it while emitting vouchers, notices and
//! reports, and calls finish again with the verdict. Inspect requests are
//! always served before queued advances.

pub mod inspect;
pub mod model;

use thiserror::Error;

pub use inspect::wait_for_inspect;
pub use model::RollupModel;

#[derive(Error, Debug)]
pub enum RollupError {
    /// The operation is not valid in the machine's current state.
    #[error("cannot {operation} while {state}")]
    WrongState {
        operation: &'static str,
        state: &'static str,
    },

    #[error(transparent)]
    Storage(#[from] claro_storage::StorageError),
}

pub type RollupResult<T> = Result<T, RollupError>;
