//! The epoch claim pipeline: commitment building, claim submission and the
//! head-driven scheduler tying them together.

pub mod builder;
pub mod errors;
pub mod scheduler;
pub mod submitter;

pub use builder::{build_epoch_commitment, EpochCommitment};
pub use errors::ClaimError;
pub use scheduler::{EpochScheduler, SchedulerConfig};
pub use submitter::{ClaimSubmitter, ConfirmedClaim, PendingClaim};
