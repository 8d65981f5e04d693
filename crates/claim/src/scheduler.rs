//! Drives one claim per epoch off the live head stream.

use std::sync::Arc;

use alloy::primitives::Address;
use claro_chainio::{ChainHead, ConsensusTransactor};
use claro_primitives::{Claim, Epoch};
use claro_storage::{OutputStore, ProofStore};
use claro_tasks::ShutdownGuard;
use tokio::sync::mpsc;
use tracing::*;

use crate::{build_epoch_commitment, ClaimError, ClaimSubmitter};

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Epoch length in blocks; boundaries sit at multiples of it.
    pub epoch_length: u64,
    /// Consensus contract, if already known. Missing at the first boundary
    /// is a fatal precondition failure.
    pub consensus: Option<Address>,
    /// Application the claims are for.
    pub app: Address,
}

/// Watches head heights and closes each epoch exactly once.
///
/// Heads may arrive more than once (the watcher redelivers after catch-up);
/// a boundary already claimed is ignored. Pipeline errors other than an
/// empty epoch abort the run and surface through the task manager.
pub struct EpochScheduler<T> {
    outputs: Arc<dyn OutputStore>,
    proofs: Arc<dyn ProofStore>,
    submitter: ClaimSubmitter<T>,
    config: SchedulerConfig,
    last_claimed: Option<u64>,
}

impl<T: ConsensusTransactor> EpochScheduler<T> {
    pub fn new(
        outputs: Arc<dyn OutputStore>,
        proofs: Arc<dyn ProofStore>,
        submitter: ClaimSubmitter<T>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            outputs,
            proofs,
            submitter,
            config,
            last_claimed: None,
        }
    }

    pub async fn run(
        mut self,
        mut heads: mpsc::Receiver<ChainHead>,
        guard: ShutdownGuard,
    ) -> Result<(), ClaimError> {
        loop {
            tokio::select! {
                head = heads.recv() => match head {
                    Some(head) => {
                        // Shutdown must also interrupt an in-flight
                        // submit-and-confirm, not just the idle wait.
                        tokio::select! {
                            res = self.on_head(head) => res?,
                            _ = guard.wait_for_shutdown() => return Ok(()),
                        }
                    }
                    None => {
                        info!("head stream closed, scheduler exiting");
                        return Ok(());
                    }
                },
                _ = guard.wait_for_shutdown() => return Ok(()),
            }
        }
    }

    async fn on_head(&mut self, head: ChainHead) -> Result<(), ClaimError> {
        let height = head.number;
        if height == 0 || height % self.config.epoch_length != 0 {
            return Ok(());
        }
        if self.last_claimed.is_some_and(|claimed| height <= claimed) {
            trace!(height, "boundary already claimed");
            return Ok(());
        }
        self.close_epoch(height).await
    }

    async fn close_epoch(&mut self, end_block: u64) -> Result<(), ClaimError> {
        let epoch = Epoch::ending_at(end_block, self.config.epoch_length);
        let outputs = self.outputs.find_outputs(epoch.start_block, epoch.end_block)?;

        let commitment = match build_epoch_commitment(&outputs) {
            Ok(commitment) => commitment,
            Err(ClaimError::EmptyEpoch) => {
                info!(?epoch, "epoch has no outputs, skipping claim");
                self.last_claimed = Some(end_block);
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        for proof in commitment.proofs.values() {
            self.proofs.store_proof(proof)?;
        }

        let claim = Claim::new(commitment.root, epoch);
        let pending = self
            .submitter
            .submit(
                self.config.consensus,
                self.config.app,
                claim.root,
                Some(epoch.end_block),
            )
            .await?;
        let confirmed = self.submitter.await_confirmation(pending).await?;

        let vouchers = outputs.iter().filter(|o| o.is_voucher()).count();
        info!(
            root = %confirmed.root,
            start_block = epoch.start_block,
            end_block = epoch.end_block,
            vouchers,
            notices = outputs.len() - vouchers,
            "epoch claimed"
        );
        self.last_claimed = Some(end_block);
        Ok(())
    }
}
