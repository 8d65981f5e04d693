//! Sends claims to the consensus contract and confirms them.

use std::sync::Arc;

use alloy::{
    primitives::{Address, B256},
    rpc::types::Log,
    sol_types::SolEvent,
};
use claro_chainio::{bindings::IConsensus, ChainError, ConsensusTransactor};
use tracing::*;

use crate::ClaimError;

/// A claim accepted by the chain's mempool, not yet mined.
#[derive(Clone, Debug)]
pub struct PendingClaim {
    pub app: Address,
    pub root: B256,
    pub end_block: u64,
    pub tx_hash: B256,
}

/// A claim whose transaction succeeded on chain.
///
/// `submitter` is filled from the `ClaimSubmission` event when the receipt
/// carries one; its absence does not undo the confirmation.
#[derive(Clone, Debug)]
pub struct ConfirmedClaim {
    pub app: Address,
    pub root: B256,
    pub end_block: u64,
    pub tx_hash: B256,
    pub submitter: Option<Address>,
}

pub struct ClaimSubmitter<T> {
    transactor: Arc<T>,
}

impl<T: ConsensusTransactor> ClaimSubmitter<T> {
    pub fn new(transactor: Arc<T>) -> Self {
        Self { transactor }
    }

    /// Submits `root` as the claim for the epoch ending at `end_block`.
    ///
    /// Both the consensus address and the end block must be known up front;
    /// a precondition failure is returned immediately and never retried.
    pub async fn submit(
        &self,
        consensus: Option<Address>,
        app: Address,
        root: B256,
        end_block: Option<u64>,
    ) -> Result<PendingClaim, ClaimError> {
        let consensus = consensus.ok_or(ClaimError::MissingConsensusAddress)?;
        let end_block = end_block.ok_or(ClaimError::MissingEndBlock)?;

        let tx_hash = self
            .transactor
            .submit_claim(consensus, app, end_block, root)
            .await?;
        debug!(%tx_hash, %root, end_block, "claim submitted");

        Ok(PendingClaim {
            app,
            root,
            end_block,
            tx_hash,
        })
    }

    /// Waits for the claim transaction to be mined.
    ///
    /// Transaction success alone confirms the claim; the receipt's logs are
    /// scanned for the `ClaimSubmission` event only to learn the submitter,
    /// and logs that fail to decode are skipped.
    pub async fn await_confirmation(
        &self,
        pending: PendingClaim,
    ) -> Result<ConfirmedClaim, ClaimError> {
        let mined = self.transactor.wait_mined(pending.tx_hash).await?;
        if !mined.success {
            return Err(ChainError::TxReverted(pending.tx_hash).into());
        }

        let submitter = mined
            .logs
            .iter()
            .filter_map(decode_claim_submission)
            .find(|(app, _)| *app == pending.app)
            .map(|(_, submitter)| submitter);

        info!(
            root = %pending.root,
            end_block = pending.end_block,
            ?submitter,
            "claim confirmed"
        );

        Ok(ConfirmedClaim {
            app: pending.app,
            root: pending.root,
            end_block: pending.end_block,
            tx_hash: pending.tx_hash,
            submitter,
        })
    }
}

fn decode_claim_submission(log: &Log) -> Option<(Address, Address)> {
    IConsensus::ClaimSubmission::decode_log(&log.inner, true)
        .ok()
        .map(|ev| (ev.data.appContract, ev.data.submitter))
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloy::primitives::{keccak256, LogData, U256};
    use async_trait::async_trait;
    use claro_chainio::{ChainResult, MinedTx};
    use parking_lot::Mutex;

    /// Transactor returning canned receipts; records every submission.
    struct MockTransactor {
        submissions: Mutex<Vec<(Address, Address, u64, B256)>>,
        mined: MinedTx,
    }

    impl MockTransactor {
        fn mining(mined: MinedTx) -> Arc<Self> {
            Arc::new(Self {
                submissions: Mutex::new(Vec::new()),
                mined,
            })
        }
    }

    #[async_trait]
    impl ConsensusTransactor for MockTransactor {
        async fn submit_claim(
            &self,
            consensus: Address,
            app: Address,
            last_processed_block: u64,
            claim: B256,
        ) -> ChainResult<B256> {
            self.submissions
                .lock()
                .push((consensus, app, last_processed_block, claim));
            Ok(self.mined.tx_hash)
        }

        async fn wait_mined(&self, _tx_hash: B256) -> ChainResult<MinedTx> {
            Ok(self.mined.clone())
        }
    }

    fn success_tx(logs: Vec<Log>) -> MinedTx {
        MinedTx {
            tx_hash: keccak256(b"tx"),
            success: true,
            logs,
        }
    }

    fn claim_submission_log(submitter: Address, app: Address, end_block: u64, root: B256) -> Log {
        let topics = vec![
            IConsensus::ClaimSubmission::SIGNATURE_HASH,
            submitter.into_word(),
            app.into_word(),
        ];
        let mut data = Vec::with_capacity(64);
        data.extend_from_slice(&U256::from(end_block).to_be_bytes::<32>());
        data.extend_from_slice(root.as_slice());
        Log {
            inner: alloy::primitives::Log {
                address: Address::ZERO,
                data: LogData::new_unchecked(topics, data.into()),
            },
            ..Default::default()
        }
    }

    #[test]
    fn missing_preconditions_fail_fast() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let submitter = ClaimSubmitter::new(MockTransactor::mining(success_tx(vec![])));

        let err = runtime
            .block_on(submitter.submit(None, Address::ZERO, B256::ZERO, Some(10)))
            .unwrap_err();
        assert!(matches!(err, ClaimError::MissingConsensusAddress));

        let err = runtime
            .block_on(submitter.submit(Some(Address::ZERO), Address::ZERO, B256::ZERO, None))
            .unwrap_err();
        assert!(matches!(err, ClaimError::MissingEndBlock));
    }

    #[tokio::test]
    async fn success_without_event_still_confirms() {
        let transactor = MockTransactor::mining(success_tx(vec![]));
        let submitter = ClaimSubmitter::new(transactor);

        let app = Address::with_last_byte(1);
        let pending = submitter
            .submit(Some(Address::with_last_byte(9)), app, keccak256(b"root"), Some(10))
            .await
            .unwrap();
        let confirmed = submitter.await_confirmation(pending).await.unwrap();

        assert!(confirmed.submitter.is_none());
        assert_eq!(confirmed.end_block, 10);
    }

    #[tokio::test]
    async fn event_fills_in_the_submitter() {
        let app = Address::with_last_byte(1);
        let author = Address::with_last_byte(7);
        let root = keccak256(b"root");
        let transactor =
            MockTransactor::mining(success_tx(vec![claim_submission_log(author, app, 10, root)]));
        let submitter = ClaimSubmitter::new(transactor);

        let pending = submitter
            .submit(Some(Address::with_last_byte(9)), app, root, Some(10))
            .await
            .unwrap();
        let confirmed = submitter.await_confirmation(pending).await.unwrap();

        assert_eq!(confirmed.submitter, Some(author));
    }

    #[tokio::test]
    async fn reverted_transaction_fails_confirmation() {
        let mut mined = success_tx(vec![]);
        mined.success = false;
        let submitter = ClaimSubmitter::new(MockTransactor::mining(mined));

        let pending = submitter
            .submit(Some(Address::ZERO), Address::ZERO, B256::ZERO, Some(10))
            .await
            .unwrap();
        let err = submitter.await_confirmation(pending).await.unwrap_err();
        assert!(matches!(err, ClaimError::Chain(ChainError::TxReverted(_))));
    }
}
