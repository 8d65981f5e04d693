//! Websocket RPC client used by the dev node.
//!
//! Transactions are sent as `eth_sendTransaction` from an account the dev
//! chain keeps unlocked (anvil semantics); no local signing happens here.

use std::time::Duration;

use alloy::{
    eips::BlockNumberOrTag,
    network::TransactionBuilder,
    primitives::{Address, B256, U256},
    providers::{Provider, RootProvider, WsConnect},
    pubsub::PubSubFrontend,
    rpc::{client::ClientBuilder, types::TransactionRequest},
    sol_types::SolCall,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::*;

use crate::{
    bindings::IConsensus,
    traits::{ChainHead, ChainReader, ConsensusTransactor, MinedTx},
    ChainError, ChainResult,
};

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(250);
const HEAD_CHANNEL_CAPACITY: usize = 64;

pub struct EthClient {
    provider: RootProvider<PubSubFrontend>,
    sender: Address,
}

impl EthClient {
    /// Connects to the chain over websocket. `sender` is the unlocked
    /// account transactions are sent from.
    pub async fn connect(ws_url: &str, sender: Address) -> ChainResult<Self> {
        let client = ClientBuilder::default().ws(WsConnect::new(ws_url)).await?;
        info!(%ws_url, "connected to chain");
        Ok(Self {
            provider: RootProvider::new(client),
            sender,
        })
    }

    /// Sends a contract call from the unlocked sender account.
    pub(crate) async fn send_call(&self, to: Address, calldata: Vec<u8>) -> ChainResult<B256> {
        let tx = TransactionRequest::default()
            .with_from(self.sender)
            .with_to(to)
            .with_input(calldata);
        let pending = self.provider.send_transaction(tx).await?;
        Ok(*pending.tx_hash())
    }
}

#[async_trait]
impl ChainReader for EthClient {
    async fn block_number(&self) -> ChainResult<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn block_hash(&self, height: u64) -> ChainResult<Option<B256>> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(height), false)
            .await?;
        Ok(block.map(|b| b.header.hash))
    }

    async fn subscribe_heads(&self) -> ChainResult<mpsc::Receiver<ChainHead>> {
        let sub = self.provider.subscribe_blocks().await?;
        let (tx, rx) = mpsc::channel(HEAD_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut stream = sub.into_stream();
            while let Some(block) = stream.next().await {
                let head = ChainHead {
                    number: block.header.number,
                    hash: block.header.hash,
                };
                if tx.send(head).await.is_err() {
                    break;
                }
            }
            // Dropping tx closes the channel and signals the watcher.
        });
        Ok(rx)
    }
}

#[async_trait]
impl ConsensusTransactor for EthClient {
    async fn submit_claim(
        &self,
        consensus: Address,
        app: Address,
        last_processed_block: u64,
        claim: B256,
    ) -> ChainResult<B256> {
        let call = IConsensus::submitClaimCall {
            appContract: app,
            lastProcessedBlockNumber: U256::from(last_processed_block),
            claim,
        };
        let tx_hash = self.send_call(consensus, call.abi_encode()).await?;
        debug!(%tx_hash, %consensus, "submitClaim sent");
        Ok(tx_hash)
    }

    async fn wait_mined(&self, tx_hash: B256) -> ChainResult<MinedTx> {
        loop {
            if let Some(receipt) = self.provider.get_transaction_receipt(tx_hash).await? {
                return Ok(MinedTx {
                    tx_hash,
                    success: receipt.status(),
                    logs: receipt.inner.logs().to_vec(),
                });
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}
