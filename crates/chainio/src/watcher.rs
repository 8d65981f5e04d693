//! Live block head delivery with reconnect and catch-up.

use std::{sync::Arc, time::Duration};

use claro_tasks::ShutdownGuard;
use tokio::sync::mpsc;
use tracing::*;

use crate::traits::{ChainHead, ChainReader};

#[derive(Clone, Debug)]
pub struct WatcherConfig {
    /// Fixed wait before resubscribing after the subscription drops.
    pub resubscribe_backoff: Duration,
    /// Upper bound on heights re-read per catch-up pass.
    pub max_catch_up: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            resubscribe_backoff: Duration::from_secs(1),
            max_catch_up: 128,
        }
    }
}

/// Owns the head subscription and feeds the scheduler.
///
/// When the subscription drops, the watcher backs off, re-reads any heights
/// missed since the last delivered head (the last one may be delivered
/// again; consumers tolerate redelivery) and resubscribes. Runs until the
/// shutdown guard fires or the consumer goes away.
pub struct HeadWatcher<R> {
    reader: Arc<R>,
    config: WatcherConfig,
}

impl<R: ChainReader> HeadWatcher<R> {
    pub fn new(reader: Arc<R>, config: WatcherConfig) -> Self {
        Self { reader, config }
    }

    pub async fn run(
        self,
        out: mpsc::Sender<ChainHead>,
        guard: ShutdownGuard,
    ) -> anyhow::Result<()> {
        let mut last_delivered: Option<u64> = None;

        while !guard.should_shutdown() {
            match self.reader.subscribe_heads().await {
                Ok(mut heads) => loop {
                    tokio::select! {
                        head = heads.recv() => match head {
                            Some(head) => {
                                trace!(number = %head.number, "head received");
                                last_delivered = Some(head.number);
                                if out.send(head).await.is_err() {
                                    info!("head consumer gone, watcher exiting");
                                    return Ok(());
                                }
                            }
                            None => {
                                warn!("head subscription dropped");
                                break;
                            }
                        },
                        _ = guard.wait_for_shutdown() => return Ok(()),
                    }
                },
                Err(err) => warn!(%err, "head subscription failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.resubscribe_backoff) => {}
                _ = guard.wait_for_shutdown() => return Ok(()),
            }

            if let Some(from) = last_delivered {
                if let Err(err) = self.catch_up(from, &out).await {
                    warn!(%err, "catch-up read failed");
                }
            }
        }
        Ok(())
    }

    /// Re-reads `[from, tip]`, bounded by `max_catch_up`. `from` is the last
    /// delivered height, so that height may be delivered twice.
    async fn catch_up(&self, from: u64, out: &mpsc::Sender<ChainHead>) -> anyhow::Result<()> {
        let tip = self.reader.block_number().await?;
        let to = tip.min(from.saturating_add(self.config.max_catch_up));
        for height in from..=to {
            if let Some(hash) = self.reader.block_hash(height).await? {
                let head = ChainHead {
                    number: height,
                    hash,
                };
                if out.send(head).await.is_err() {
                    break;
                }
            }
        }
        Ok(())
    }
}
