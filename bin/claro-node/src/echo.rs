//! Built-in echo application.
//!
//! Drives the rollup model directly: every advance input is echoed back as
//! a voucher to its sender, a notice and a report; inspects are answered
//! with a report carrying the query payload. Useful for exercising the
//! claim pipeline on a devnet without a real application attached.

use std::{sync::Arc, time::Duration};

use alloy::primitives::U256;
use claro_primitives::RollupRequest;
use claro_rollup::RollupModel;
use claro_tasks::ShutdownGuard;
use tracing::*;

pub async fn run_echo_app(
    model: Arc<RollupModel>,
    poll_interval: Duration,
    guard: ShutdownGuard,
) -> anyhow::Result<()> {
    info!("starting echo application");
    loop {
        if guard.should_shutdown() {
            return Ok(());
        }
        // Accepts the previous request (if any) and fetches the next one.
        match model.finish_and_get_next(true)? {
            Some(RollupRequest::Advance(input)) => {
                debug!(index = %input.index, "echo: handling advance");
                model.add_voucher(input.sender, U256::ZERO, input.payload.clone())?;
                model.add_notice(input.payload.clone())?;
                model.add_report(input.payload)?;
            }
            Some(RollupRequest::Inspect(input)) => {
                debug!(index = %input.index, "echo: handling inspect");
                model.add_report(input.payload)?;
            }
            None => {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = guard.wait_for_shutdown() => return Ok(()),
                }
            }
        }
    }
}
