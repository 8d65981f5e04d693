//! Claro dev node entry point.

use std::{sync::Arc, time::Duration};

use claro_chainio::{bootstrap_devnet, EthClient, HeadWatcher, WatcherConfig};
use claro_claim::{ClaimSubmitter, EpochScheduler, SchedulerConfig};
use claro_common::logging;
use claro_rollup::RollupModel;
use claro_storage::{MemInputStore, MemOutputStore, MemProofStore, MemReportStore};
use claro_tasks::{TaskExecutor, TaskManager};
use tokio::sync::mpsc;
use tracing::*;

use crate::{args::Args, config::Config};

mod args;
mod config;
mod echo;
mod errors;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const HEAD_QUEUE_CAPACITY: usize = 64;

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    if let Err(e) = main_inner(args) {
        eprintln!("FATAL ERROR: {e}");
        return Err(e);
    }
    Ok(())
}

fn main_inner(args: Args) -> anyhow::Result<()> {
    // Start runtime for async IO tasks.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("claro-rt")
        .build()
        .expect("init: build rt");

    logging::init(logging::LoggerConfig::with_base_name("claro-node"));

    let config = config::load_config(&args.config, &args)?;
    debug!(?config, "loaded configuration");

    let task_manager = TaskManager::new(runtime.handle().clone());
    task_manager.start_signal_listener();
    let executor = task_manager.executor();

    runtime.block_on(start_services(&executor, config))?;

    let res = task_manager.monitor(Some(SHUTDOWN_TIMEOUT));
    logging::finalize();
    res.map_err(Into::into)
}

async fn start_services(executor: &TaskExecutor, config: Config) -> anyhow::Result<()> {
    let client = Arc::new(EthClient::connect(&config.chain.ws_url, config.chain.sender).await?);

    // In-memory stores back the dev node end to end.
    let outputs = Arc::new(MemOutputStore::new());
    let proofs = Arc::new(MemProofStore::new());

    if config.rollup.echo_app {
        let model = Arc::new(RollupModel::new(
            outputs.clone(),
            Arc::new(MemInputStore::new()),
            Arc::new(MemReportStore::new()),
        ));
        let poll_interval = Duration::from_millis(config.rollup.inspect_poll_ms);
        executor.spawn_critical_async("echo-app", move |guard| {
            echo::run_echo_app(model, poll_interval, guard)
        });
    }

    let (consensus, app) = resolve_contracts(&client, &config).await?;
    info!(?consensus, %app, "contract addresses resolved");

    let (head_tx, head_rx) = mpsc::channel(HEAD_QUEUE_CAPACITY);
    let watcher = HeadWatcher::new(
        client.clone(),
        WatcherConfig {
            resubscribe_backoff: Duration::from_millis(config.chain.resubscribe_backoff_ms),
            max_catch_up: config.chain.max_catch_up,
        },
    );
    executor.spawn_critical_async("head-watcher", move |guard| watcher.run(head_tx, guard));

    let scheduler = EpochScheduler::new(
        outputs,
        proofs,
        ClaimSubmitter::new(client),
        SchedulerConfig {
            epoch_length: config.chain.epoch_length,
            consensus,
            app,
        },
    );
    executor.spawn_critical_async("epoch-scheduler", move |guard| async move {
        scheduler.run(head_rx, guard).await?;
        Ok(())
    });

    Ok(())
}

/// Uses the configured consensus and application addresses, deploying both
/// through the devnet factories when they are absent.
async fn resolve_contracts(
    client: &EthClient,
    config: &Config,
) -> anyhow::Result<(Option<alloy::primitives::Address>, alloy::primitives::Address)> {
    if let (Some(consensus), Some(app)) = (config.chain.consensus, config.chain.app) {
        return Ok((Some(consensus), app));
    }

    match (
        config.chain.authority_factory,
        config.chain.application_factory,
    ) {
        (Some(authority_factory), Some(application_factory)) => {
            let addresses = bootstrap_devnet(
                client,
                authority_factory,
                application_factory,
                config.chain.sender,
                config.chain.epoch_length,
            )
            .await?;
            Ok((Some(addresses.consensus), addresses.app))
        }
        _ => anyhow::bail!(
            "chain.consensus and chain.app must be set, or both factory addresses \
             provided for devnet bootstrap"
        ),
    }
}
