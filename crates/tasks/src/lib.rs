//! Critical task spawning with panic capture and graceful shutdown.
//!
//! The node's long-running workers (head watcher, epoch scheduler) are
//! spawned as critical tasks: a panic or a fatal error in any of them is
//! reported to the [`TaskManager`], which triggers shutdown of everything
//! else and surfaces the failure to the caller of [`TaskManager::monitor`].

use std::{
    any::Any,
    future::Future,
    panic,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use futures_util::FutureExt;
use tokio::{
    runtime::Handle,
    sync::{mpsc, watch},
};
use tracing::{error, info, warn};

/// A critical task that stopped the node, by panicking or by returning a
/// fatal error.
#[derive(Debug, thiserror::Error)]
#[error("critical task `{task_name}` failed: {reason}")]
pub struct CriticalTaskError {
    task_name: String,
    reason: String,
}

impl CriticalTaskError {
    fn from_panic(task_name: &str, payload: Box<dyn Any + Send>) -> Self {
        let reason = payload
            .downcast::<String>()
            .map(|s| *s)
            .or_else(|p| p.downcast::<&str>().map(|s| s.to_string()))
            .unwrap_or_else(|_| "panicked".to_string());
        Self {
            task_name: task_name.to_string(),
            reason,
        }
    }

    fn from_error(task_name: &str, err: anyhow::Error) -> Self {
        Self {
            task_name: task_name.to_string(),
            reason: format!("{err:#}"),
        }
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }
}

/// Shutdown trigger shared by the manager and every spawned task.
#[derive(Clone, Debug)]
pub struct ShutdownSignal(watch::Sender<bool>);

impl ShutdownSignal {
    fn new() -> Self {
        Self(watch::channel(false).0)
    }

    /// Tells every subscribed task to wind down.
    pub fn send(&self) {
        let _ = self.0.send(true);
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.0.subscribe()
    }
}

/// Per-task view of the shutdown signal; also counts the task as pending
/// until dropped so the manager can wait for drain.
pub struct ShutdownGuard {
    rx: watch::Receiver<bool>,
    pending: Arc<AtomicUsize>,
}

impl ShutdownGuard {
    fn new(rx: watch::Receiver<bool>, pending: Arc<AtomicUsize>) -> Self {
        pending.fetch_add(1, Ordering::SeqCst);
        Self { rx, pending }
    }

    pub fn should_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been signalled.
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.rx.clone();
        // wait_for returns immediately if the value is already true
        let _ = rx.wait_for(|sd| *sd).await;
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Spawns and tracks critical tasks; owns the shutdown signal.
pub struct TaskManager {
    tokio_handle: Handle,
    failure_tx: mpsc::UnboundedSender<CriticalTaskError>,
    failure_rx: mpsc::UnboundedReceiver<CriticalTaskError>,
    shutdown_signal: ShutdownSignal,
    pending_tasks: Arc<AtomicUsize>,
}

impl TaskManager {
    pub fn new(tokio_handle: Handle) -> Self {
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();
        Self {
            tokio_handle,
            failure_tx,
            failure_rx,
            shutdown_signal: ShutdownSignal::new(),
            pending_tasks: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn executor(&self) -> TaskExecutor {
        TaskExecutor {
            tokio_handle: self.tokio_handle.clone(),
            failure_tx: self.failure_tx.clone(),
            shutdown_signal: self.shutdown_signal.clone(),
            pending_tasks: self.pending_tasks.clone(),
        }
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown_signal.clone()
    }

    /// Sends shutdown on ctrl-c.
    pub fn start_signal_listener(&self) {
        let shutdown_signal = self.shutdown_signal();
        self.tokio_handle.spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            warn!("got INT, initiating shutdown");
            shutdown_signal.send();
        });
    }

    /// Blocks until a critical task fails (returns the error) or shutdown is
    /// signalled externally (returns `Ok`), then waits up to `timeout` for
    /// remaining tasks to drain.
    pub fn monitor(mut self, timeout: Option<Duration>) -> Result<(), CriticalTaskError> {
        let mut shutdown_rx = self.shutdown_signal.subscribe();
        let res = self.tokio_handle.clone().block_on(async {
            tokio::select! {
                failure = self.failure_rx.recv() => match failure {
                    Some(err) => Err(err),
                    None => Ok(()),
                },
                _ = shutdown_rx.wait_for(|sd| *sd) => Ok(()),
            }
        });

        self.shutdown_signal.send();
        if !self.wait_for_drain(timeout) {
            info!("shutdown timeout expired, exiting with tasks pending");
        }

        res
    }

    fn wait_for_drain(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        while self.pending_tasks.load(Ordering::SeqCst) > 0 {
            if deadline.is_some_and(|d| Instant::now() > d) {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        true
    }
}

/// Handle for spawning critical tasks; cheap to clone via [`TaskManager::executor`].
#[derive(Debug)]
pub struct TaskExecutor {
    tokio_handle: Handle,
    failure_tx: mpsc::UnboundedSender<CriticalTaskError>,
    shutdown_signal: ShutdownSignal,
    pending_tasks: Arc<AtomicUsize>,
}

impl TaskExecutor {
    fn guard(&self) -> ShutdownGuard {
        ShutdownGuard::new(self.shutdown_signal.subscribe(), self.pending_tasks.clone())
    }

    /// Spawns a blocking critical task on its own thread. The closure should
    /// poll its [`ShutdownGuard`] and return when asked to stop; an `Err` or
    /// a panic brings the node down.
    pub fn spawn_critical<F>(&self, name: &'static str, func: F)
    where
        F: FnOnce(ShutdownGuard) -> anyhow::Result<()> + Send + 'static,
    {
        let failure_tx = self.failure_tx.clone();
        let guard = self.guard();

        info!(%name, "starting critical task");
        std::thread::spawn(move || {
            let result = panic::catch_unwind(panic::AssertUnwindSafe(|| func(guard)));
            match result {
                Ok(Ok(())) => info!(%name, "critical task finished"),
                Ok(Err(err)) => {
                    let task_error = CriticalTaskError::from_error(name, err);
                    error!(%name, err = %task_error, "critical task failed");
                    let _ = failure_tx.send(task_error);
                }
                Err(payload) => {
                    let task_error = CriticalTaskError::from_panic(name, payload);
                    error!(%name, err = %task_error, "critical task panicked");
                    let _ = failure_tx.send(task_error);
                }
            }
        });
    }

    /// Spawns an async critical task on the runtime. Same failure semantics
    /// as [`TaskExecutor::spawn_critical`].
    pub fn spawn_critical_async<F, Fut>(&self, name: &'static str, task_fn: F)
    where
        F: FnOnce(ShutdownGuard) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let failure_tx = self.failure_tx.clone();
        let fut = task_fn(self.guard());

        info!(%name, "starting critical async task");
        self.tokio_handle.spawn(async move {
            match panic::AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => info!(%name, "critical task finished"),
                Ok(Err(err)) => {
                    let task_error = CriticalTaskError::from_error(name, err);
                    error!(%name, err = %task_error, "critical task failed");
                    let _ = failure_tx.send(task_error);
                }
                Err(payload) => {
                    let task_error = CriticalTaskError::from_panic(name, payload);
                    error!(%name, err = %task_error, "critical task panicked");
                    let _ = failure_tx.send(task_error);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_reports_panicking_task() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let manager = TaskManager::new(runtime.handle().clone());
        let executor = manager.executor();

        let original_hook = panic::take_hook();
        panic::set_hook(Box::new(|_| {}));

        executor.spawn_critical("panictask", |_| panic!("intentional panic"));

        let err = manager
            .monitor(Some(Duration::from_secs(5)))
            .expect_err("should surface the panic");
        panic::set_hook(original_hook);

        assert_eq!(err.task_name(), "panictask");
    }

    #[test]
    fn monitor_reports_fatal_error() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let manager = TaskManager::new(runtime.handle().clone());
        let executor = manager.executor();

        executor.spawn_critical_async("fataltask", |_| async {
            Err(anyhow::anyhow!("epoch claim failed"))
        });

        let err = manager
            .monitor(Some(Duration::from_secs(5)))
            .expect_err("should surface the error");
        assert_eq!(err.task_name(), "fataltask");
    }

    #[test]
    fn monitor_returns_ok_on_external_shutdown() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let manager = TaskManager::new(runtime.handle().clone());
        let executor = manager.executor();

        executor.spawn_critical("worker", |guard| {
            while !guard.should_shutdown() {
                std::thread::sleep(Duration::from_millis(10));
            }
            Ok(())
        });

        let signal = manager.shutdown_signal();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            signal.send();
        });

        let res = manager.monitor(Some(Duration::from_secs(5)));
        assert!(res.is_ok());
    }

    #[test]
    fn async_task_sees_shutdown() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let manager = TaskManager::new(runtime.handle().clone());
        let executor = manager.executor();

        executor.spawn_critical_async("async-worker", |guard| async move {
            guard.wait_for_shutdown().await;
            Ok(())
        });

        let signal = manager.shutdown_signal();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            signal.send();
        });

        assert!(manager.monitor(Some(Duration::from_secs(5))).is_ok());
    }
}
