//! Long-polling for inspect resolution.

use std::time::Duration;

use claro_primitives::InspectInput;
use tokio::sync::watch;

use crate::model::RollupModel;

/// Polls the model until the inspect with `index` resolves.
///
/// Each poll takes the model lock briefly; the lock is never held across an
/// await. Returns `None` if `cancel` fires (or its sender is dropped) before
/// the inspect completes.
pub async fn wait_for_inspect(
    model: &RollupModel,
    index: u64,
    poll_interval: Duration,
    mut cancel: watch::Receiver<bool>,
) -> Option<InspectInput> {
    loop {
        if let Some(done) = model.completed_inspect(index) {
            return Some(done);
        }
        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            // A dropped sender counts as cancellation too.
            _ = cancel.wait_for(|stop| *stop) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use claro_storage::{MemInputStore, MemOutputStore, MemReportStore};

    fn model() -> Arc<RollupModel> {
        Arc::new(RollupModel::new(
            Arc::new(MemOutputStore::new()),
            Arc::new(MemInputStore::new()),
            Arc::new(MemReportStore::new()),
        ))
    }

    #[tokio::test]
    async fn resolves_once_inspect_completes() {
        let model = model();
        let index = model.add_inspect_input(b"q".to_vec());
        let (_tx, cancel) = watch::channel(false);

        let waiter = {
            let model = model.clone();
            tokio::spawn(async move {
                wait_for_inspect(&model, index, Duration::from_millis(5), cancel).await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        model.finish_and_get_next(true).unwrap(); // start the inspect
        model.finish_and_get_next(true).unwrap(); // resolve it

        let got = waiter.await.unwrap();
        assert_eq!(got.unwrap().index, index);
    }

    #[tokio::test]
    async fn cancellation_stops_the_wait() {
        let model = model();
        let index = model.add_inspect_input(b"q".to_vec());
        let (tx, cancel) = watch::channel(false);

        let waiter = {
            let model = model.clone();
            tokio::spawn(async move {
                wait_for_inspect(&model, index, Duration::from_millis(5), cancel).await
            })
        };

        tx.send(true).unwrap();
        assert!(waiter.await.unwrap().is_none());
    }
}
