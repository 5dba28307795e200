//! Background recomputation of stale importance scores.
//!
//! # Responsibility
//! - Accept `invalidate(item_id)` from mutation sites without blocking them.
//! - Recompute and persist stale scores on one dedicated worker task.
//!
//! # Invariants
//! - An item is queued at most once while pending; it is removed from the
//!   pending set right before its recompute starts, so an invalidation that
//!   arrives mid-recompute queues it again.
//! - Recomputes run one at a time, in invalidation order.
//! - Worker failures are logged and never reach the publisher.
//! - `shutdown` drains everything queued before it returns.

use crate::model::item::ItemId;
use crate::scoring::service::ScoringService;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

struct TriggerState {
    pending: Mutex<HashSet<ItemId>>,
    /// Queued plus in-flight recomputes.
    outstanding: watch::Sender<usize>,
}

impl TriggerState {
    fn pending(&self) -> std::sync::MutexGuard<'_, HashSet<ItemId>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Work queue that keeps persisted importance scores fresh.
pub struct RecomputeTrigger {
    sender: Mutex<Option<mpsc::UnboundedSender<ItemId>>>,
    state: Arc<TriggerState>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RecomputeTrigger {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn(scoring: Arc<ScoringService>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (outstanding, _) = watch::channel(0usize);
        let state = Arc::new(TriggerState {
            pending: Mutex::new(HashSet::new()),
            outstanding,
        });

        let worker = tokio::spawn(run_worker(scoring, receiver, Arc::clone(&state)));
        info!("event=recompute_worker module=scoring status=start");

        Self {
            sender: Mutex::new(Some(sender)),
            state,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Marks `item_id` stale. Returns immediately.
    pub fn invalidate(&self, item_id: ItemId) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(sender) = sender.as_ref() else {
            warn!("event=recompute_invalidate module=scoring status=skipped item={item_id} reason=shut_down");
            return;
        };

        let mut pending = self.state.pending();
        if !pending.insert(item_id) {
            debug!("event=recompute_invalidate module=scoring status=coalesced item={item_id}");
            return;
        }

        self.state.outstanding.send_modify(|count| *count += 1);
        if sender.send(item_id).is_err() {
            pending.remove(&item_id);
            self.state.outstanding.send_modify(|count| *count -= 1);
            warn!("event=recompute_invalidate module=scoring status=error item={item_id} reason=worker_gone");
        }
    }

    pub fn invalidate_all(&self, item_ids: impl IntoIterator<Item = ItemId>) {
        for item_id in item_ids {
            self.invalidate(item_id);
        }
    }

    /// Items queued and not yet picked up by the worker.
    pub fn pending(&self) -> usize {
        self.state.pending().len()
    }

    /// Resolves once nothing is queued or being recomputed.
    pub async fn settled(&self) {
        let mut outstanding = self.state.outstanding.subscribe();
        // The sender lives in `state`, so the channel cannot close here.
        let _ = outstanding.wait_for(|count| *count == 0).await;
    }

    /// Stops accepting invalidations, drains the queue and joins the worker.
    pub async fn shutdown(&self) {
        drop(
            self.sender
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take(),
        );
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                error!("event=recompute_worker module=scoring status=error error={err}");
            }
        }
    }
}

async fn run_worker(
    scoring: Arc<ScoringService>,
    mut receiver: mpsc::UnboundedReceiver<ItemId>,
    state: Arc<TriggerState>,
) {
    let mut processed: u64 = 0;
    while let Some(item_id) = receiver.recv().await {
        state.pending().remove(&item_id);

        match scoring.recalculate_item_score(item_id).await {
            Ok(Some(_)) => processed += 1,
            Ok(None) => {
                debug!("event=recompute_item module=scoring status=skipped item={item_id} reason=item_missing");
            }
            Err(err) => {
                error!(
                    "event=recompute_item module=scoring status=error item={} error_code={} error={}",
                    item_id,
                    err.code(),
                    err
                );
            }
        }

        state.outstanding.send_modify(|count| *count -= 1);
    }

    info!("event=recompute_worker module=scoring status=stopped processed={processed}");
}
