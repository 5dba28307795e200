use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use stockwatch_core::repo::project_repo::{ItemWithLinks, ScoreStore};
use stockwatch_core::{Item, ItemId, RecomputeTrigger, RepoError, RepoResult, ScoringService};
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

/// Score store whose reads wait for a permit, so tests can hold the worker
/// mid-recompute.
struct GatedStore {
    gate: Arc<Semaphore>,
    entered: mpsc::UnboundedSender<ItemId>,
    persisted: Mutex<Vec<(ItemId, f64)>>,
    failing: Option<ItemId>,
}

impl GatedStore {
    fn new(gate: Arc<Semaphore>, entered: mpsc::UnboundedSender<ItemId>) -> Self {
        Self {
            gate,
            entered,
            persisted: Mutex::new(Vec::new()),
            failing: None,
        }
    }

    fn persisted_ids(&self) -> Vec<ItemId> {
        self.persisted
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| *id)
            .collect()
    }
}

#[async_trait]
impl ScoreStore for GatedStore {
    async fn get_item_with_active_links(&self, item_id: ItemId) -> RepoResult<Option<ItemWithLinks>> {
        let _ = self.entered.send(item_id);
        self.gate.acquire().await.unwrap().forget();
        if self.failing == Some(item_id) {
            return Err(RepoError::InvalidData("corrupt row".to_string()));
        }
        let mut item = Item::new("gated", 1);
        item.uuid = item_id;
        Ok(Some(ItemWithLinks {
            item,
            links: Vec::new(),
        }))
    }

    async fn get_all_items_with_active_links(&self) -> RepoResult<Vec<ItemWithLinks>> {
        Ok(Vec::new())
    }

    async fn persist_importance_score(&self, item_id: ItemId, score: f64) -> RepoResult<()> {
        self.persisted.lock().unwrap().push((item_id, score));
        Ok(())
    }

    async fn list_top_items(&self, _limit: u32) -> RepoResult<Vec<Item>> {
        Ok(Vec::new())
    }

    async fn list_low_stock_scored_items(&self, _max_quantity: i64) -> RepoResult<Vec<Item>> {
        Ok(Vec::new())
    }

    async fn list_importance_scores(&self) -> RepoResult<Vec<f64>> {
        Ok(Vec::new())
    }
}

fn trigger_over(store: Arc<GatedStore>) -> RecomputeTrigger {
    RecomputeTrigger::spawn(Arc::new(ScoringService::new(store)))
}

#[tokio::test]
async fn pending_invalidations_are_coalesced_per_item() {
    let gate = Arc::new(Semaphore::new(0));
    let (entered_tx, mut entered) = mpsc::unbounded_channel();
    let store = Arc::new(GatedStore::new(gate.clone(), entered_tx));
    let trigger = trigger_over(store.clone());
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    trigger.invalidate(a);
    assert_eq!(entered.recv().await, Some(a));
    assert_eq!(trigger.pending(), 0);

    trigger.invalidate(b);
    trigger.invalidate(b);
    trigger.invalidate(b);
    assert_eq!(trigger.pending(), 1);

    // `a` is being recomputed, so a new invalidation queues it again.
    trigger.invalidate(a);
    assert_eq!(trigger.pending(), 2);

    gate.add_permits(3);
    trigger.settled().await;

    assert_eq!(store.persisted_ids(), vec![a, b, a]);
    assert_eq!(trigger.pending(), 0);
}

#[tokio::test]
async fn invalidate_does_not_wait_for_the_worker() {
    let gate = Arc::new(Semaphore::new(0));
    let (entered_tx, _entered) = mpsc::unbounded_channel();
    let store = Arc::new(GatedStore::new(gate.clone(), entered_tx));
    let trigger = trigger_over(store.clone());

    for _ in 0..50 {
        trigger.invalidate(Uuid::new_v4());
    }
    assert!(store.persisted_ids().is_empty());

    gate.add_permits(50);
    trigger.settled().await;
    assert_eq!(store.persisted_ids().len(), 50);
}

#[tokio::test]
async fn worker_survives_store_failures() {
    let gate = Arc::new(Semaphore::new(10));
    let (entered_tx, _entered) = mpsc::unbounded_channel();
    let broken = Uuid::new_v4();
    let healthy = Uuid::new_v4();
    let store = Arc::new(GatedStore {
        failing: Some(broken),
        ..GatedStore::new(gate, entered_tx)
    });
    let trigger = trigger_over(store.clone());

    trigger.invalidate(broken);
    trigger.invalidate(healthy);
    trigger.settled().await;

    assert_eq!(store.persisted_ids(), vec![healthy]);
}

#[tokio::test]
async fn shutdown_drains_the_queue_and_rejects_new_work() {
    let gate = Arc::new(Semaphore::new(0));
    let (entered_tx, _entered) = mpsc::unbounded_channel();
    let store = Arc::new(GatedStore::new(gate.clone(), entered_tx));
    let trigger = trigger_over(store.clone());

    let queued = (0..5).map(|_| Uuid::new_v4()).collect::<Vec<_>>();
    trigger.invalidate_all(queued.clone());
    gate.add_permits(5);
    trigger.shutdown().await;
    assert_eq!(store.persisted_ids(), queued);

    trigger.invalidate(Uuid::new_v4());
    assert_eq!(trigger.pending(), 0);
    trigger.settled().await;
    assert_eq!(store.persisted_ids().len(), 5);
}
