//! Alert use-case service.
//!
//! # Responsibility
//! - Run the evaluate → dispatch → persist cycle for the full inventory and
//!   for a single item whose quantity changed.
//! - Provide alert rule management for the CRUD layer.
//!
//! # Invariants
//! - `last_sent` of a dispatched batch is written once, after both channels
//!   were attempted, whatever their outcome.
//! - Recovered rules are re-armed (`last_sent = NULL`) without notifying.
//! - Channel failures only lower `sent`; they never surface as errors.
//! - Store failures surface to the caller. Both `last_sent` writes of a pass
//!   are attempted before the first failure is returned.

use crate::alerting::clock::Clock;
use crate::alerting::dispatcher::{DispatchReport, NotificationDispatcher};
use crate::alerting::evaluator::ThresholdEvaluator;
use crate::model::alert::{normalize_alert_name, validate_threshold, AlertId, AlertRule, AlertWithQuantity};
use crate::model::item::ItemId;
use crate::repo::alert_repo::AlertStore;
use crate::repo::{RepoError, RepoResult};
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Result of a full-inventory sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepResult {
    /// Active rules evaluated.
    pub checked: usize,
    /// Rules at or below threshold, notified now or inside the cooldown.
    pub triggered: usize,
    /// Rules delivered on at least one channel in this pass.
    pub sent: usize,
    /// Recovered rules re-armed in this pass.
    pub reset: usize,
    /// Channel outcomes; absent when nothing was due.
    pub dispatch: Option<DispatchReport>,
}

/// Result of a single-item check after a quantity change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemAlertCheck {
    pub triggered: usize,
    pub sent: usize,
    pub reset: usize,
}

/// Partial edit of an alert rule. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertUpdate {
    pub threshold: Option<f64>,
    /// `Some(None)` clears the name.
    pub name: Option<Option<String>>,
    pub is_active: Option<bool>,
}

pub struct AlertService {
    store: Arc<dyn AlertStore>,
    dispatcher: NotificationDispatcher,
    evaluator: ThresholdEvaluator,
    clock: Arc<dyn Clock>,
}

impl AlertService {
    pub fn new(
        store: Arc<dyn AlertStore>,
        dispatcher: NotificationDispatcher,
        evaluator: ThresholdEvaluator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            evaluator,
            clock,
        }
    }

    /// Evaluates every active rule and notifies the due ones.
    ///
    /// Safe to call repeatedly: the cooldown prevents duplicate sends.
    pub async fn run_full_alert_sweep(&self) -> RepoResult<SweepResult> {
        let started_at = Instant::now();
        info!("event=alert_sweep module=alerting status=start");

        let alerts = match self.store.list_active_alerts_with_item_quantity().await {
            Ok(alerts) => alerts,
            Err(err) => {
                error!(
                    "event=alert_sweep module=alerting status=error error_code={} error={}",
                    err.code(),
                    err
                );
                return Err(err);
            }
        };

        let result = self.process(alerts).await?;
        info!(
            "event=alert_sweep module=alerting status=ok checked={} triggered={} sent={} reset={} duration_ms={}",
            result.checked,
            result.triggered,
            result.sent,
            result.reset,
            started_at.elapsed().as_millis()
        );
        Ok(result)
    }

    /// Runs the same cycle restricted to one item, using `new_quantity` as
    /// the item's stock level.
    pub async fn check_item_alerts(
        &self,
        item_id: ItemId,
        new_quantity: i64,
    ) -> RepoResult<ItemAlertCheck> {
        let alerts = self
            .store
            .list_active_alerts_for_item(item_id)
            .await?
            .into_iter()
            .map(|alert| AlertWithQuantity {
                quantity: new_quantity,
                ..alert
            })
            .collect();

        let result = self.process(alerts).await?;
        info!(
            "event=item_alert_check module=alerting status=ok item={} quantity={} triggered={} sent={} reset={}",
            item_id, new_quantity, result.triggered, result.sent, result.reset
        );
        Ok(ItemAlertCheck {
            triggered: result.triggered,
            sent: result.sent,
            reset: result.reset,
        })
    }

    /// Dispatches due rules, then writes both `last_sent` batches. Both
    /// writes are attempted even when the first fails; the first failure is
    /// returned afterwards.
    async fn process(&self, alerts: Vec<AlertWithQuantity>) -> RepoResult<SweepResult> {
        let now = self.clock.now();
        let evaluation = self.evaluator.evaluate(alerts, now);
        let mut first_error = None;

        let mut sent = 0;
        let mut dispatch = None;
        if !evaluation.due.is_empty() {
            let report = self.dispatcher.dispatch(&evaluation.due).await;
            let due_ids = rule_ids(&evaluation.due);
            if report.delivered() {
                sent = due_ids.len();
            }
            if let Err(err) = self.store.set_last_sent(&due_ids, Some(now)).await {
                log_persist_failure("mark_sent", due_ids.len(), &err);
                first_error.get_or_insert(err);
            }
            dispatch = Some(report);
        }

        if !evaluation.recovered.is_empty() {
            let recovered_ids = rule_ids(&evaluation.recovered);
            if let Err(err) = self.store.set_last_sent(&recovered_ids, None).await {
                log_persist_failure("rearm", recovered_ids.len(), &err);
                first_error.get_or_insert(err);
            }
        }

        if let Some(err) = first_error {
            error!(
                "event=alert_sweep module=alerting status=error error_code={} checked={} triggered={} sent={} reset={}",
                err.code(),
                evaluation.checked(),
                evaluation.triggered(),
                sent,
                evaluation.recovered.len()
            );
            return Err(err);
        }

        Ok(SweepResult {
            checked: evaluation.checked(),
            triggered: evaluation.triggered(),
            sent,
            reset: evaluation.recovered.len(),
            dispatch,
        })
    }

    /// Sweeps every `interval` until `shutdown` is cancelled.
    ///
    /// A failed sweep is logged and the loop keeps going.
    pub async fn run_sweep_loop(&self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "event=alert_sweep_loop module=alerting status=start interval_secs={}",
            interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.run_full_alert_sweep().await {
                        warn!(
                            "event=alert_sweep_loop module=alerting status=error error_code={} error={}",
                            err.code(),
                            err
                        );
                    }
                }
            }
        }

        info!("event=alert_sweep_loop module=alerting status=stopped");
    }

    /// Creates an armed rule for `item_id`.
    pub async fn create_alert(
        &self,
        item_id: ItemId,
        threshold: f64,
        name: Option<String>,
    ) -> RepoResult<AlertRule> {
        let rule = AlertRule::new(item_id, threshold, name);
        self.store.create_alert(&rule).await?;
        info!(
            "event=alert_create module=alerting status=ok alert={} item={} threshold={}",
            rule.uuid, item_id, threshold
        );
        Ok(rule)
    }

    /// Applies a partial edit; `last_sent` is left untouched.
    pub async fn update_alert(&self, id: AlertId, update: AlertUpdate) -> RepoResult<AlertRule> {
        let mut rule = self
            .store
            .get_alert(id)
            .await?
            .ok_or_else(|| RepoError::not_found("alert", id))?;

        if let Some(threshold) = update.threshold {
            validate_threshold(threshold)?;
            rule.threshold = threshold;
        }
        if let Some(name) = update.name {
            rule.name = normalize_alert_name(name);
        }
        if let Some(is_active) = update.is_active {
            rule.is_active = is_active;
        }

        self.store.update_alert(&rule).await?;
        Ok(rule)
    }

    pub async fn delete_alert(&self, id: AlertId) -> RepoResult<()> {
        self.store.delete_alert(id).await
    }

    pub async fn get_alert(&self, id: AlertId) -> RepoResult<Option<AlertRule>> {
        self.store.get_alert(id).await
    }

    pub async fn list_alerts_for_item(&self, item_id: ItemId) -> RepoResult<Vec<AlertRule>> {
        self.store.list_alerts_for_item(item_id).await
    }
}

fn log_persist_failure(step: &str, rules: usize, err: &RepoError) {
    error!(
        "event=alert_sweep module=alerting status=error step={} rules={} error_code={} error={}",
        step,
        rules,
        err.code(),
        err
    );
}

fn rule_ids(alerts: &[AlertWithQuantity]) -> Vec<AlertId> {
    alerts.iter().map(|alert| alert.rule.uuid).collect()
}
