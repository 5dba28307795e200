//! Scoring use-case service.
//!
//! # Responsibility
//! - Recompute and persist importance scores (one item or all items).
//! - Answer ranking and statistics queries from persisted scores.
//!
//! # Invariants
//! - This service is the only writer of `items.importance_score`.
//! - Ranking and statistics never recompute; they scan persisted values.
//! - One item's persistence failure does not abort `recalculate_all_scores`.

use crate::model::item::{Item, ItemId};
use crate::repo::project_repo::ScoreStore;
use crate::repo::RepoResult;
use crate::scoring::engine::{compute_score, ScoreBreakdown};
use log::{debug, error, info};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_CRITICAL_MAX_QUANTITY: i64 = 5;
pub const DEFAULT_CRITICAL_LIMIT: usize = 20;
pub const DEFAULT_TOP_ITEMS_LIMIT: usize = 10;
/// Floor for the stock divisor in the criticality ratio.
const MIN_RATIO_QUANTITY: f64 = 0.1;

/// Summary of a full recomputation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecalculationSummary {
    pub updated: usize,
    pub errors: usize,
    /// Highest scores of this pass, descending.
    pub top_items: Vec<ScoreBreakdown>,
}

/// Low-stock item ranked by restocking urgency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalItem {
    pub item: Item,
    pub criticality_ratio: f64,
}

/// Fixed-bucket histogram of importance scores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScoreDistribution {
    /// `s == 0`
    pub zero: usize,
    /// `0 < s <= 1`
    pub low: usize,
    /// `1 < s <= 5`
    pub medium: usize,
    /// `5 < s <= 10`
    pub high: usize,
    /// `s > 10`
    pub critical: usize,
}

impl ScoreDistribution {
    fn record(&mut self, score: f64) {
        let bucket = if score <= 0.0 {
            &mut self.zero
        } else if score <= 1.0 {
            &mut self.low
        } else if score <= 5.0 {
            &mut self.medium
        } else if score <= 10.0 {
            &mut self.high
        } else {
            &mut self.critical
        };
        *bucket += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreStatistics {
    pub count: usize,
    pub average: f64,
    pub max: f64,
    pub distribution: ScoreDistribution,
}

pub struct ScoringService {
    store: Arc<dyn ScoreStore>,
    critical_max_quantity: i64,
    critical_limit: usize,
    top_items_limit: usize,
}

impl ScoringService {
    pub fn new(store: Arc<dyn ScoreStore>) -> Self {
        Self {
            store,
            critical_max_quantity: DEFAULT_CRITICAL_MAX_QUANTITY,
            critical_limit: DEFAULT_CRITICAL_LIMIT,
            top_items_limit: DEFAULT_TOP_ITEMS_LIMIT,
        }
    }

    pub fn with_limits(
        mut self,
        critical_max_quantity: i64,
        critical_limit: usize,
        top_items_limit: usize,
    ) -> Self {
        self.critical_max_quantity = critical_max_quantity;
        self.critical_limit = critical_limit;
        self.top_items_limit = top_items_limit;
        self
    }

    pub fn critical_max_quantity(&self) -> i64 {
        self.critical_max_quantity
    }

    /// Recomputes and persists one item's score.
    ///
    /// Returns `Ok(None)` when the item does not exist.
    pub async fn recalculate_item_score(&self, item_id: ItemId) -> RepoResult<Option<ScoreBreakdown>> {
        let Some(entry) = self.store.get_item_with_active_links(item_id).await? else {
            debug!("event=score_recalculate module=scoring status=skipped item={item_id} reason=not_found");
            return Ok(None);
        };

        let breakdown = compute_score(&entry.item, &entry.links);
        self.store
            .persist_importance_score(item_id, breakdown.total_score)
            .await?;
        debug!(
            "event=score_recalculate module=scoring status=ok item={} score={} links={}",
            item_id,
            breakdown.total_score,
            entry.links.len()
        );
        Ok(Some(breakdown))
    }

    /// Recomputes and persists every item's score.
    pub async fn recalculate_all_scores(&self) -> RepoResult<RecalculationSummary> {
        let started_at = Instant::now();
        let entries = self.store.get_all_items_with_active_links().await?;

        let mut updated = 0;
        let mut errors = 0;
        let mut computed = Vec::with_capacity(entries.len());
        for entry in entries {
            let breakdown = compute_score(&entry.item, &entry.links);
            match self
                .store
                .persist_importance_score(entry.item.uuid, breakdown.total_score)
                .await
            {
                Ok(()) => {
                    updated += 1;
                    computed.push(breakdown);
                }
                Err(err) => {
                    errors += 1;
                    error!(
                        "event=score_recalculate module=scoring status=error item={} error_code={} error={}",
                        entry.item.uuid,
                        err.code(),
                        err
                    );
                }
            }
        }

        computed.sort_by(|left, right| right.total_score.total_cmp(&left.total_score));
        computed.truncate(self.top_items_limit);

        info!(
            "event=score_recalculate_all module=scoring status=ok updated={} errors={} duration_ms={}",
            updated,
            errors,
            started_at.elapsed().as_millis()
        );
        Ok(RecalculationSummary {
            updated,
            errors,
            top_items: computed,
        })
    }

    /// Items with the highest persisted scores.
    pub async fn get_top_items(&self, limit: u32) -> RepoResult<Vec<Item>> {
        self.store.list_top_items(limit).await
    }

    /// Low-stock items with a positive score, most urgent first.
    ///
    /// `None` uses the configured default quantity ceiling.
    pub async fn get_critical_items(&self, max_quantity: Option<i64>) -> RepoResult<Vec<CriticalItem>> {
        let max_quantity = max_quantity.unwrap_or(self.critical_max_quantity);
        let mut ranked = self
            .store
            .list_low_stock_scored_items(max_quantity)
            .await?
            .into_iter()
            .map(|item| CriticalItem {
                criticality_ratio: criticality_ratio(&item),
                item,
            })
            .collect::<Vec<_>>();

        ranked.sort_by(|left, right| right.criticality_ratio.total_cmp(&left.criticality_ratio));
        ranked.truncate(self.critical_limit);
        Ok(ranked)
    }

    pub async fn get_score_statistics(&self) -> RepoResult<ScoreStatistics> {
        let scores = self.store.list_importance_scores().await?;
        Ok(score_statistics(&scores))
    }
}

pub fn criticality_ratio(item: &Item) -> f64 {
    item.importance_score / (item.quantity as f64).max(MIN_RATIO_QUANTITY)
}

/// Aggregates count/average/max and the bucket histogram.
pub fn score_statistics(scores: &[f64]) -> ScoreStatistics {
    if scores.is_empty() {
        return ScoreStatistics::default();
    }

    let mut distribution = ScoreDistribution::default();
    let mut sum = 0.0;
    let mut max = f64::MIN;
    for &score in scores {
        distribution.record(score);
        sum += score;
        max = max.max(score);
    }

    ScoreStatistics {
        count: scores.len(),
        average: sum / scores.len() as f64,
        max,
        distribution,
    }
}
