//! Threshold evaluation.
//!
//! # Responsibility
//! - Classify alert rules against current quantities and time.
//!
//! # Invariants
//! - Evaluation is pure: no I/O, no clock reads, no mutation of inputs.
//! - Partitions are disjoint and cover every active input rule.
//! - `quantity == threshold` triggers.
//! - The cooldown is applied per rule, never per item.

use crate::model::alert::{AlertRule, AlertWithQuantity};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Default minimum time between repeated notifications of one rule.
pub const DEFAULT_COOLDOWN_HOURS: i64 = 24;

/// Outcome of evaluating one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertDisposition {
    /// Stock above threshold, nothing pending.
    Quiet,
    /// Stock back above threshold after a notification; re-arm the rule.
    Recovered,
    /// Stock at or below threshold and no notification inside the cooldown.
    Due,
    /// Stock at or below threshold but notified inside the cooldown.
    Suppressed,
}

impl AlertDisposition {
    pub fn is_triggered(self) -> bool {
        matches!(self, Self::Due | Self::Suppressed)
    }
}

/// Disjoint partitions of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub quiet: Vec<AlertWithQuantity>,
    pub recovered: Vec<AlertWithQuantity>,
    pub due: Vec<AlertWithQuantity>,
    pub suppressed: Vec<AlertWithQuantity>,
}

impl Evaluation {
    /// Number of rules that were classified.
    pub fn checked(&self) -> usize {
        self.quiet.len() + self.recovered.len() + self.due.len() + self.suppressed.len()
    }

    /// Rules whose stock is at or below threshold, notified now or not.
    pub fn triggered(&self) -> usize {
        self.due.len() + self.suppressed.len()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ThresholdEvaluator {
    cooldown: Duration,
}

impl Default for ThresholdEvaluator {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_COOLDOWN_HOURS))
    }
}

impl ThresholdEvaluator {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Classifies one rule given the item's quantity.
    ///
    /// A `last_sent` later than `now` counts as inside the cooldown.
    pub fn classify(&self, rule: &AlertRule, quantity: i64, now: DateTime<Utc>) -> AlertDisposition {
        let at_or_below = (quantity as f64) <= rule.threshold;
        match (at_or_below, rule.last_sent) {
            (false, None) => AlertDisposition::Quiet,
            (false, Some(_)) => AlertDisposition::Recovered,
            (true, None) => AlertDisposition::Due,
            (true, Some(last_sent)) if now - last_sent >= self.cooldown => AlertDisposition::Due,
            (true, Some(_)) => AlertDisposition::Suppressed,
        }
    }

    /// Partitions the active rules among `alerts`; inactive rules are skipped.
    pub fn evaluate(&self, alerts: Vec<AlertWithQuantity>, now: DateTime<Utc>) -> Evaluation {
        let mut evaluation = Evaluation::default();
        for alert in alerts {
            if !alert.rule.is_active {
                continue;
            }
            match self.classify(&alert.rule, alert.quantity, now) {
                AlertDisposition::Quiet => evaluation.quiet.push(alert),
                AlertDisposition::Recovered => evaluation.recovered.push(alert),
                AlertDisposition::Due => evaluation.due.push(alert),
                AlertDisposition::Suppressed => evaluation.suppressed.push(alert),
            }
        }
        evaluation
    }
}

#[cfg(test)]
mod tests {
    use super::{AlertDisposition, ThresholdEvaluator};
    use crate::model::alert::{AlertRule, AlertWithQuantity};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn rule(threshold: f64, last_sent: Option<DateTime<Utc>>) -> AlertRule {
        let mut rule = AlertRule::new(Uuid::new_v4(), threshold, None);
        rule.last_sent = last_sent;
        rule
    }

    #[test]
    fn classifies_the_four_states() {
        let evaluator = ThresholdEvaluator::default();
        let recent = Some(now() - Duration::hours(1));

        assert_eq!(evaluator.classify(&rule(5.0, None), 10, now()), AlertDisposition::Quiet);
        assert_eq!(
            evaluator.classify(&rule(5.0, recent), 10, now()),
            AlertDisposition::Recovered
        );
        assert_eq!(evaluator.classify(&rule(5.0, None), 3, now()), AlertDisposition::Due);
        assert_eq!(
            evaluator.classify(&rule(5.0, recent), 3, now()),
            AlertDisposition::Suppressed
        );
    }

    #[test]
    fn quantity_equal_to_threshold_triggers() {
        let evaluator = ThresholdEvaluator::default();
        assert_eq!(evaluator.classify(&rule(5.0, None), 5, now()), AlertDisposition::Due);
        assert_eq!(evaluator.classify(&rule(0.0, None), 0, now()), AlertDisposition::Due);
        assert_eq!(evaluator.classify(&rule(0.0, None), 1, now()), AlertDisposition::Quiet);
    }

    #[test]
    fn cooldown_boundary_is_inclusive() {
        let evaluator = ThresholdEvaluator::default();
        let exactly = rule(5.0, Some(now() - Duration::hours(24)));
        let just_inside = rule(5.0, Some(now() - Duration::hours(24) + Duration::seconds(1)));

        assert_eq!(evaluator.classify(&exactly, 1, now()), AlertDisposition::Due);
        assert_eq!(
            evaluator.classify(&just_inside, 1, now()),
            AlertDisposition::Suppressed
        );
    }

    #[test]
    fn future_last_sent_is_suppressed() {
        let evaluator = ThresholdEvaluator::default();
        let skewed = rule(5.0, Some(now() + Duration::minutes(5)));
        assert_eq!(evaluator.classify(&skewed, 1, now()), AlertDisposition::Suppressed);
    }

    #[test]
    fn injected_cooldown_is_honoured() {
        let evaluator = ThresholdEvaluator::new(Duration::minutes(30));
        let sent = rule(5.0, Some(now() - Duration::minutes(31)));
        assert_eq!(evaluator.classify(&sent, 1, now()), AlertDisposition::Due);
    }

    #[test]
    fn evaluate_partitions_per_rule_and_skips_inactive() {
        let evaluator = ThresholdEvaluator::default();
        let item_id = Uuid::new_v4();
        let mut low = AlertRule::new(item_id, 5.0, None);
        low.last_sent = Some(now() - Duration::hours(2));
        let high = AlertRule::new(item_id, 10.0, None);
        let mut inactive = AlertRule::new(item_id, 20.0, None);
        inactive.is_active = false;

        let joined = [low, high, inactive]
            .into_iter()
            .map(|rule| AlertWithQuantity {
                rule,
                item_name: "Resistors".to_string(),
                quantity: 4,
            })
            .collect();

        let evaluation = evaluator.evaluate(joined, now());
        assert_eq!(evaluation.checked(), 2);
        assert_eq!(evaluation.triggered(), 2);
        assert_eq!(evaluation.suppressed.len(), 1);
        assert_eq!(evaluation.due.len(), 1);
        assert_eq!(evaluation.due[0].rule.threshold, 10.0);
    }
}
