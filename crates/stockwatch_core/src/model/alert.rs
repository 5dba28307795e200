//! Low-stock alert rule model.
//!
//! # Responsibility
//! - Define the persisted alert rule and its quantity-joined read model.
//!
//! # Invariants
//! - At most one rule exists per `(item_id, threshold)` pair.
//! - `last_sent` is only written by the alert sweep: set after a dispatch,
//!   cleared when stock recovers above the threshold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::item::ItemId;
use super::ValidationError;

/// Stable identifier of an alert rule.
pub type AlertId = Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub uuid: AlertId,
    pub item_id: ItemId,
    /// Fires when item quantity is `<=` this value.
    pub threshold: f64,
    pub name: Option<String>,
    pub is_active: bool,
    pub last_sent: Option<DateTime<Utc>>,
}

impl AlertRule {
    /// Creates an active, never-notified rule.
    pub fn new(item_id: ItemId, threshold: f64, name: Option<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            item_id,
            threshold,
            name: normalize_alert_name(name),
            is_active: true,
            last_sent: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.uuid.is_nil() {
            return Err(ValidationError::NilId("alert"));
        }
        if self.item_id.is_nil() {
            return Err(ValidationError::NilId("item"));
        }
        validate_threshold(self.threshold)
    }
}

pub(crate) fn validate_threshold(threshold: f64) -> Result<(), ValidationError> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(ValidationError::InvalidThreshold(threshold));
    }
    Ok(())
}

/// Trims the display name; blank names are stored as absent.
pub fn normalize_alert_name(name: Option<String>) -> Option<String> {
    name.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Alert rule joined with the current state of its item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertWithQuantity {
    pub rule: AlertRule,
    pub item_name: String,
    pub quantity: i64,
}

#[cfg(test)]
mod tests {
    use super::{normalize_alert_name, AlertRule};
    use crate::model::ValidationError;
    use uuid::Uuid;

    #[test]
    fn new_rule_is_armed() {
        let rule = AlertRule::new(Uuid::new_v4(), 5.0, Some("  screws  ".to_string()));
        assert!(rule.is_active);
        assert_eq!(rule.last_sent, None);
        assert_eq!(rule.name.as_deref(), Some("screws"));
    }

    #[test]
    fn blank_names_become_absent() {
        assert_eq!(normalize_alert_name(Some("   ".to_string())), None);
        assert_eq!(normalize_alert_name(None), None);
    }

    #[test]
    fn validate_rejects_negative_and_nan_thresholds() {
        let mut rule = AlertRule::new(Uuid::new_v4(), -1.0, None);
        assert_eq!(rule.validate(), Err(ValidationError::InvalidThreshold(-1.0)));

        rule.threshold = f64::NAN;
        assert!(matches!(
            rule.validate(),
            Err(ValidationError::InvalidThreshold(_))
        ));

        rule.threshold = 0.0;
        assert!(rule.validate().is_ok());
    }
}
