//! Alert store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist alert rules and their `last_sent` cooldown marker.
//! - Provide quantity-joined reads for the threshold sweep.
//!
//! # Invariants
//! - `(item_id, threshold)` is unique; duplicates surface as `Conflict`.
//! - Rules are never deleted implicitly; only `delete_alert` removes one.
//! - `set_last_sent` applies to the whole id batch in one transaction.

use crate::db::SharedConnection;
use crate::model::alert::{AlertId, AlertRule, AlertWithQuantity};
use crate::model::item::ItemId;
use crate::repo::item_repo::item_exists;
use crate::repo::{
    bool_to_int, from_epoch_ms, is_unique_violation, parse_bool, parse_uuid, to_epoch_ms,
    RepoError, RepoResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

const ALERT_SELECT_SQL: &str = "SELECT
    alerts.uuid AS uuid,
    alerts.item_uuid AS item_uuid,
    alerts.threshold AS threshold,
    alerts.name AS name,
    alerts.is_active AS is_active,
    alerts.last_sent AS last_sent
FROM alerts";

const ALERT_WITH_ITEM_SELECT_SQL: &str = "SELECT
    alerts.uuid AS uuid,
    alerts.item_uuid AS item_uuid,
    alerts.threshold AS threshold,
    alerts.name AS name,
    alerts.is_active AS is_active,
    alerts.last_sent AS last_sent,
    items.name AS item_name,
    items.quantity AS quantity
FROM alerts
JOIN items ON items.uuid = alerts.item_uuid
WHERE alerts.is_active = 1";

/// Durable store of alert rules.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Inserts a new rule. `NotFound` for an unknown item, `Conflict` for a
    /// duplicate `(item, threshold)`.
    async fn create_alert(&self, rule: &AlertRule) -> RepoResult<AlertId>;
    /// Replaces threshold/name/active flag of an existing rule.
    async fn update_alert(&self, rule: &AlertRule) -> RepoResult<()>;
    async fn delete_alert(&self, id: AlertId) -> RepoResult<()>;
    async fn get_alert(&self, id: AlertId) -> RepoResult<Option<AlertRule>>;
    /// All rules of one item, active or not, ordered by threshold.
    async fn list_alerts_for_item(&self, item_id: ItemId) -> RepoResult<Vec<AlertRule>>;
    /// Active rules joined with their item's current quantity.
    async fn list_active_alerts_with_item_quantity(&self) -> RepoResult<Vec<AlertWithQuantity>>;
    /// Active rules of one item joined with its current quantity.
    async fn list_active_alerts_for_item(
        &self,
        item_id: ItemId,
    ) -> RepoResult<Vec<AlertWithQuantity>>;
    /// Sets (or clears, with `None`) `last_sent` on every listed rule.
    ///
    /// Returns the number of rows changed; unknown ids are ignored.
    async fn set_last_sent(
        &self,
        ids: &[AlertId],
        at: Option<DateTime<Utc>>,
    ) -> RepoResult<usize>;
}

/// SQLite-backed alert store.
#[derive(Clone)]
pub struct SqliteAlertRepository {
    conn: SharedConnection,
}

impl SqliteAlertRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl AlertStore for SqliteAlertRepository {
    async fn create_alert(&self, rule: &AlertRule) -> RepoResult<AlertId> {
        rule.validate()?;
        let conn = self.conn.lock().await;

        if !item_exists(&conn, rule.item_id)? {
            return Err(RepoError::not_found("item", rule.item_id));
        }

        let inserted = conn.execute(
            "INSERT INTO alerts (uuid, item_uuid, threshold, name, is_active, last_sent)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                rule.uuid.to_string(),
                rule.item_id.to_string(),
                rule.threshold,
                rule.name.as_deref(),
                bool_to_int(rule.is_active),
                rule.last_sent.map(to_epoch_ms),
            ],
        );
        match inserted {
            Ok(_) => Ok(rule.uuid),
            Err(err) if is_unique_violation(&err) => Err(duplicate_threshold(rule)),
            Err(err) => Err(err.into()),
        }
    }

    async fn update_alert(&self, rule: &AlertRule) -> RepoResult<()> {
        rule.validate()?;
        let conn = self.conn.lock().await;

        let updated = conn.execute(
            "UPDATE alerts
             SET
                threshold = ?2,
                name = ?3,
                is_active = ?4
             WHERE uuid = ?1;",
            params![
                rule.uuid.to_string(),
                rule.threshold,
                rule.name.as_deref(),
                bool_to_int(rule.is_active),
            ],
        );
        match updated {
            Ok(0) => Err(RepoError::not_found("alert", rule.uuid)),
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(duplicate_threshold(rule)),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_alert(&self, id: AlertId) -> RepoResult<()> {
        let conn = self.conn.lock().await;
        let changed = conn.execute("DELETE FROM alerts WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("alert", id));
        }
        Ok(())
    }

    async fn get_alert(&self, id: AlertId) -> RepoResult<Option<AlertRule>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!("{ALERT_SELECT_SQL} WHERE alerts.uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_alert_row(row)?));
        }
        Ok(None)
    }

    async fn list_alerts_for_item(&self, item_id: ItemId) -> RepoResult<Vec<AlertRule>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "{ALERT_SELECT_SQL}
             WHERE alerts.item_uuid = ?1
             ORDER BY alerts.threshold ASC, alerts.uuid ASC;"
        ))?;
        let mut rows = stmt.query([item_id.to_string()])?;
        let mut rules = Vec::new();
        while let Some(row) = rows.next()? {
            rules.push(parse_alert_row(row)?);
        }
        Ok(rules)
    }

    async fn list_active_alerts_with_item_quantity(&self) -> RepoResult<Vec<AlertWithQuantity>> {
        let conn = self.conn.lock().await;
        query_alerts_with_quantity(&conn, None)
    }

    async fn list_active_alerts_for_item(
        &self,
        item_id: ItemId,
    ) -> RepoResult<Vec<AlertWithQuantity>> {
        let conn = self.conn.lock().await;
        query_alerts_with_quantity(&conn, Some(item_id))
    }

    async fn set_last_sent(
        &self,
        ids: &[AlertId],
        at: Option<DateTime<Utc>>,
    ) -> RepoResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare("UPDATE alerts SET last_sent = ?2 WHERE uuid = ?1;")?;
            let at_ms = at.map(to_epoch_ms);
            for id in ids {
                changed += stmt.execute(params![id.to_string(), at_ms])?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }
}

fn query_alerts_with_quantity(
    conn: &Connection,
    item_id: Option<ItemId>,
) -> RepoResult<Vec<AlertWithQuantity>> {
    let mut stmt = conn.prepare(&format!(
        "{ALERT_WITH_ITEM_SELECT_SQL}
           AND (?1 IS NULL OR alerts.item_uuid = ?1)
         ORDER BY alerts.item_uuid ASC, alerts.threshold ASC;"
    ))?;
    let mut rows = stmt.query([item_id.map(|id| id.to_string())])?;
    let mut alerts = Vec::new();
    while let Some(row) = rows.next()? {
        alerts.push(AlertWithQuantity {
            rule: parse_alert_row(row)?,
            item_name: row.get("item_name")?,
            quantity: row.get("quantity")?,
        });
    }
    Ok(alerts)
}

fn parse_alert_row(row: &Row<'_>) -> RepoResult<AlertRule> {
    let uuid_text: String = row.get("uuid")?;
    let item_text: String = row.get("item_uuid")?;
    let last_sent = match row.get::<_, Option<i64>>("last_sent")? {
        Some(value) => Some(from_epoch_ms(value, "alerts.last_sent")?),
        None => None,
    };

    let rule = AlertRule {
        uuid: parse_uuid(&uuid_text, "alerts.uuid")?,
        item_id: parse_uuid(&item_text, "alerts.item_uuid")?,
        threshold: row.get("threshold")?,
        name: row.get("name")?,
        is_active: parse_bool(row.get("is_active")?, "alerts.is_active")?,
        last_sent,
    };
    rule.validate()?;
    Ok(rule)
}

fn duplicate_threshold(rule: &AlertRule) -> RepoError {
    RepoError::Conflict(format!(
        "alert with threshold {} already exists for item {}",
        rule.threshold, rule.item_id
    ))
}
