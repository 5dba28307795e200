//! Item repository: the slice of inventory storage the core needs.
//!
//! # Invariants
//! - `set_item_quantity` never touches `importance_score`.
//! - `importance_score` is written only through `ProjectStore::persist_importance_score`.

use crate::db::SharedConnection;
use crate::model::item::{Item, ItemId};
use crate::repo::{parse_uuid, RepoError, RepoResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, Row};

pub(crate) const ITEM_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    quantity,
    importance_score
FROM items";

#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn create_item(&self, item: &Item) -> RepoResult<ItemId>;
    async fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>>;
    /// Overwrites the stock level. Fails with `NotFound` for unknown items.
    async fn set_item_quantity(&self, id: ItemId, quantity: i64) -> RepoResult<()>;
}

/// SQLite-backed item repository.
#[derive(Clone)]
pub struct SqliteItemRepository {
    conn: SharedConnection,
}

impl SqliteItemRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ItemStore for SqliteItemRepository {
    async fn create_item(&self, item: &Item) -> RepoResult<ItemId> {
        item.validate()?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO items (uuid, name, quantity, importance_score)
             VALUES (?1, ?2, ?3, 0);",
            params![item.uuid.to_string(), item.name.trim(), item.quantity],
        )?;
        Ok(item.uuid)
    }

    async fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>> {
        let conn = self.conn.lock().await;
        get_item(&conn, id)
    }

    async fn set_item_quantity(&self, id: ItemId, quantity: i64) -> RepoResult<()> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE items
             SET
                quantity = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), quantity],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("item", id));
        }
        Ok(())
    }
}

pub(crate) fn get_item(conn: &Connection, id: ItemId) -> RepoResult<Option<Item>> {
    let mut stmt = conn.prepare(&format!("{ITEM_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(read_item_columns(row)?));
    }

    Ok(None)
}

pub(crate) fn item_exists(conn: &Connection, id: ItemId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM items WHERE uuid = ?1);",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn read_item_columns(row: &Row<'_>) -> RepoResult<Item> {
    let uuid_text: String = row.get("uuid")?;
    Ok(Item {
        uuid: parse_uuid(&uuid_text, "items.uuid")?,
        name: row.get("name")?,
        quantity: row.get("quantity")?,
        importance_score: row.get("importance_score")?,
    })
}
