//! Push destination registry.
//!
//! Token registration belongs to the user/device directory; the core only
//! lists registered tokens. `register_push_destination` exists for seeding
//! and local tooling.

use crate::db::SharedConnection;
use crate::repo::{RepoError, RepoResult};
use async_trait::async_trait;
use rusqlite::params;

#[async_trait]
pub trait DestinationRegistry: Send + Sync {
    /// Every non-null registered push token, unvalidated.
    async fn list_registered_push_destinations(&self) -> RepoResult<Vec<String>>;
}

#[derive(Clone)]
pub struct SqliteDestinationRepository {
    conn: SharedConnection,
}

impl SqliteDestinationRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Adds a destination row; a `None` token models a device that has not
    /// granted push permission yet.
    pub async fn register_push_destination(
        &self,
        label: &str,
        token: Option<&str>,
    ) -> RepoResult<i64> {
        let conn = self.conn.lock().await;
        let inserted = conn.execute(
            "INSERT INTO push_destinations (label, token) VALUES (?1, ?2);",
            params![label, token],
        );
        match inserted {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(err) if super::is_unique_violation(&err) => Err(RepoError::Conflict(
                "push token is already registered".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl DestinationRegistry for SqliteDestinationRepository {
    async fn list_registered_push_destinations(&self) -> RepoResult<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT token FROM push_destinations WHERE token IS NOT NULL ORDER BY id ASC;",
        )?;
        let tokens = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tokens)
    }
}
