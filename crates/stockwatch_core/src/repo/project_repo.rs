//! Project/link store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist projects and project-item links.
//! - Serve the scoring engine its inputs (items joined with active links)
//!   and persist its single durable output, `items.importance_score`.
//! - Serve ranking/statistics scans over persisted scores.
//!
//! # Invariants
//! - A link is unique per `(project, item)`; duplicates surface as `Conflict`.
//! - Deleting a project removes its links in the same transaction.
//! - Only active links (`is_active = 1`) are handed to scoring.

use crate::db::SharedConnection;
use crate::model::item::{Item, ItemId};
use crate::model::project::{
    LinkWithProject, Project, ProjectId, ProjectItemLink, ProjectPriority, ProjectStatus,
};
use crate::repo::item_repo::{get_item, item_exists, read_item_columns, ITEM_SELECT_SQL};
use crate::repo::{bool_to_int, is_unique_violation, parse_bool, parse_uuid, RepoError, RepoResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;

const PROJECT_SELECT_SQL: &str = "SELECT uuid, name, status, priority FROM projects";

const ACTIVE_LINKS_SELECT_SQL: &str = "SELECT
    project_items.project_uuid AS project_uuid,
    project_items.item_uuid AS item_uuid,
    project_items.quantity AS link_quantity,
    project_items.is_active AS link_is_active,
    projects.name AS project_name,
    projects.status AS project_status,
    projects.priority AS project_priority
FROM project_items
JOIN projects ON projects.uuid = project_items.project_uuid
WHERE project_items.is_active = 1";

/// An item with every active link it participates in.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemWithLinks {
    pub item: Item,
    pub links: Vec<LinkWithProject>,
}

/// Project and link mutations used by the project service.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn create_project(&self, project: &Project) -> RepoResult<ProjectId>;
    async fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    async fn update_project(&self, project: &Project) -> RepoResult<()>;
    /// Deletes the project and its links; returns the formerly linked items.
    async fn delete_project(&self, id: ProjectId) -> RepoResult<Vec<ItemId>>;
    async fn add_project_item(&self, link: &ProjectItemLink) -> RepoResult<()>;
    async fn get_project_item(
        &self,
        project_id: ProjectId,
        item_id: ItemId,
    ) -> RepoResult<Option<ProjectItemLink>>;
    async fn update_project_item(&self, link: &ProjectItemLink) -> RepoResult<()>;
    async fn remove_project_item(&self, project_id: ProjectId, item_id: ItemId) -> RepoResult<()>;
    /// Items linked to the project, active links or not.
    async fn list_project_item_ids(&self, project_id: ProjectId) -> RepoResult<Vec<ItemId>>;
}

/// Scoring inputs, the score write path, and scans over persisted scores.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    async fn get_item_with_active_links(&self, item_id: ItemId)
        -> RepoResult<Option<ItemWithLinks>>;
    /// Every item, including ones without links, in storage order.
    async fn get_all_items_with_active_links(&self) -> RepoResult<Vec<ItemWithLinks>>;
    async fn persist_importance_score(&self, item_id: ItemId, score: f64) -> RepoResult<()>;
    /// Items by persisted score, descending; ties in storage order.
    async fn list_top_items(&self, limit: u32) -> RepoResult<Vec<Item>>;
    /// Items with `quantity <= max_quantity` and a positive score.
    async fn list_low_stock_scored_items(&self, max_quantity: i64) -> RepoResult<Vec<Item>>;
    async fn list_importance_scores(&self) -> RepoResult<Vec<f64>>;
}

/// SQLite-backed project, link and score store.
#[derive(Clone)]
pub struct SqliteProjectRepository {
    conn: SharedConnection,
}

impl SqliteProjectRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ProjectStore for SqliteProjectRepository {
    async fn create_project(&self, project: &Project) -> RepoResult<ProjectId> {
        project.validate()?;
        let conn = self.conn.lock().await;
        let inserted = conn.execute(
            "INSERT INTO projects (uuid, name, status, priority) VALUES (?1, ?2, ?3, ?4);",
            params![
                project.uuid.to_string(),
                project.name.trim(),
                project.status.as_str(),
                project.priority.as_str(),
            ],
        );
        match inserted {
            Ok(_) => Ok(project.uuid),
            Err(err) if is_unique_violation(&err) => Err(RepoError::Conflict(format!(
                "project {} already exists",
                project.uuid
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!("{PROJECT_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_project_row(row)?));
        }
        Ok(None)
    }

    async fn update_project(&self, project: &Project) -> RepoResult<()> {
        project.validate()?;
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE projects
             SET
                name = ?2,
                status = ?3,
                priority = ?4,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                project.uuid.to_string(),
                project.name.trim(),
                project.status.as_str(),
                project.priority.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("project", project.uuid));
        }
        Ok(())
    }

    async fn delete_project(&self, id: ProjectId) -> RepoResult<Vec<ItemId>> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let item_ids = project_item_ids(&tx, id)?;
        tx.execute(
            "DELETE FROM project_items WHERE project_uuid = ?1;",
            [id.to_string()],
        )?;
        let changed = tx.execute("DELETE FROM projects WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("project", id));
        }
        tx.commit()?;
        Ok(item_ids)
    }

    async fn add_project_item(&self, link: &ProjectItemLink) -> RepoResult<()> {
        link.validate()?;
        let conn = self.conn.lock().await;
        if !project_exists(&conn, link.project_id)? {
            return Err(RepoError::not_found("project", link.project_id));
        }
        if !item_exists(&conn, link.item_id)? {
            return Err(RepoError::not_found("item", link.item_id));
        }

        let inserted = conn.execute(
            "INSERT INTO project_items (project_uuid, item_uuid, quantity, is_active)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                link.project_id.to_string(),
                link.item_id.to_string(),
                link.quantity,
                bool_to_int(link.is_active),
            ],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(RepoError::Conflict(format!(
                "item {} is already linked to project {}",
                link.item_id, link.project_id
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_project_item(
        &self,
        project_id: ProjectId,
        item_id: ItemId,
    ) -> RepoResult<Option<ProjectItemLink>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT project_uuid, item_uuid, quantity, is_active
             FROM project_items
             WHERE project_uuid = ?1 AND item_uuid = ?2;",
        )?;
        let mut rows = stmt.query([project_id.to_string(), item_id.to_string()])?;
        if let Some(row) = rows.next()? {
            let project_text: String = row.get("project_uuid")?;
            let item_text: String = row.get("item_uuid")?;
            return Ok(Some(ProjectItemLink {
                project_id: parse_uuid(&project_text, "project_items.project_uuid")?,
                item_id: parse_uuid(&item_text, "project_items.item_uuid")?,
                quantity: row.get("quantity")?,
                is_active: parse_bool(row.get("is_active")?, "project_items.is_active")?,
            }));
        }
        Ok(None)
    }

    async fn update_project_item(&self, link: &ProjectItemLink) -> RepoResult<()> {
        link.validate()?;
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE project_items
             SET quantity = ?3, is_active = ?4
             WHERE project_uuid = ?1 AND item_uuid = ?2;",
            params![
                link.project_id.to_string(),
                link.item_id.to_string(),
                link.quantity,
                bool_to_int(link.is_active),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("project item", link.item_id));
        }
        Ok(())
    }

    async fn remove_project_item(&self, project_id: ProjectId, item_id: ItemId) -> RepoResult<()> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "DELETE FROM project_items WHERE project_uuid = ?1 AND item_uuid = ?2;",
            [project_id.to_string(), item_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("project item", item_id));
        }
        Ok(())
    }

    async fn list_project_item_ids(&self, project_id: ProjectId) -> RepoResult<Vec<ItemId>> {
        let conn = self.conn.lock().await;
        project_item_ids(&conn, project_id)
    }
}

#[async_trait]
impl ScoreStore for SqliteProjectRepository {
    async fn get_item_with_active_links(
        &self,
        item_id: ItemId,
    ) -> RepoResult<Option<ItemWithLinks>> {
        let conn = self.conn.lock().await;
        let Some(item) = get_item(&conn, item_id)? else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(&format!(
            "{ACTIVE_LINKS_SELECT_SQL}
               AND project_items.item_uuid = ?1
             ORDER BY projects.rowid ASC;"
        ))?;
        let mut rows = stmt.query([item_id.to_string()])?;
        let mut links = Vec::new();
        while let Some(row) = rows.next()? {
            links.push(parse_link_with_project_row(row)?);
        }
        Ok(Some(ItemWithLinks { item, links }))
    }

    async fn get_all_items_with_active_links(&self) -> RepoResult<Vec<ItemWithLinks>> {
        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare(&format!("{ITEM_SELECT_SQL} ORDER BY rowid ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        let mut index_by_id = HashMap::new();
        while let Some(row) = rows.next()? {
            let item = read_item_columns(row)?;
            index_by_id.insert(item.uuid, items.len());
            items.push(ItemWithLinks {
                item,
                links: Vec::new(),
            });
        }

        let mut stmt = conn.prepare(&format!(
            "{ACTIVE_LINKS_SELECT_SQL} ORDER BY projects.rowid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let link = parse_link_with_project_row(row)?;
            if let Some(index) = index_by_id.get(&link.link.item_id) {
                items[*index].links.push(link);
            }
        }

        Ok(items)
    }

    async fn persist_importance_score(&self, item_id: ItemId, score: f64) -> RepoResult<()> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE items SET importance_score = ?2 WHERE uuid = ?1;",
            params![item_id.to_string(), score],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("item", item_id));
        }
        Ok(())
    }

    async fn list_top_items(&self, limit: u32) -> RepoResult<Vec<Item>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "{ITEM_SELECT_SQL} ORDER BY importance_score DESC, rowid ASC LIMIT ?1;"
        ))?;
        let mut rows = stmt.query([i64::from(limit)])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(read_item_columns(row)?);
        }
        Ok(items)
    }

    async fn list_low_stock_scored_items(&self, max_quantity: i64) -> RepoResult<Vec<Item>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE quantity <= ?1 AND importance_score > 0
             ORDER BY rowid ASC;"
        ))?;
        let mut rows = stmt.query([max_quantity])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(read_item_columns(row)?);
        }
        Ok(items)
    }

    async fn list_importance_scores(&self) -> RepoResult<Vec<f64>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT importance_score FROM items ORDER BY rowid ASC;")?;
        let scores = stmt
            .query_map([], |row| row.get::<_, f64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(scores)
    }
}

fn project_exists(conn: &Connection, id: ProjectId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM projects WHERE uuid = ?1);",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn project_item_ids(conn: &Connection, project_id: ProjectId) -> RepoResult<Vec<ItemId>> {
    let mut stmt = conn.prepare(
        "SELECT item_uuid FROM project_items WHERE project_uuid = ?1 ORDER BY rowid ASC;",
    )?;
    let mut rows = stmt.query([project_id.to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let text: String = row.get(0)?;
        ids.push(parse_uuid(&text, "project_items.item_uuid")?);
    }
    Ok(ids)
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    let uuid_text: String = row.get("uuid")?;
    let status_text: String = row.get("status")?;
    let priority_text: String = row.get("priority")?;
    Ok(Project {
        uuid: parse_uuid(&uuid_text, "projects.uuid")?,
        name: row.get("name")?,
        status: parse_status(&status_text)?,
        priority: parse_priority(&priority_text)?,
    })
}

fn parse_link_with_project_row(row: &Row<'_>) -> RepoResult<LinkWithProject> {
    let project_text: String = row.get("project_uuid")?;
    let item_text: String = row.get("item_uuid")?;
    let status_text: String = row.get("project_status")?;
    let priority_text: String = row.get("project_priority")?;
    let project_id = parse_uuid(&project_text, "project_items.project_uuid")?;

    Ok(LinkWithProject {
        link: ProjectItemLink {
            project_id,
            item_id: parse_uuid(&item_text, "project_items.item_uuid")?,
            quantity: row.get("link_quantity")?,
            is_active: parse_bool(row.get("link_is_active")?, "project_items.is_active")?,
        },
        project: Project {
            uuid: project_id,
            name: row.get("project_name")?,
            status: parse_status(&status_text)?,
            priority: parse_priority(&priority_text)?,
        },
    })
}

fn parse_status(value: &str) -> RepoResult<ProjectStatus> {
    ProjectStatus::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid project status `{value}` in projects.status"))
    })
}

fn parse_priority(value: &str) -> RepoResult<ProjectPriority> {
    ProjectPriority::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid project priority `{value}` in projects.priority"
        ))
    })
}
