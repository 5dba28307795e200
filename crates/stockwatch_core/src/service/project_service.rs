//! Project use-case service.
//!
//! # Responsibility
//! - Create, edit and delete projects and their item links.
//! - Mark every item whose score inputs changed as stale.
//!
//! # Invariants
//! - `NotFound` and `Conflict` surface to the caller synchronously.
//! - Invalidations are published only after the write succeeded.
//! - Linked items are read before a project edit is written, so a failed
//!   read leaves the project unchanged.
//! - Renaming a project does not invalidate; status or priority changes
//!   invalidate every linked item.
//! - Deleting a project invalidates its formerly linked items after the
//!   delete, so their recompute no longer sees the project.

use crate::model::item::ItemId;
use crate::model::project::{
    validate_link_quantity, Project, ProjectId, ProjectItemLink, ProjectPriority, ProjectStatus,
};
use crate::repo::project_repo::ProjectStore;
use crate::repo::{RepoError, RepoResult};
use crate::scoring::recompute::RecomputeTrigger;
use log::info;
use std::sync::Arc;

/// Partial project edit. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<ProjectPriority>,
}

/// Partial link edit. `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkUpdate {
    pub quantity: Option<i64>,
    pub is_active: Option<bool>,
}

pub struct ProjectService {
    store: Arc<dyn ProjectStore>,
    trigger: Arc<RecomputeTrigger>,
}

impl ProjectService {
    pub fn new(store: Arc<dyn ProjectStore>, trigger: Arc<RecomputeTrigger>) -> Self {
        Self { store, trigger }
    }

    pub async fn create_project(
        &self,
        name: impl Into<String>,
        status: ProjectStatus,
        priority: ProjectPriority,
    ) -> RepoResult<Project> {
        let project = Project::new(name, status, priority);
        self.store.create_project(&project).await?;
        info!(
            "event=project_create module=project status=ok project={} project_status={} priority={}",
            project.uuid,
            status.as_str(),
            priority.as_str()
        );
        Ok(project)
    }

    pub async fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        self.store.get_project(id).await
    }

    pub async fn update_project(&self, id: ProjectId, update: ProjectUpdate) -> RepoResult<Project> {
        let current = self
            .store
            .get_project(id)
            .await?
            .ok_or_else(|| RepoError::not_found("project", id))?;

        let mut project = current.clone();
        if let Some(name) = update.name {
            project.name = name;
        }
        if let Some(status) = update.status {
            project.status = status;
        }
        if let Some(priority) = update.priority {
            project.priority = priority;
        }

        let affects_scores =
            project.status != current.status || project.priority != current.priority;
        let item_ids = if affects_scores {
            self.store.list_project_item_ids(id).await?
        } else {
            Vec::new()
        };
        self.store.update_project(&project).await?;

        info!(
            "event=project_update module=project status=ok project={} invalidated={}",
            id,
            item_ids.len()
        );
        self.trigger.invalidate_all(item_ids);
        Ok(project)
    }

    pub async fn delete_project(&self, id: ProjectId) -> RepoResult<()> {
        let item_ids = self.store.delete_project(id).await?;
        info!(
            "event=project_delete module=project status=ok project={} invalidated={}",
            id,
            item_ids.len()
        );
        self.trigger.invalidate_all(item_ids);
        Ok(())
    }

    pub async fn add_item_to_project(
        &self,
        project_id: ProjectId,
        item_id: ItemId,
        quantity: i64,
    ) -> RepoResult<ProjectItemLink> {
        let link = ProjectItemLink {
            project_id,
            item_id,
            quantity,
            is_active: true,
        };
        self.store.add_project_item(&link).await?;
        self.trigger.invalidate(item_id);
        Ok(link)
    }

    pub async fn remove_item_from_project(
        &self,
        project_id: ProjectId,
        item_id: ItemId,
    ) -> RepoResult<()> {
        self.store.remove_project_item(project_id, item_id).await?;
        self.trigger.invalidate(item_id);
        Ok(())
    }

    pub async fn update_project_item(
        &self,
        project_id: ProjectId,
        item_id: ItemId,
        update: LinkUpdate,
    ) -> RepoResult<ProjectItemLink> {
        if let Some(quantity) = update.quantity {
            validate_link_quantity(quantity)?;
        }

        let mut link = self
            .store
            .get_project_item(project_id, item_id)
            .await?
            .ok_or_else(|| RepoError::not_found("project item", item_id))?;
        if let Some(quantity) = update.quantity {
            link.quantity = quantity;
        }
        if let Some(is_active) = update.is_active {
            link.is_active = is_active;
        }

        self.store.update_project_item(&link).await?;
        self.trigger.invalidate(item_id);
        Ok(link)
    }
}
