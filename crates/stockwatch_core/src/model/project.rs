//! Project and project-item link model.
//!
//! # Invariants
//! - A link is unique per `(project_id, item_id)`.
//! - Link quantity is always `>= 1`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::item::ItemId;
use super::ValidationError;

/// Stable identifier of a project.
pub type ProjectId = Uuid;

/// Lifecycle state of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Project priority; drives the scoring multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl ProjectPriority {
    /// Weight applied to the linked quantity when scoring an item.
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Critical => 4.0,
            Self::High => 2.0,
            Self::Medium => 1.0,
            Self::Low => 0.5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub uuid: ProjectId,
    pub name: String,
    pub status: ProjectStatus,
    pub priority: ProjectPriority,
}

impl Project {
    pub fn new(name: impl Into<String>, status: ProjectStatus, priority: ProjectPriority) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            status,
            priority,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.uuid.is_nil() {
            return Err(ValidationError::NilId("project"));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName("project"));
        }
        Ok(())
    }
}

/// How much of one item a project consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectItemLink {
    pub project_id: ProjectId,
    pub item_id: ItemId,
    pub quantity: i64,
    pub is_active: bool,
}

impl ProjectItemLink {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_link_quantity(self.quantity)
    }
}

pub(crate) fn validate_link_quantity(quantity: i64) -> Result<(), ValidationError> {
    if quantity < 1 {
        return Err(ValidationError::InvalidLinkQuantity(quantity));
    }
    Ok(())
}

/// A link joined with the project it belongs to; the scoring engine input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkWithProject {
    pub link: ProjectItemLink,
    pub project: Project,
}

#[cfg(test)]
mod tests {
    use super::{ProjectPriority, ProjectStatus};

    #[test]
    fn enum_db_values_round_trip() {
        for status in [
            ProjectStatus::Active,
            ProjectStatus::Paused,
            ProjectStatus::Completed,
            ProjectStatus::Cancelled,
        ] {
            assert_eq!(ProjectStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ProjectPriority::parse("urgent"), None);
    }

    #[test]
    fn priority_multipliers_are_ordered() {
        assert!(ProjectPriority::Critical.multiplier() > ProjectPriority::High.multiplier());
        assert!(ProjectPriority::High.multiplier() > ProjectPriority::Medium.multiplier());
        assert!(ProjectPriority::Medium.multiplier() > ProjectPriority::Low.multiplier());
    }
}
