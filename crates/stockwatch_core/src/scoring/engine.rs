//! Importance score computation.
//!
//! # Invariants
//! - `compute_score` is a pure function of the item and its links.
//! - Inactive links contribute nothing and are not listed as usages.
//! - Only `total_score` is ever persisted.

use crate::model::item::{Item, ItemId};
use crate::model::project::{LinkWithProject, ProjectId, ProjectPriority, ProjectStatus};
use serde::Serialize;
use std::collections::HashSet;

/// Weight kept for projects that are paused.
pub const PAUSED_DISCOUNT: f64 = 0.3;
/// Bonus per active project once an item is used by more than one.
pub const DIVERSIFICATION_BONUS_PER_PROJECT: f64 = 0.5;

/// One project's use of the item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectUsage {
    pub project_id: ProjectId,
    pub project_name: String,
    pub status: ProjectStatus,
    pub priority: ProjectPriority,
    pub quantity: i64,
    pub priority_multiplier: f64,
    pub contribution: f64,
}

/// Decomposition of an item's importance score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub item_id: ItemId,
    pub item_name: String,
    pub active_projects_score: f64,
    pub paused_projects_score: f64,
    pub diversification_bonus: f64,
    pub total_score: f64,
    pub active_project_count: usize,
    /// Mean multiplier over all active links; 0 without links.
    pub average_priority_multiplier: f64,
    /// Unordered; callers sort as they need.
    pub usages: Vec<ProjectUsage>,
}

/// Computes the score of `item` from its links.
pub fn compute_score(item: &Item, links: &[LinkWithProject]) -> ScoreBreakdown {
    let mut active_projects_score = 0.0;
    let mut paused_projects_score = 0.0;
    let mut multiplier_sum = 0.0;
    let mut active_projects = HashSet::new();
    let mut usages = Vec::with_capacity(links.len());

    for entry in links.iter().filter(|entry| entry.link.is_active) {
        let multiplier = entry.project.priority.multiplier();
        let base = entry.link.quantity as f64 * multiplier;
        multiplier_sum += multiplier;

        let contribution = match entry.project.status {
            ProjectStatus::Active => {
                active_projects.insert(entry.project.uuid);
                active_projects_score += base;
                base
            }
            ProjectStatus::Paused => {
                let discounted = base * PAUSED_DISCOUNT;
                paused_projects_score += discounted;
                discounted
            }
            ProjectStatus::Completed | ProjectStatus::Cancelled => 0.0,
        };

        usages.push(ProjectUsage {
            project_id: entry.project.uuid,
            project_name: entry.project.name.clone(),
            status: entry.project.status,
            priority: entry.project.priority,
            quantity: entry.link.quantity,
            priority_multiplier: multiplier,
            contribution,
        });
    }

    let active_project_count = active_projects.len();
    let diversification_bonus = if active_project_count > 1 {
        active_project_count as f64 * DIVERSIFICATION_BONUS_PER_PROJECT
    } else {
        0.0
    };
    let average_priority_multiplier = if usages.is_empty() {
        0.0
    } else {
        multiplier_sum / usages.len() as f64
    };

    ScoreBreakdown {
        item_id: item.uuid,
        item_name: item.name.clone(),
        active_projects_score,
        paused_projects_score,
        diversification_bonus,
        total_score: round2(active_projects_score + paused_projects_score + diversification_bonus),
        active_project_count,
        average_priority_multiplier,
        usages,
    }
}

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::{compute_score, round2};
    use crate::model::item::Item;
    use crate::model::project::{
        LinkWithProject, Project, ProjectItemLink, ProjectPriority, ProjectStatus,
    };

    fn link(
        item: &Item,
        quantity: i64,
        status: ProjectStatus,
        priority: ProjectPriority,
    ) -> LinkWithProject {
        let project = Project::new("build", status, priority);
        LinkWithProject {
            link: ProjectItemLink {
                project_id: project.uuid,
                item_id: item.uuid,
                quantity,
                is_active: true,
            },
            project,
        }
    }

    #[test]
    fn single_critical_project_has_no_bonus() {
        let item = Item::new("Stepper motor", 4);
        let links = [link(&item, 2, ProjectStatus::Active, ProjectPriority::Critical)];

        let score = compute_score(&item, &links);
        assert_eq!(score.active_projects_score, 8.0);
        assert_eq!(score.diversification_bonus, 0.0);
        assert_eq!(score.total_score, 8.0);
        assert_eq!(score.average_priority_multiplier, 4.0);
    }

    #[test]
    fn two_active_projects_earn_diversification_bonus() {
        let item = Item::new("Heat inserts", 40);
        let links = [
            link(&item, 1, ProjectStatus::Active, ProjectPriority::Medium),
            link(&item, 1, ProjectStatus::Active, ProjectPriority::Medium),
        ];

        let score = compute_score(&item, &links);
        assert_eq!(score.active_projects_score, 2.0);
        assert_eq!(score.diversification_bonus, 1.0);
        assert_eq!(score.total_score, 3.0);
        assert_eq!(score.active_project_count, 2);
    }

    #[test]
    fn paused_projects_are_discounted_and_finished_ones_ignored() {
        let item = Item::new("PLA spool", 1);
        let links = [
            link(&item, 2, ProjectStatus::Paused, ProjectPriority::High),
            link(&item, 5, ProjectStatus::Completed, ProjectPriority::Critical),
            link(&item, 5, ProjectStatus::Cancelled, ProjectPriority::Critical),
        ];

        let score = compute_score(&item, &links);
        assert_eq!(round2(score.paused_projects_score), 1.2);
        assert_eq!(score.active_projects_score, 0.0);
        assert_eq!(score.diversification_bonus, 0.0);
        assert_eq!(score.total_score, 1.2);
        assert_eq!(score.usages.len(), 3);
        assert_eq!(score.average_priority_multiplier, (2.0 + 4.0 + 4.0) / 3.0);
    }

    #[test]
    fn paused_project_does_not_count_towards_bonus() {
        let item = Item::new("Wire", 10);
        let links = [
            link(&item, 1, ProjectStatus::Active, ProjectPriority::Low),
            link(&item, 1, ProjectStatus::Paused, ProjectPriority::Low),
        ];

        let score = compute_score(&item, &links);
        assert_eq!(score.active_project_count, 1);
        assert_eq!(score.diversification_bonus, 0.0);
        assert_eq!(score.total_score, 0.65);
    }

    #[test]
    fn inactive_links_are_ignored() {
        let item = Item::new("Bearings", 8);
        let mut inactive = link(&item, 3, ProjectStatus::Active, ProjectPriority::High);
        inactive.link.is_active = false;

        let score = compute_score(&item, &[inactive]);
        assert_eq!(score.total_score, 0.0);
        assert!(score.usages.is_empty());
        assert_eq!(score.average_priority_multiplier, 0.0);
    }

    #[test]
    fn compute_score_is_pure() {
        let item = Item::new("Nuts", 3);
        let links = [
            link(&item, 3, ProjectStatus::Active, ProjectPriority::High),
            link(&item, 7, ProjectStatus::Paused, ProjectPriority::Low),
            link(&item, 1, ProjectStatus::Active, ProjectPriority::Critical),
        ];

        let first = compute_score(&item, &links);
        let second = compute_score(&item, &links);
        assert_eq!(first, second);
        assert_eq!(first.total_score, 12.05);
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(1.005_f64 + 1e-9), 1.01);
        assert_eq!(round2(2.344), 2.34);
        assert_eq!(round2(0.0), 0.0);
    }
}
