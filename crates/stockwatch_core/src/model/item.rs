//! Inventory item read model.
//!
//! Items are owned by inventory CRUD outside this core; alerting reads their
//! quantity and scoring owns `importance_score`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ValidationError;

/// Stable identifier of an inventory item.
pub type ItemId = Uuid;

/// Inventory item as seen by the alerting and scoring core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub uuid: ItemId,
    pub name: String,
    /// Current stock level. Mutated by inventory operations only.
    pub quantity: i64,
    /// Cached total of the last persisted `ScoreBreakdown`.
    pub importance_score: f64,
}

impl Item {
    /// Creates an item with a generated ID and a zero score.
    pub fn new(name: impl Into<String>, quantity: i64) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            quantity,
            importance_score: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.uuid.is_nil() {
            return Err(ValidationError::NilId("item"));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName("item"));
        }
        Ok(())
    }
}
