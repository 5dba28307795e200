//! Domain model for stock alerting and importance scoring.
//!
//! # Responsibility
//! - Define canonical data structures used by the alerting and scoring core.
//! - Own field-level validation shared by stores and services.
//!
//! # Invariants
//! - Every persisted object is identified by a stable, non-nil UUID.
//! - `Item::importance_score` is only produced by the scoring engine.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod alert;
pub mod item;
pub mod project;

/// Field-level validation failures raised before any persistence happens.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    NilId(&'static str),
    EmptyName(&'static str),
    InvalidThreshold(f64),
    InvalidLinkQuantity(i64),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId(entity) => write!(f, "{entity} id must not be nil"),
            Self::EmptyName(entity) => write!(f, "{entity} name must not be empty"),
            Self::InvalidThreshold(value) => {
                write!(f, "alert threshold must be a finite number >= 0, got {value}")
            }
            Self::InvalidLinkQuantity(value) => {
                write!(f, "project item quantity must be >= 1, got {value}")
            }
        }
    }
}

impl Error for ValidationError {}
