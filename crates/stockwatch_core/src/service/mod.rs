//! Core use-case services over the project store.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Publish score invalidations for every mutation that changes scoring
//!   inputs.
//!
//! # See also
//! - `crate::alerting::service` and `crate::scoring::service`.

pub mod project_service;
