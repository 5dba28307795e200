//! Low-stock alerting: threshold evaluation, notification dispatch and the
//! sweep cycle that ties them to the alert store.
//!
//! # See also
//! - `crate::channel` for the delivery adapters.

pub mod clock;
pub mod dispatcher;
pub mod evaluator;
pub mod service;
