//! Importance scoring: the pure score function, the use-case service over
//! persisted scores, and the background recompute queue.

pub mod engine;
pub mod recompute;
pub mod service;
