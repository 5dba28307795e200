//! Core domain logic for Stockwatch: low-stock alerting and project-driven
//! importance scoring over a SQLite inventory.

pub mod alerting;
pub mod app;
pub mod channel;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod scoring;
pub mod service;

pub use alerting::clock::{Clock, ManualClock, SystemClock};
pub use alerting::dispatcher::{ChannelOutcome, DispatchReport, NotificationDispatcher};
pub use alerting::evaluator::{AlertDisposition, Evaluation, ThresholdEvaluator};
pub use alerting::service::{AlertService, AlertUpdate, ItemAlertCheck, SweepResult};
pub use app::{Channels, Stockwatch, StockwatchError};
pub use channel::{AlertSummary, ChannelError, EmailAdapter, PushAdapter};
pub use config::{ConfigError, StockwatchConfig};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status, LogSink};
pub use model::alert::{AlertId, AlertRule, AlertWithQuantity};
pub use model::item::{Item, ItemId};
pub use model::project::{Project, ProjectId, ProjectItemLink, ProjectPriority, ProjectStatus};
pub use model::ValidationError;
pub use repo::{RepoError, RepoResult};
pub use scoring::engine::{compute_score, ProjectUsage, ScoreBreakdown};
pub use scoring::recompute::RecomputeTrigger;
pub use scoring::service::{
    CriticalItem, RecalculationSummary, ScoreDistribution, ScoreStatistics, ScoringService,
};
pub use service::project_service::{LinkUpdate, ProjectService, ProjectUpdate};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
