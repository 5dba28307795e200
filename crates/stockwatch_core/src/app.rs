//! Application wiring.
//!
//! # Responsibility
//! - Build stores, channel adapters, services and the recompute worker from
//!   one database connection and a validated config.
//! - Expose item stock updates, which persist and then check alerts.
//!
//! # Invariants
//! - Every store shares one `SharedConnection`.
//! - Must be constructed inside a tokio runtime; the recompute worker is
//!   spawned on construction.
//! - `shutdown` drains pending recomputes before returning.

use crate::alerting::clock::{Clock, SystemClock};
use crate::alerting::dispatcher::NotificationDispatcher;
use crate::alerting::evaluator::ThresholdEvaluator;
use crate::alerting::service::{AlertService, ItemAlertCheck};
use crate::channel::{ChannelError, EmailAdapter, ExpoPushAdapter, PushAdapter, WebhookEmailAdapter};
use crate::config::{ConfigError, StockwatchConfig};
use crate::db::{into_shared, open_db, open_db_in_memory, DbError, SharedConnection};
use crate::model::item::{Item, ItemId};
use crate::repo::alert_repo::SqliteAlertRepository;
use crate::repo::destination_repo::SqliteDestinationRepository;
use crate::repo::item_repo::{ItemStore, SqliteItemRepository};
use crate::repo::project_repo::SqliteProjectRepository;
use crate::repo::{RepoError, RepoResult};
use crate::scoring::recompute::RecomputeTrigger;
use crate::scoring::service::ScoringService;
use crate::service::project_service::ProjectService;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum StockwatchError {
    Config(ConfigError),
    Db(DbError),
    Channel(ChannelError),
    Repo(RepoError),
}

impl Display for StockwatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "database error: {err}"),
            Self::Channel(err) => write!(f, "channel setup failed: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StockwatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Channel(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<ConfigError> for StockwatchError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for StockwatchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<ChannelError> for StockwatchError {
    fn from(value: ChannelError) -> Self {
        Self::Channel(value)
    }
}

impl From<RepoError> for StockwatchError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Delivery adapters handed to the dispatcher. `None` disables a channel.
#[derive(Clone, Default)]
pub struct Channels {
    pub email: Option<(Arc<dyn EmailAdapter>, String)>,
    pub push: Option<Arc<dyn PushAdapter>>,
}

impl Channels {
    /// HTTP adapters as configured. Email needs both an endpoint and a
    /// recipient.
    pub fn from_config(config: &StockwatchConfig) -> Result<Self, ChannelError> {
        let email = match (&config.email.endpoint, &config.alerts.recipient) {
            (Some(endpoint), Some(recipient)) => {
                let adapter = WebhookEmailAdapter::new(
                    endpoint.as_str(),
                    config.email.sender.as_str(),
                    config.email.timeout,
                )?;
                Some((Arc::new(adapter) as Arc<dyn EmailAdapter>, recipient.clone()))
            }
            _ => None,
        };

        let push = if config.push.enabled {
            let adapter = ExpoPushAdapter::new(config.push.endpoint.as_str(), config.push.timeout)?;
            Some(Arc::new(adapter) as Arc<dyn PushAdapter>)
        } else {
            None
        };

        Ok(Self { email, push })
    }
}

pub struct Stockwatch {
    config: StockwatchConfig,
    items: SqliteItemRepository,
    destinations: Arc<SqliteDestinationRepository>,
    alerts: AlertService,
    scoring: Arc<ScoringService>,
    projects: ProjectService,
    trigger: Arc<RecomputeTrigger>,
}

impl Stockwatch {
    /// Opens (and migrates) the database at `path` with HTTP channels.
    pub fn open(path: impl AsRef<Path>, config: StockwatchConfig) -> Result<Self, StockwatchError> {
        config.validate()?;
        let channels = Channels::from_config(&config)?;
        let conn = into_shared(open_db(path)?);
        Ok(Self::from_parts(conn, config, channels, Arc::new(SystemClock)))
    }

    /// In-memory database with HTTP channels.
    pub fn open_in_memory(config: StockwatchConfig) -> Result<Self, StockwatchError> {
        config.validate()?;
        let channels = Channels::from_config(&config)?;
        let conn = into_shared(open_db_in_memory()?);
        Ok(Self::from_parts(conn, config, channels, Arc::new(SystemClock)))
    }

    /// Wires every component over an already migrated connection.
    pub fn from_parts(
        conn: SharedConnection,
        config: StockwatchConfig,
        channels: Channels,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let destinations = Arc::new(SqliteDestinationRepository::new(conn.clone()));
        let project_repo = Arc::new(SqliteProjectRepository::new(conn.clone()));

        let mut dispatcher = NotificationDispatcher::new(destinations.clone());
        if let Some((adapter, recipient)) = channels.email {
            dispatcher = dispatcher.with_email(adapter, recipient);
        }
        if let Some(adapter) = channels.push {
            dispatcher = dispatcher.with_push(adapter);
        }

        let alerts = AlertService::new(
            Arc::new(SqliteAlertRepository::new(conn.clone())),
            dispatcher,
            ThresholdEvaluator::new(config.cooldown()),
            clock,
        );
        let scoring = Arc::new(
            ScoringService::new(project_repo.clone()).with_limits(
                config.scoring.critical_max_quantity,
                config.scoring.critical_limit,
                config.scoring.top_items_limit,
            ),
        );
        let trigger = Arc::new(RecomputeTrigger::spawn(scoring.clone()));
        let projects = ProjectService::new(project_repo, trigger.clone());

        info!(
            "event=stockwatch_init module=app status=ok cooldown_secs={} sweep_interval_secs={}",
            config.alerts.cooldown.as_secs(),
            config.alerts.sweep_interval.as_secs()
        );

        Self {
            config,
            items: SqliteItemRepository::new(conn),
            destinations,
            alerts,
            scoring,
            projects,
            trigger,
        }
    }

    pub fn config(&self) -> &StockwatchConfig {
        &self.config
    }

    pub fn alerts(&self) -> &AlertService {
        &self.alerts
    }

    pub fn scoring(&self) -> &ScoringService {
        &self.scoring
    }

    pub fn projects(&self) -> &ProjectService {
        &self.projects
    }

    pub fn recompute(&self) -> &RecomputeTrigger {
        &self.trigger
    }

    pub async fn create_item(&self, name: impl Into<String>, quantity: i64) -> RepoResult<Item> {
        let item = Item::new(name, quantity);
        self.items.create_item(&item).await?;
        Ok(item)
    }

    pub async fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>> {
        self.items.get_item(id).await
    }

    /// Persists a stock change, then checks the item's alert rules against
    /// the new quantity.
    pub async fn set_item_quantity(&self, id: ItemId, quantity: i64) -> RepoResult<ItemAlertCheck> {
        self.items.set_item_quantity(id, quantity).await?;
        self.alerts.check_item_alerts(id, quantity).await
    }

    pub async fn register_push_destination(
        &self,
        label: &str,
        token: Option<&str>,
    ) -> RepoResult<i64> {
        self.destinations.register_push_destination(label, token).await
    }

    /// Runs the periodic sweep on the configured interval until cancelled.
    pub async fn run_sweep_loop(&self, shutdown: CancellationToken) {
        self.alerts
            .run_sweep_loop(self.config.alerts.sweep_interval, shutdown)
            .await;
    }

    /// Drains pending recomputes and stops the worker.
    pub async fn shutdown(&self) {
        self.trigger.shutdown().await;
        info!("event=stockwatch_shutdown module=app status=ok");
    }
}
