//! Notification channel adapters.
//!
//! # Responsibility
//! - Define the two delivery seams (email, push) used by the dispatcher.
//! - Build the plain-text summary shared by both channels.
//!
//! # Invariants
//! - Adapters are stateless senders; they own their timeout policy.
//! - Adapters report failure through `ChannelError` and never panic.

use crate::model::alert::AlertWithQuantity;
use async_trait::async_trait;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod email;
pub mod push;

pub use email::WebhookEmailAdapter;
pub use push::{is_valid_push_token, ExpoPushAdapter};

/// Delivery failure reported by a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The channel is not reachable or not configured.
    Unavailable(String),
    /// A destination was malformed or rejected as unknown.
    InvalidDestination(String),
    /// The remote service answered with a non-success status.
    Rejected { status: u16, body: String },
    /// Transport-level failure (connect, timeout, decode).
    Transport(String),
}

impl Display for ChannelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "channel unavailable: {message}"),
            Self::InvalidDestination(value) => write!(f, "invalid destination: {value}"),
            Self::Rejected { status, body } => {
                write!(f, "channel rejected message with status {status}: {body}")
            }
            Self::Transport(message) => write!(f, "channel transport error: {message}"),
        }
    }
}

impl Error for ChannelError {}

impl From<reqwest::Error> for ChannelError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

/// One low-stock line of a summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertLine {
    pub item_name: String,
    pub alert_name: Option<String>,
    pub quantity: i64,
    pub threshold: f64,
}

/// Channel-agnostic summary of one dispatch batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSummary {
    pub title: String,
    pub lines: Vec<AlertLine>,
}

impl AlertSummary {
    pub fn from_alerts(alerts: &[AlertWithQuantity]) -> Self {
        let title = match alerts.len() {
            1 => "Low stock: 1 item needs attention".to_string(),
            count => format!("Low stock: {count} items need attention"),
        };
        let lines = alerts
            .iter()
            .map(|alert| AlertLine {
                item_name: alert.item_name.clone(),
                alert_name: alert.rule.name.clone(),
                quantity: alert.quantity,
                threshold: alert.rule.threshold,
            })
            .collect();
        Self { title, lines }
    }

    /// Plain-text body, one line per alert.
    pub fn body(&self) -> String {
        self.lines
            .iter()
            .map(|line| match &line.alert_name {
                Some(name) => format!(
                    "{} ({}): {} left, threshold {}",
                    line.item_name, name, line.quantity, line.threshold
                ),
                None => format!(
                    "{}: {} left, threshold {}",
                    line.item_name, line.quantity, line.threshold
                ),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Short single-line text for push notifications.
    pub fn short_body(&self) -> String {
        let names = self
            .lines
            .iter()
            .map(|line| line.item_name.as_str())
            .collect::<Vec<_>>();
        match names.as_slice() {
            [] => String::new(),
            [only] => format!("{only} is running low"),
            [first, rest @ ..] => format!("{first} and {} more are running low", rest.len()),
        }
    }
}

/// Email delivery seam. One message per dispatch.
#[async_trait]
pub trait EmailAdapter: Send + Sync {
    async fn send(&self, recipient: &str, summary: &AlertSummary) -> Result<(), ChannelError>;
}

/// Push delivery seam. Receives already-validated tokens; may batch
/// internally and only fails on hard errors.
#[async_trait]
pub trait PushAdapter: Send + Sync {
    async fn send(&self, destinations: &[String], summary: &AlertSummary)
        -> Result<(), ChannelError>;
}
