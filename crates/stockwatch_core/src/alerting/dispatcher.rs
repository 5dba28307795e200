//! Notification fan-out over the email and push channels.
//!
//! # Responsibility
//! - Deliver one summary per dispatch batch on both channels concurrently.
//! - Report a per-channel outcome instead of failing the batch.
//!
//! # Invariants
//! - A failure on one channel never prevents the other from being attempted.
//! - Invalid push destinations are dropped with a warning before sending.
//! - Zero valid push destinations skips the push channel; it is not a failure.
//! - `dispatch` never returns an error; persistence of `last_sent` is the
//!   caller's job once `dispatch` returns.

use crate::channel::push::mask_token;
use crate::channel::{is_valid_push_token, AlertSummary, EmailAdapter, PushAdapter};
use crate::model::alert::AlertWithQuantity;
use crate::repo::destination_repo::DestinationRegistry;
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Result of one channel attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ChannelOutcome {
    Delivered,
    Skipped(String),
    Failed(String),
}

impl ChannelOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    fn status(&self) -> &'static str {
        match self {
            Self::Delivered => "ok",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "error",
        }
    }
}

/// Per-channel outcomes of one dispatch batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub email: ChannelOutcome,
    pub push: ChannelOutcome,
    /// Valid push destinations the push channel was attempted with.
    pub push_destinations: usize,
}

impl DispatchReport {
    /// Whether at least one channel delivered the batch.
    pub fn delivered(&self) -> bool {
        self.email.is_delivered() || self.push.is_delivered()
    }

    fn skipped(reason: &str) -> Self {
        Self {
            email: ChannelOutcome::Skipped(reason.to_string()),
            push: ChannelOutcome::Skipped(reason.to_string()),
            push_destinations: 0,
        }
    }
}

struct EmailChannel {
    adapter: Arc<dyn EmailAdapter>,
    recipient: String,
}

pub struct NotificationDispatcher {
    email: Option<EmailChannel>,
    push: Option<Arc<dyn PushAdapter>>,
    destinations: Arc<dyn DestinationRegistry>,
}

impl NotificationDispatcher {
    /// Creates a dispatcher with both channels unconfigured.
    pub fn new(destinations: Arc<dyn DestinationRegistry>) -> Self {
        Self {
            email: None,
            push: None,
            destinations,
        }
    }

    pub fn with_email(mut self, adapter: Arc<dyn EmailAdapter>, recipient: impl Into<String>) -> Self {
        self.email = Some(EmailChannel {
            adapter,
            recipient: recipient.into(),
        });
        self
    }

    pub fn with_push(mut self, adapter: Arc<dyn PushAdapter>) -> Self {
        self.push = Some(adapter);
        self
    }

    /// Attempts delivery of `alerts` as one batch on both channels. An empty
    /// batch is reported as skipped without touching either channel.
    pub async fn dispatch(&self, alerts: &[AlertWithQuantity]) -> DispatchReport {
        if alerts.is_empty() {
            return DispatchReport::skipped("empty batch");
        }

        let started_at = Instant::now();
        let summary = AlertSummary::from_alerts(alerts);
        let (email, (push, push_destinations)) =
            tokio::join!(self.send_email(&summary), self.send_push(&summary));

        info!(
            "event=alert_dispatch module=alerting status=ok alerts={} email={} push={} push_destinations={} duration_ms={}",
            alerts.len(),
            email.status(),
            push.status(),
            push_destinations,
            started_at.elapsed().as_millis()
        );

        DispatchReport {
            email,
            push,
            push_destinations,
        }
    }

    async fn send_email(&self, summary: &AlertSummary) -> ChannelOutcome {
        let Some(channel) = &self.email else {
            return ChannelOutcome::Skipped("email channel not configured".to_string());
        };

        match channel.adapter.send(&channel.recipient, summary).await {
            Ok(()) => ChannelOutcome::Delivered,
            Err(err) => {
                error!(
                    "event=alert_channel module=alerting channel=email status=error error={}",
                    err
                );
                ChannelOutcome::Failed(err.to_string())
            }
        }
    }

    async fn send_push(&self, summary: &AlertSummary) -> (ChannelOutcome, usize) {
        let Some(adapter) = &self.push else {
            return (
                ChannelOutcome::Skipped("push channel not configured".to_string()),
                0,
            );
        };

        let registered = match self.destinations.list_registered_push_destinations().await {
            Ok(tokens) => tokens,
            Err(err) => {
                error!(
                    "event=alert_channel module=alerting channel=push status=error error_code=destinations_unavailable error={}",
                    err
                );
                return (ChannelOutcome::Failed(err.to_string()), 0);
            }
        };

        let valid = valid_destinations(registered);
        if valid.is_empty() {
            info!("event=alert_channel module=alerting channel=push status=skipped reason=no_destinations");
            return (
                ChannelOutcome::Skipped("no valid push destinations".to_string()),
                0,
            );
        }

        let count = valid.len();
        match adapter.send(&valid, summary).await {
            Ok(()) => (ChannelOutcome::Delivered, count),
            Err(err) => {
                error!(
                    "event=alert_channel module=alerting channel=push status=error destinations={} error={}",
                    count, err
                );
                (ChannelOutcome::Failed(err.to_string()), count)
            }
        }
    }
}

fn valid_destinations(registered: Vec<String>) -> Vec<String> {
    registered
        .into_iter()
        .filter(|token| {
            let valid = is_valid_push_token(token);
            if !valid {
                warn!(
                    "event=alert_channel module=alerting channel=push status=dropped reason=invalid_token token={}",
                    mask_token(token)
                );
            }
            valid
        })
        .collect()
}
