#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use stockwatch_core::db::{into_shared, open_db_in_memory};
use stockwatch_core::{
    AlertSummary, ChannelError, Channels, EmailAdapter, ManualClock, PushAdapter, Stockwatch,
    StockwatchConfig,
};

pub const VALID_TOKEN: &str = "ExponentPushToken[abc123]";
pub const OTHER_VALID_TOKEN: &str = "ExpoPushToken[xyz-789]";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

#[derive(Default)]
pub struct RecordingEmail {
    pub sent: Mutex<Vec<(String, AlertSummary)>>,
}

impl RecordingEmail {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl EmailAdapter for RecordingEmail {
    async fn send(&self, recipient: &str, summary: &AlertSummary) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), summary.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPush {
    pub sent: Mutex<Vec<(Vec<String>, AlertSummary)>>,
}

impl RecordingPush {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_destinations(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .last()
            .map(|(tokens, _)| tokens.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PushAdapter for RecordingPush {
    async fn send(
        &self,
        destinations: &[String],
        summary: &AlertSummary,
    ) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .unwrap()
            .push((destinations.to_vec(), summary.clone()));
        Ok(())
    }
}

pub struct FailingEmail;

#[async_trait]
impl EmailAdapter for FailingEmail {
    async fn send(&self, _recipient: &str, _summary: &AlertSummary) -> Result<(), ChannelError> {
        Err(ChannelError::Unavailable("smtp relay down".to_string()))
    }
}

pub struct FailingPush;

#[async_trait]
impl PushAdapter for FailingPush {
    async fn send(
        &self,
        _destinations: &[String],
        _summary: &AlertSummary,
    ) -> Result<(), ChannelError> {
        Err(ChannelError::Rejected {
            status: 503,
            body: "unavailable".to_string(),
        })
    }
}

pub struct Harness {
    pub app: Stockwatch,
    pub clock: Arc<ManualClock>,
}

/// In-memory app with the given channels and a manual clock.
pub fn harness(channels: Channels) -> Harness {
    let clock = Arc::new(ManualClock::new(start_time()));
    let conn = into_shared(open_db_in_memory().unwrap());
    let app = Stockwatch::from_parts(conn, StockwatchConfig::default(), channels, clock.clone());
    Harness { app, clock }
}

pub fn recording_channels() -> (Channels, Arc<RecordingEmail>, Arc<RecordingPush>) {
    let email = Arc::new(RecordingEmail::default());
    let push = Arc::new(RecordingPush::default());
    let channels = Channels {
        email: Some((email.clone() as Arc<dyn EmailAdapter>, "buyer@example.com".to_string())),
        push: Some(push.clone() as Arc<dyn PushAdapter>),
    };
    (channels, email, push)
}
