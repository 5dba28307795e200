//! Push delivery through the Expo push HTTP API.
//!
//! # Invariants
//! - Only tokens matching the Expo token shape are sent.
//! - Messages are posted in chunks of at most `MAX_MESSAGES_PER_REQUEST`.
//! - Per-ticket errors are logged; only failure of every chunk is an error.

use super::{AlertSummary, ChannelError, PushAdapter};
use async_trait::async_trait;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const EXPO_PUSH_ENDPOINT: &str = "https://exp.host/--/api/v2/push/send";
const MAX_MESSAGES_PER_REQUEST: usize = 100;

static PUSH_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Expo(nent)?PushToken\[[A-Za-z0-9_\-]+\]$").expect("valid push token regex")
});

/// Returns whether `token` has the shape of an Expo push token.
pub fn is_valid_push_token(token: &str) -> bool {
    PUSH_TOKEN_RE.is_match(token)
}

#[derive(Debug, Serialize)]
struct PushMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    sound: &'static str,
    data: PushData<'a>,
}

#[derive(Debug, Serialize)]
struct PushData<'a> {
    kind: &'static str,
    alerts: &'a [super::AlertLine],
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    #[serde(default)]
    data: Vec<PushTicket>,
}

#[derive(Debug, Deserialize)]
struct PushTicket {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

pub struct ExpoPushAdapter {
    client: reqwest::Client,
    endpoint: String,
}

impl ExpoPushAdapter {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ChannelError::Unavailable(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn send_chunk(&self, messages: &[PushMessage<'_>]) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("accept", "application/json")
            .json(messages)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed = parse_push_response(&body)?;
        for (ticket, message) in parsed.data.iter().zip(messages) {
            if ticket.status != "ok" {
                warn!(
                    "event=push_ticket module=channel status=error token={} message={}",
                    mask_token(message.to),
                    ticket.message.as_deref().unwrap_or("unknown")
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PushAdapter for ExpoPushAdapter {
    async fn send(
        &self,
        destinations: &[String],
        summary: &AlertSummary,
    ) -> Result<(), ChannelError> {
        let body = summary.short_body();
        let messages = destinations
            .iter()
            .filter(|token| is_valid_push_token(token))
            .map(|token| PushMessage {
                to: token.as_str(),
                title: &summary.title,
                body: &body,
                sound: "default",
                data: PushData {
                    kind: "low_stock",
                    alerts: &summary.lines,
                },
            })
            .collect::<Vec<_>>();
        if messages.is_empty() {
            return Err(ChannelError::InvalidDestination(
                "no valid push tokens".to_string(),
            ));
        }

        let mut failed_chunks = 0;
        let mut last_error = None;
        let chunks = messages.chunks(MAX_MESSAGES_PER_REQUEST);
        let chunk_count = chunks.len();
        for chunk in chunks {
            if let Err(err) = self.send_chunk(chunk).await {
                warn!(
                    "event=push_chunk module=channel status=error size={} error={}",
                    chunk.len(),
                    err
                );
                failed_chunks += 1;
                last_error = Some(err);
            }
        }

        match last_error {
            Some(err) if failed_chunks == chunk_count => Err(err),
            _ => Ok(()),
        }
    }
}

/// Decodes the ticket list of a push response. A body without tickets is
/// accepted; a body that is not JSON is a transport error.
fn parse_push_response(body: &str) -> Result<PushResponse, ChannelError> {
    serde_json::from_str(body)
        .map_err(|err| ChannelError::Transport(format!("malformed push response: {err}")))
}

/// Keeps log lines free of full device tokens.
pub(crate) fn mask_token(token: &str) -> String {
    let visible = token.chars().rev().take(4).collect::<Vec<_>>();
    format!("***{}", visible.into_iter().rev().collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::{is_valid_push_token, mask_token, parse_push_response};
    use crate::channel::ChannelError;

    #[test]
    fn accepts_both_expo_token_prefixes() {
        assert!(is_valid_push_token("ExponentPushToken[xxxxxxxxxxxxxxxxxxxxxx]"));
        assert!(is_valid_push_token("ExpoPushToken[abc-DEF_123]"));
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(!is_valid_push_token(""));
        assert!(!is_valid_push_token("ExponentPushToken[]"));
        assert!(!is_valid_push_token("ExponentPushToken[abc"));
        assert!(!is_valid_push_token("fcm:abcdef"));
        assert!(!is_valid_push_token(" ExpoPushToken[abc]"));
    }

    #[test]
    fn masked_token_keeps_only_the_tail() {
        assert_eq!(mask_token("ExpoPushToken[abcdef]"), "***def]");
    }

    #[test]
    fn ticket_errors_are_decoded_per_message() {
        let body = r#"{"data":[{"status":"ok","id":"a"},{"status":"error","message":"DeviceNotRegistered"}]}"#;
        let parsed = parse_push_response(body).unwrap();
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(parsed.data[0].status, "ok");
        assert_eq!(parsed.data[1].message.as_deref(), Some("DeviceNotRegistered"));

        assert!(parse_push_response("{}").unwrap().data.is_empty());
    }

    #[test]
    fn non_json_response_is_a_transport_error() {
        let err = parse_push_response("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ChannelError::Transport(_)));
    }
}
