//! Email delivery through an HTTP mail relay.
//!
//! The relay accepts `{from, to, subject, text}` JSON and answers 2xx when
//! the message is queued.

use super::{AlertSummary, ChannelError, EmailAdapter};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: String,
}

pub struct WebhookEmailAdapter {
    client: reqwest::Client,
    endpoint: String,
    sender: String,
}

impl WebhookEmailAdapter {
    pub fn new(
        endpoint: impl Into<String>,
        sender: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ChannelError::Unavailable(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            sender: sender.into(),
        })
    }
}

#[async_trait]
impl EmailAdapter for WebhookEmailAdapter {
    async fn send(&self, recipient: &str, summary: &AlertSummary) -> Result<(), ChannelError> {
        let recipient = recipient.trim();
        if !looks_like_email(recipient) {
            return Err(ChannelError::InvalidDestination(recipient.to_string()));
        }

        let message = RelayMessage {
            from: &self.sender,
            to: recipient,
            subject: &summary.title,
            text: summary.body(),
        };
        let response = self.client.post(&self.endpoint).json(&message).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::looks_like_email;

    #[test]
    fn recipient_shape_check() {
        assert!(looks_like_email("stock@example.com"));
        assert!(!looks_like_email("stock.example.com"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("a b@example.com"));
    }
}
