//! Runtime configuration.
//!
//! # Responsibility
//! - Load `StockwatchConfig` from TOML with defaults for every field.
//! - Apply environment overrides and reject unusable values.
//!
//! # Invariants
//! - A validated config always has a non-zero cooldown, sweep interval and
//!   ranking limits.
//! - Missing sections or keys fall back to defaults; unknown keys are rejected.

use crate::alerting::evaluator::DEFAULT_COOLDOWN_HOURS;
use crate::channel::push::EXPO_PUSH_ENDPOINT;
use crate::scoring::service::{
    DEFAULT_CRITICAL_LIMIT, DEFAULT_CRITICAL_MAX_QUANTITY, DEFAULT_TOP_ITEMS_LIMIT,
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ALERT_RECIPIENT_ENV: &str = "STOCKWATCH_ALERT_RECIPIENT";

const DEFAULT_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::Invalid(details) => write!(f, "invalid config value: {details}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StockwatchConfig {
    pub alerts: AlertsConfig,
    pub email: EmailConfig,
    pub push: PushConfig,
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertsConfig {
    /// Minimum time between two notifications of one rule.
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
    /// Period of the background sweep loop.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Email recipient; the email channel is off without one.
    pub recipient: Option<String>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            recipient: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmailConfig {
    /// Mail relay webhook; the email channel is off without one.
    pub endpoint: Option<String>,
    pub sender: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            sender: "stockwatch@localhost".to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PushConfig {
    pub enabled: bool,
    pub endpoint: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: EXPO_PUSH_ENDPOINT.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    /// Stock ceiling used by the critical-items ranking when none is given.
    pub critical_max_quantity: i64,
    pub critical_limit: usize,
    /// Size of the top list reported by a full recomputation.
    pub top_items_limit: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            critical_max_quantity: DEFAULT_CRITICAL_MAX_QUANTITY,
            critical_limit: DEFAULT_CRITICAL_LIMIT,
            top_items_limit: DEFAULT_TOP_ITEMS_LIMIT,
        }
    }
}

impl StockwatchConfig {
    /// Parses and validates a TOML document. Environment overrides are not
    /// applied.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` (defaults when `None`), then applies environment
    /// overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&raw)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides looked up through `lookup`; blank values are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(recipient) = lookup(ALERT_RECIPIENT_ENV) {
            let trimmed = recipient.trim();
            if !trimmed.is_empty() {
                self.alerts.recipient = Some(trimmed.to_string());
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.alerts.cooldown.is_zero() {
            return Err(ConfigError::Invalid("alerts.cooldown must be > 0".to_string()));
        }
        if chrono::Duration::from_std(self.alerts.cooldown).is_err() {
            return Err(ConfigError::Invalid("alerts.cooldown is out of range".to_string()));
        }
        if self.alerts.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "alerts.sweep_interval must be > 0".to_string(),
            ));
        }
        if self.email.timeout.is_zero() || self.push.timeout.is_zero() {
            return Err(ConfigError::Invalid("channel timeouts must be > 0".to_string()));
        }
        if self.scoring.critical_max_quantity < 0 {
            return Err(ConfigError::Invalid(
                "scoring.critical_max_quantity must be >= 0".to_string(),
            ));
        }
        if self.scoring.critical_limit == 0 || self.scoring.top_items_limit == 0 {
            return Err(ConfigError::Invalid("scoring limits must be > 0".to_string()));
        }
        Ok(())
    }

    /// Cooldown as a `chrono` duration. Only valid after `validate`.
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.alerts.cooldown)
            .unwrap_or_else(|_| chrono::Duration::hours(DEFAULT_COOLDOWN_HOURS))
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, StockwatchConfig, ALERT_RECIPIENT_ENV};
    use std::time::Duration;

    #[test]
    fn empty_document_yields_defaults() {
        let config = StockwatchConfig::from_toml_str("").expect("empty config should parse");
        assert_eq!(config, StockwatchConfig::default());
        assert_eq!(config.alerts.cooldown, Duration::from_secs(86_400));
        assert_eq!(config.alerts.sweep_interval, Duration::from_secs(900));
        assert_eq!(config.scoring.critical_max_quantity, 5);
        assert_eq!(config.scoring.critical_limit, 20);
        assert_eq!(config.scoring.top_items_limit, 10);
        assert!(config.push.enabled);
        assert_eq!(config.cooldown(), chrono::Duration::hours(24));
    }

    #[test]
    fn humantime_durations_are_parsed() {
        let config = StockwatchConfig::from_toml_str(
            r#"
            [alerts]
            cooldown = "6h"
            sweep_interval = "30s"
            recipient = "ops@example.com"

            [email]
            endpoint = "http://relay.local/send"
            timeout = "2s 500ms"
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.alerts.cooldown, Duration::from_secs(6 * 3600));
        assert_eq!(config.alerts.sweep_interval, Duration::from_secs(30));
        assert_eq!(config.alerts.recipient.as_deref(), Some("ops@example.com"));
        assert_eq!(config.email.timeout, Duration::from_millis(2500));
    }

    #[test]
    fn zero_cooldown_is_rejected() {
        let error = StockwatchConfig::from_toml_str("[alerts]\ncooldown = \"0s\"\n")
            .expect_err("zero cooldown must be rejected");
        assert!(matches!(error, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_limits_are_rejected() {
        let error = StockwatchConfig::from_toml_str("[scoring]\ntop_items_limit = 0\n")
            .expect_err("zero limit must be rejected");
        assert!(matches!(error, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let error = StockwatchConfig::from_toml_str("[alerts]\ncooldwn = \"1h\"\n")
            .expect_err("typo must be rejected");
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn env_override_replaces_recipient() {
        let mut config = StockwatchConfig::default();
        config.apply_env_overrides(|key| {
            (key == ALERT_RECIPIENT_ENV).then(|| " buyer@example.com ".to_string())
        });
        assert_eq!(config.alerts.recipient.as_deref(), Some("buyer@example.com"));

        config.apply_env_overrides(|_| Some("   ".to_string()));
        assert_eq!(config.alerts.recipient.as_deref(), Some("buyer@example.com"));
    }
}
