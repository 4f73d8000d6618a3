// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client configuration: service credentials, polling cadence, retry policy,
// and timeouts.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LesewerkError, Result};

pub const ENV_ENDPOINT: &str = "AZ_DOCINT_ENDPOINT";
pub const ENV_API_KEY: &str = "AZ_DOCINT_KEY";
pub const ENV_API_VERSION: &str = "LESEWERK_API_VERSION";
pub const ENV_POLL_INTERVAL_MS: &str = "LESEWERK_POLL_INTERVAL_MS";
pub const ENV_TIMEOUT_SECS: &str = "LESEWERK_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "LESEWERK_MAX_RETRIES";

pub const DEFAULT_API_VERSION: &str = "2024-11-30";

/// Backoff policy for transient transport failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay between retries (exponential backoff).
    #[serde(with = "duration_ms", rename = "base_delay_ms")]
    pub base_delay: Duration,
    /// Maximum delay between retries.
    #[serde(with = "duration_ms", rename = "max_delay_ms")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Per-operation polling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Poll interval used when the service gives no hint.
    #[serde(with = "duration_ms", rename = "poll_interval_ms")]
    pub poll_interval: Duration,
    /// Upper bound applied to service hints.
    #[serde(with = "duration_ms", rename = "max_poll_interval_ms")]
    pub max_poll_interval: Duration,
    pub retry: RetryConfig,
    /// Wall-clock limit from submission to terminal state.
    #[serde(with = "duration_ms", rename = "timeout_ms")]
    pub timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_poll_interval: Duration::from_secs(30),
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Everything needed to talk to the service.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Resource endpoint, e.g. `https://<name>.cognitiveservices.azure.com/`.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Per-HTTP-request timeout.
    #[serde(with = "duration_ms", rename = "request_timeout_ms", default = "default_request_timeout")]
    pub request_timeout: Duration,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_owned()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            api_version: default_api_version(),
            request_timeout: default_request_timeout(),
            tracker: TrackerConfig::default(),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("request_timeout", &self.request_timeout)
            .field("tracker", &self.tracker)
            .finish()
    }
}

impl ClientConfig {
    /// Load a JSON config file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&data)?;
        debug!(path = %path.as_ref().display(), "loaded config file");
        Ok(config)
    }

    /// Overlay process environment variables on `self`, then validate.
    pub fn with_env(self) -> Result<Self> {
        self.with_lookup(|name| std::env::var(name).ok())
    }

    /// Overlay variables from an arbitrary lookup function, then validate.
    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.api_key = key;
        }
        if let Some(version) = lookup(ENV_API_VERSION) {
            self.api_version = version;
        }
        if let Some(ms) = lookup(ENV_POLL_INTERVAL_MS) {
            self.tracker.poll_interval = Duration::from_millis(parse_number(ENV_POLL_INTERVAL_MS, &ms)?);
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            self.tracker.timeout = Duration::from_secs(parse_number(ENV_TIMEOUT_SECS, &secs)?);
        }
        if let Some(retries) = lookup(ENV_MAX_RETRIES) {
            self.tracker.retry.max_retries = parse_number(ENV_MAX_RETRIES, &retries)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Defaults overlaid with `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Self::default().with_lookup(lookup)
    }

    /// Check that credentials are present and the endpoint looks like a URL.
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(LesewerkError::Config(format!("{ENV_ENDPOINT} is not set")));
        }
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(LesewerkError::Config(format!(
                "endpoint '{endpoint}' must start with https://"
            )));
        }
        if endpoint.contains('<') {
            return Err(LesewerkError::Config(format!(
                "endpoint '{endpoint}' still contains a placeholder"
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(LesewerkError::Config(format!("{ENV_API_KEY} is not set")));
        }
        if self.tracker.timeout.is_zero() {
            return Err(LesewerkError::Config("timeout must be greater than zero".into()));
        }
        Ok(())
    }

    /// Endpoint without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim().trim_end_matches('/')
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| LesewerkError::Config(format!("{name}='{raw}' is not a valid number")))
}

/// Serialize `Duration` as integer milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
