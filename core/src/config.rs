//! Transport configuration.
//!
//! Durations are expressed in milliseconds in the serialized form so the
//! same struct can be loaded from a JSON settings file or built in code.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

pub const ENV_CONNECT_TIMEOUT_MS: &str = "TRANSPORT_CONNECT_TIMEOUT_MS";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "TRANSPORT_REQUEST_TIMEOUT_MS";
pub const ENV_IDLE_WAIT_MS: &str = "TRANSPORT_IDLE_WAIT_MS";
pub const ENV_MAX_RESPONSE_BYTES: &str = "TRANSPORT_MAX_RESPONSE_BYTES";

/// Floor for `idle_wait`; a zero wait would turn the worker loop into a spin.
pub const MIN_IDLE_WAIT: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Limit on DNS resolution plus TCP/TLS connect.
    #[serde(rename = "connect_timeout_ms", deserialize_with = "millis")]
    pub connect_timeout: Duration,

    /// Limit on the whole call, connect included.
    #[serde(rename = "request_timeout_ms", deserialize_with = "millis")]
    pub request_timeout: Duration,

    /// How long the worker waits for new work before re-checking for shutdown.
    /// Never below `MIN_IDLE_WAIT`.
    #[serde(rename = "idle_wait_ms", deserialize_with = "idle_millis")]
    pub idle_wait: Duration,

    /// Largest response body read into memory. Larger bodies fail the
    /// request with a network error.
    pub max_response_bytes: u64,

    /// OS thread name of the worker.
    pub worker_name: String,

    /// Sent with every request unless the descriptor sets the same header.
    pub default_headers: BTreeMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        let mut default_headers = BTreeMap::new();
        default_headers.insert("Accept".to_string(), "application/json".to_string());
        default_headers.insert(
            "User-Agent".to_string(),
            concat!("transport-core/", env!("CARGO_PKG_VERSION")).to_string(),
        );
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            idle_wait: Duration::from_millis(100),
            max_response_bytes: 16 * 1024 * 1024,
            worker_name: "http-transport".to_string(),
            default_headers,
        }
    }
}

impl TransportConfig {
    /// Defaults overlaid with any `TRANSPORT_*_MS` environment variables.
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read_u64 = |key: &str| -> Option<u64> {
            let raw = lookup(key)?;
            match raw.trim().parse::<u64>() {
                Ok(n) => Some(n),
                Err(err) => {
                    tracing::warn!(key, value = %raw, %err, "ignoring malformed override");
                    None
                }
            }
        };
        let read = |key: &str| read_u64(key).map(Duration::from_millis);
        if let Some(d) = read(ENV_CONNECT_TIMEOUT_MS) {
            self.connect_timeout = d;
        }
        if let Some(d) = read(ENV_REQUEST_TIMEOUT_MS) {
            self.request_timeout = d;
        }
        if let Some(d) = read(ENV_IDLE_WAIT_MS) {
            self = self.idle_wait(d);
        }
        if let Some(n) = read_u64(ENV_MAX_RESPONSE_BYTES) {
            self.max_response_bytes = n;
        }
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Clamped to `MIN_IDLE_WAIT`.
    pub fn idle_wait(mut self, wait: Duration) -> Self {
        self.idle_wait = wait.max(MIN_IDLE_WAIT);
        self
    }

    pub fn max_response_bytes(mut self, limit: u64) -> Self {
        self.max_response_bytes = limit;
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }
}

fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

fn idle_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    millis(deserializer).map(|wait| wait.max(MIN_IDLE_WAIT))
}
