use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::common::ContentEncoding;
use crate::version::ExchangeVersion;

const DEFAULT_TIMEOUT_SECS: u64 = 100;
const DEFAULT_MAX_REDIRECTIONS: u32 = 10;
const DEFAULT_MAX_BACKOFF_RETRIES: u32 = 3;
const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;

fn default_user_agent() -> String {
    format!("fast-ews-rs/{}", env!("CARGO_PKG_VERSION"))
}

/// Settings shared by [`ExchangeService`](crate::ExchangeService) and
/// [`AutodiscoverService`](crate::AutodiscoverService).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub requested_version: ExchangeVersion,
    /// Upper bound on Autodiscover redirect hops.
    pub max_redirections: u32,
    /// How often a throttled (`ErrorServerBusy`) call is retried.
    pub max_backoff_retries: u32,
    /// Cap on a single server-requested back-off.
    pub max_backoff_ms: u64,
    /// Log request and response bodies at `trace` level.
    pub trace_payloads: bool,
    pub accept_gzip: bool,
    pub request_compression: ContentEncoding,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: default_user_agent(),
            requested_version: ExchangeVersion::default(),
            max_redirections: DEFAULT_MAX_REDIRECTIONS,
            max_backoff_retries: DEFAULT_MAX_BACKOFF_RETRIES,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            trace_payloads: false,
            accept_gzip: true,
            request_compression: ContentEncoding::Identity,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `EWS_TIMEOUT_SECS`, `EWS_USER_AGENT`,
    /// `EWS_VERSION` and `EWS_TRACE_PAYLOADS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.timeout_secs = read_env_u64("EWS_TIMEOUT_SECS", config.timeout_secs).max(1);
        if let Some(agent) = read_env_string("EWS_USER_AGENT") {
            config.user_agent = agent;
        }
        if let Some(raw) = read_env_string("EWS_VERSION") {
            match raw.parse() {
                Ok(version) => config.requested_version = version,
                Err(err) => warn!(value = %raw, error = %err, "ignoring EWS_VERSION"),
            }
        }
        config.trace_payloads = read_env_bool("EWS_TRACE_PAYLOADS", config.trace_payloads);
        config
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Clamp a server-requested back-off to `max_backoff_ms`.
    pub fn backoff(&self, requested_ms: u64) -> Duration {
        Duration::from_millis(requested_ms.min(self.max_backoff_ms))
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn read_env_u64(name: &str, default: u64) -> u64 {
    read_env_string(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn read_env_bool(name: &str, default: bool) -> bool {
    match read_env_string(name).as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}
