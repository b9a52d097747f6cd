#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use bon::Builder;
use url::Url;

use crate::{Error, Result};

const DEFAULT_HEARTBEAT_INTERVAL_DURATION: Duration = Duration::from_secs(15);
const DEFAULT_HEARTBEAT_TIMEOUT_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_CONNECT_TIMEOUT_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_INITIAL_BACKOFF_DURATION: Duration = Duration::from_millis(500);
const DEFAULT_MAX_BACKOFF_DURATION: Duration = Duration::from_secs(8);
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Configuration consumed by [`crate::Session::start`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use ws_session::SessionConfig;
///
/// let config = SessionConfig::builder()
///     .endpoint("wss://chat.example.com/ws")
///     .headers(vec![("X-Room".to_owned(), "lobby".to_owned())])
///     .heartbeat_interval(Duration::from_secs(25))
///     .build();
///
/// assert!(config.endpoint_url().is_ok());
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct SessionConfig {
    /// `ws://` or `wss://` address of the server
    #[builder(into)]
    pub endpoint: String,
    /// Headers attached to every handshake (room identifier, display name, ...)
    #[builder(default)]
    pub headers: Vec<(String, String)>,
    /// Interval between liveness probes on a live connection
    #[builder(default = DEFAULT_HEARTBEAT_INTERVAL_DURATION)]
    pub heartbeat_interval: Duration,
    /// Maximum time to wait for a probe's answer before considering the connection dead
    #[builder(default = DEFAULT_HEARTBEAT_TIMEOUT_DURATION)]
    pub heartbeat_timeout: Duration,
    /// Maximum time to wait for the opening handshake before counting the attempt as failed
    #[builder(default = DEFAULT_CONNECT_TIMEOUT_DURATION)]
    pub connect_timeout: Duration,
    /// Reconnection strategy configuration
    #[builder(default)]
    pub reconnect: ReconnectConfig,
}

impl SessionConfig {
    /// Parse and check the endpoint, and reject degenerate timing settings.
    pub fn endpoint_url(&self) -> Result<Url> {
        let url = Url::parse(&self.endpoint)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::validation(format!(
                "unsupported endpoint scheme `{}`, expected ws or wss",
                url.scheme()
            )));
        }
        if self.heartbeat_interval.is_zero() || self.heartbeat_timeout.is_zero() {
            return Err(Error::validation(
                "heartbeat interval and timeout must be non-zero",
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::validation("connect timeout must be non-zero"));
        }

        Ok(url)
    }
}

/// Configuration for automatic reconnection behavior.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Maximum number of reconnection attempts before giving up.
    /// `None` means infinite retries.
    pub max_attempts: Option<u32>,
    /// Backoff before the first reconnection attempt
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_MAX_RECONNECT_ATTEMPTS),
            initial_backoff: DEFAULT_INITIAL_BACKOFF_DURATION,
            max_backoff: DEFAULT_MAX_BACKOFF_DURATION,
        }
    }
}

impl ReconnectConfig {
    /// Wait before reconnection attempt `attempt` (1-based):
    /// `min(initial_backoff * 2^(attempt - 1), max_backoff)`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1_u32 << exponent)
            .min(self.max_backoff)
    }

    /// Whether `attempt` reconnections have used up the budget.
    #[must_use]
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }
}
