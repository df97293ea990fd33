//! Connection parameters handed to a transport factory.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default reconnection attempts before the transport gives up.
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 10;

/// Default delay before the first reconnection attempt.
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Default upper bound for the backoff delay.
const DEFAULT_RECONNECT_DELAY_MAX: Duration = Duration::from_secs(5);

/// Default keep-alive interval, tuned for long-idle dashboards.
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(25);

/// Default grace period after a missed keep-alive.
const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// TransportKind
// ============================================================================

/// Physical transport flavor, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Full-duplex WebSocket.
    #[serde(rename = "websocket")]
    WebSocket,

    /// HTTP long-polling fallback.
    Polling,
}

impl TransportKind {
    /// Returns the wire name.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebSocket => "websocket",
            Self::Polling => "polling",
        }
    }
}

// ============================================================================
// ReconnectionPolicy
// ============================================================================

/// Bounded exponential backoff for automatic reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectionPolicy {
    /// Attempts after a lost connection before giving up.
    pub max_attempts: u32,

    /// Delay before the first attempt.
    pub delay: Duration,

    /// Upper bound for the delay.
    pub max_delay: Duration,
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            delay: DEFAULT_RECONNECT_DELAY,
            max_delay: DEFAULT_RECONNECT_DELAY_MAX,
        }
    }
}

impl ReconnectionPolicy {
    /// Returns the delay before attempt `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

// ============================================================================
// ConnectOptions
// ============================================================================

/// Everything a factory needs to open one transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Server endpoint URL.
    pub endpoint: String,

    /// Transport preference, most preferred first.
    pub transports: Vec<TransportKind>,

    /// Reconnection policy.
    pub reconnection: ReconnectionPolicy,

    /// Keep-alive interval.
    pub ping_interval: Duration,

    /// Grace period after a missed keep-alive.
    pub ping_timeout: Duration,

    /// Connection query parameters (carries the token).
    pub query: BTreeMap<String, String>,
}

impl ConnectOptions {
    /// Creates options for an endpoint with default tuning.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            transports: vec![TransportKind::WebSocket, TransportKind::Polling],
            reconnection: ReconnectionPolicy::default(),
            ping_interval: DEFAULT_PING_INTERVAL,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            query: BTreeMap::new(),
        }
    }

    /// Adds a query parameter.
    #[inline]
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Returns the token query parameter, if set.
    #[inline]
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.query.get("token").map(String::as_str)
    }

    /// Returns how long a connection may stay silent before it is dropped.
    #[inline]
    #[must_use]
    pub fn silence_limit(&self) -> Duration {
        self.ping_interval + self.ping_timeout
    }

    /// Builds the endpoint URL with the given query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the endpoint is not a valid URL.
    pub fn url_with(&self, query: &BTreeMap<String, String>) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Validates the tuning values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty transport list or zero timeouts.
    pub fn validate(&self) -> Result<()> {
        if self.transports.is_empty() {
            return Err(Error::config("At least one transport is required"));
        }
        if self.ping_interval.is_zero() || self.ping_timeout.is_zero() {
            return Err(Error::config("Ping interval and timeout must be non-zero"));
        }
        Url::parse(&self.endpoint)?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
