//! Connection manager configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use tenant_session_mux::ManagerOptions;
//!
//! let options = ManagerOptions::new()
//!     .with_endpoint("wss://rt.example.com/socket")
//!     .with_ping(Duration::from_secs(25), Duration::from_secs(60))
//!     .with_reconnect_attempts(10);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::transport::{ConnectOptions, ReconnectionPolicy, TransportKind};

// ============================================================================
// Constants
// ============================================================================

/// Delay before the forced reload after an expired token, so pending UI
/// transitions can settle.
const DEFAULT_RELOAD_DELAY: Duration = Duration::from_millis(1500);

/// Default login entry point.
const DEFAULT_LOGIN_PATH: &str = "/login";

// ============================================================================
// ManagerOptions
// ============================================================================

/// Tuning for the shared connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerOptions {
    /// Realtime server endpoint.
    pub endpoint: String,

    /// Transport preference, most preferred first.
    pub transports: Vec<TransportKind>,

    /// Automatic reconnection policy.
    pub reconnection: ReconnectionPolicy,

    /// Keep-alive interval.
    pub ping_interval: Duration,

    /// Grace period after a missed keep-alive.
    pub ping_timeout: Duration,

    /// Delay before the forced reload on an expired token.
    pub reload_delay: Duration,

    /// Where to send the user after credentials are cleared.
    pub login_path: String,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ManagerOptions {
    /// Creates options with default tuning and no endpoint.
    #[must_use]
    pub fn new() -> Self {
        let base = ConnectOptions::new(String::new());
        Self {
            endpoint: base.endpoint,
            transports: base.transports,
            reconnection: base.reconnection,
            ping_interval: base.ping_interval,
            ping_timeout: base.ping_timeout,
            reload_delay: DEFAULT_RELOAD_DELAY,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ManagerOptions {
    /// Sets the endpoint.
    #[inline]
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the transport preference list.
    #[inline]
    #[must_use]
    pub fn with_transports(mut self, transports: impl IntoIterator<Item = TransportKind>) -> Self {
        self.transports = transports.into_iter().collect();
        self
    }

    /// Sets the maximum reconnection attempts.
    #[inline]
    #[must_use]
    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnection.max_attempts = attempts;
        self
    }

    /// Sets the reconnection policy.
    #[inline]
    #[must_use]
    pub fn with_reconnection(mut self, policy: ReconnectionPolicy) -> Self {
        self.reconnection = policy;
        self
    }

    /// Sets keep-alive interval and timeout.
    #[inline]
    #[must_use]
    pub fn with_ping(mut self, interval: Duration, timeout: Duration) -> Self {
        self.ping_interval = interval;
        self.ping_timeout = timeout;
        self
    }

    /// Sets the reload delay after an expired token.
    #[inline]
    #[must_use]
    pub fn with_reload_delay(mut self, delay: Duration) -> Self {
        self.reload_delay = delay;
        self
    }

    /// Sets the login entry point.
    #[inline]
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }
}

// ============================================================================
// Conversion
// ============================================================================

impl ManagerOptions {
    /// Builds transport options carrying `token` as a query parameter.
    #[must_use]
    pub fn connect_options(&self, token: &str) -> ConnectOptions {
        let mut options = ConnectOptions::new(self.endpoint.clone()).with_query("token", token);
        options.transports = self.transports.clone();
        options.reconnection = self.reconnection;
        options.ping_interval = self.ping_interval;
        options.ping_timeout = self.ping_timeout;
        options
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] or [`crate::Error::Url`] for invalid values.
    pub fn validate(&self) -> Result<()> {
        self.connect_options("").validate()
    }
}

// ============================================================================
// Tests
// ============================================================================
