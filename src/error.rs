//! Error types for the session multiplexer.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! Construction and transport plumbing return [`Result<T>`] which uses [`Error`].
//! The caller-facing session surface never returns errors: failures are logged
//! and degrade into an inert handle or a dropped event.
//!
//! ```ignore
//! use tenant_session_mux::{ConnectionManager, Result};
//!
//! fn build(credentials: Arc<MemoryCredentials>) -> Result<ConnectionManager> {
//!     ConnectionManager::builder()
//!         .endpoint("wss://realtime.example.com/socket")
//!         .credentials(credentials)
//!         .build()
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::UnsupportedTransport`] |
//! | Authentication | [`Error::AuthExpired`], [`Error::NoCredentials`] |
//! | Protocol | [`Error::Protocol`] |
//! | External | [`Error::Json`], [`Error::WebSocket`], [`Error::Url`] |
//!
//! Disconnects and handshake failures are not errors here: the transport
//! reports them as `disconnect` and `connect_error` events and reconnects
//! on its own.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when manager or transport options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// None of the preferred transports is supported by the factory.
    #[error("Unsupported transport: {transport}")]
    UnsupportedTransport {
        /// The transport preference that could not be honored.
        transport: String,
    },

    // ========================================================================
    // Authentication Errors
    // ========================================================================
    /// Token present but past its expiry.
    ///
    /// Recovered by clearing credentials and forcing navigation to login.
    #[error("Authentication token expired")]
    AuthExpired,

    /// Token or tenant absent.
    ///
    /// Not a failure from the caller's point of view: yields an inert handle.
    #[error("No credentials available")]
    NoCredentials,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed frame or unexpected message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket handshake or socket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Endpoint URL could not be parsed.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an unsupported transport error.
    #[inline]
    pub fn unsupported_transport(transport: impl Into<String>) -> Self {
        Self::UnsupportedTransport {
            transport: transport.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is an authentication error.
    #[inline]
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::AuthExpired | Self::NoCredentials)
    }
}

// ============================================================================
// Tests
// ============================================================================
