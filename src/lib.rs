//! Tenant Session Mux - one shared real-time connection per tenant and user.
//!
//! This library multiplexes many independent consumers over a single duplex
//! connection to a realtime server, scoped to the active (tenant, user)
//! identity.
//!
//! # Architecture
//!
//! - **ConnectionManager**: owns at most one transport, rebuilt only when the
//!   identity changes
//! - **SessionHandle**: per-consumer façade that registers listeners and
//!   sends events without seeing the connection lifecycle
//! - **Readiness gate**: after every (re)connect, waits for the server's
//!   `ready` and then replays every handle's listeners
//! - **Inert handle**: returned when no authenticated connection can exist,
//!   so callers never branch on connection state
//!
//! Key design principles:
//!
//! - `get_session` is synchronous and never fails
//! - Tenant-scoped event names are built by the caller (`"7-ticket"`)
//! - The transport reconnects by itself; the manager only re-checks the token
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tenant_session_mux::{ConnectionManager, MemoryCredentials, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let credentials = Arc::new(MemoryCredentials::with_identity("<jwt>", "3", None));
//!
//!     let manager = ConnectionManager::builder()
//!         .endpoint("wss://rt.example.com/socket")
//!         .credentials(credentials)
//!         .build()?;
//!
//!     let session = manager.get_session("7");
//!     session.on("7-ticket", |args| println!("ticket changed: {args:?}"));
//!     manager.on_ready(|| println!("tenant scoped"));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`credentials`] | Credential source and token expiry |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Event names and wire frames |
//! | [`session`] | Manager, handles, readiness gate |
//! | [`transport`] | Transport trait, WebSocket and in-memory transports |

// ============================================================================
// Modules
// ============================================================================

/// Credential source and token expiry.
pub mod credentials;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing tenant, user, and listener ids.
pub mod identifiers;

/// Event names and wire frames.
pub mod protocol;

/// Connection manager and session handles.
///
/// Use [`ConnectionManager::builder()`] to create a configured manager.
pub mod session;

/// Transport layer.
///
/// The [`Transport`] trait plus WebSocket and in-memory implementations.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Credential types
pub use credentials::{CredentialSource, MemoryCredentials, TokenClaims};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{HandleId, ListenerId, TenantId, UserId};

// Protocol types
pub use protocol::{DisconnectReason, EventName, Frame};

// Session types
pub use session::{
    ConnectionIdentity, ConnectionManager, GateState, LiveSession, ManagerBuilder,
    ManagerOptions, NoopHooks, ReadinessGate, SessionHandle, SessionHooks,
};

// Transport types
pub use transport::{
    ConnectOptions, Listener, MemoryTransport, MemoryTransportFactory, ReconnectionPolicy,
    Transport, TransportFactory, TransportKind, TransportState, WsTransport, WsTransportFactory,
};
