//! Transport layer.
//!
//! A transport is the one physical duplex connection shared by every session
//! handle. The manager only sees the [`Transport`] trait; how bytes move is the
//! factory's business.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                          ┌──────────────────┐
//! │  ConnectionManager   │                          │  Realtime server │
//! │  SessionHandle ×N    │        one socket        │                  │
//! │        │             │◄────────────────────────►│  tenant-scoped   │
//! │  dyn Transport       │   JSON {event, args}     │  event bus       │
//! └──────────────────────┘                          └──────────────────┘
//! ```
//!
//! # Transport Lifecycle
//!
//! 1. `TransportFactory::connect` - returns immediately, connects in background
//! 2. `connect` event - physical link up
//! 3. `ready` event - server finished tenant scoping
//! 4. `disconnect` / `reconnect_attempt` - handled by the transport itself
//! 5. `Transport::close` - deliberate shutdown, no more reconnects
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket transport and its event loop |
//! | `listeners` | Listener table shared by all transports |
//! | `memory` | In-process transport for tests and embedding |
//! | `options` | Connection parameters and reconnection policy |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket transport and its event loop.
pub mod connection;

/// Listener table shared by all transports.
pub mod listeners;

/// In-process transport.
pub mod memory;

/// Connection parameters.
pub mod options;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::identifiers::ListenerId;
use crate::protocol::EventName;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{WsTransport, WsTransportFactory};
pub use listeners::{Callback, Listener, ListenerTable};
pub use memory::{MemoryTransport, MemoryTransportFactory};
pub use options::{ConnectOptions, ReconnectionPolicy, TransportKind};

// ============================================================================
// TransportState
// ============================================================================

/// Observable state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// No physical link.
    #[default]
    Disconnected,
    /// Handshake or reconnection in progress.
    Connecting,
    /// Physical link up.
    Connected,
    /// Closed for good: `close()` was called or reconnection gave up.
    Closed,
}

impl TransportState {
    /// Returns `true` once the transport will never reconnect.
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Closed
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
        })
    }
}

// ============================================================================
// Transport
// ============================================================================

/// One auto-reconnecting duplex connection.
///
/// All methods are synchronous and non-blocking. Listeners stay attached
/// across reconnects of the same transport.
pub trait Transport: Send + Sync {
    /// Current state.
    fn state(&self) -> TransportState;

    /// Attaches a listener. Attaching the same listener id twice is a no-op.
    fn on(&self, event: &EventName, listener: Listener);

    /// Detaches a listener by id.
    fn off(&self, event: &EventName, id: ListenerId);

    /// Sends an event. Frames emitted while disconnected are buffered.
    fn emit(&self, event: &EventName, args: Vec<Value>);

    /// Detaches every listener, including lifecycle wiring.
    fn remove_all_listeners(&self);

    /// Closes the connection for good.
    fn close(&self);

    /// Rewrites a query parameter used by the next connection attempt.
    fn set_query(&self, key: &str, value: &str);
}

// ============================================================================
// TransportFactory
// ============================================================================

/// Opens transports.
pub trait TransportFactory: Send + Sync {
    /// Opens a transport. Returns before the physical link is up.
    ///
    /// # Errors
    ///
    /// Implementations fail only on invalid options or a missing runtime.
    fn connect(&self, options: &ConnectOptions) -> Result<Arc<dyn Transport>>;
}
