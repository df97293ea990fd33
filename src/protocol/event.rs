//! Event vocabulary shared with the server.
//!
//! Lifecycle names are a closed set and exact on the wire. Tenant-scoped
//! domain events use the open-ended `<tenant>-<domain>` form and carry
//! opaque payloads.
//!
//! | Name | Direction | Meaning |
//! |------|-----------|---------|
//! | `connect` | local | Physical connection (re)established |
//! | `ready` | server → client | Tenant scoping established, once per connection |
//! | `disconnect` | local | Connection lost, carries a reason string |
//! | `reconnect_attempt` | local | About to retry, query may be rewritten |
//! | `connect_error` | local | Handshake-level failure |
//! | `heartbeat` | server → client | Must be echoed back verbatim |
//! | `pong` | server → client | Keep-alive reply |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::identifiers::TenantId;

// ============================================================================
// EventName
// ============================================================================

/// Name of an event on the shared connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    /// Physical connection established.
    Connect,
    /// Server finished tenant scoping for this connection.
    Ready,
    /// Connection lost.
    Disconnect,
    /// Transport is about to retry the connection.
    ReconnectAttempt,
    /// Handshake-level connection failure.
    ConnectError,
    /// Server keep-alive ping.
    Heartbeat,
    /// Keep-alive reply.
    Pong,
    /// Any other event, passed through untouched.
    Custom(String),
}

impl EventName {
    /// Builds a tenant-scoped domain event name (`<tenant>-<domain>`).
    #[must_use]
    pub fn tenant_scoped(tenant: &TenantId, domain: &str) -> Self {
        Self::Custom(format!("{}-{}", tenant, domain))
    }

    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Connect => "connect",
            Self::Ready => "ready",
            Self::Disconnect => "disconnect",
            Self::ReconnectAttempt => "reconnect_attempt",
            Self::ConnectError => "connect_error",
            Self::Heartbeat => "heartbeat",
            Self::Pong => "pong",
            Self::Custom(name) => name,
        }
    }

    /// Returns `true` for names the transport itself generates.
    ///
    /// These are delivered locally and never sent over the wire.
    #[inline]
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Connect | Self::Disconnect | Self::ReconnectAttempt | Self::ConnectError
        )
    }
}

impl From<&str> for EventName {
    fn from(name: &str) -> Self {
        match name {
            "connect" => Self::Connect,
            "ready" => Self::Ready,
            "disconnect" => Self::Disconnect,
            "reconnect_attempt" => Self::ReconnectAttempt,
            "connect_error" => Self::ConnectError,
            "heartbeat" => Self::Heartbeat,
            "pong" => Self::Pong,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for EventName {
    fn from(name: String) -> Self {
        match Self::from(name.as_str()) {
            Self::Custom(_) => Self::Custom(name),
            known => known,
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// DisconnectReason
// ============================================================================

/// Reason carried by a `disconnect` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Server closed the connection on purpose.
    ServerDisconnect,
    /// Local side called `close()`.
    ClientDisconnect,
    /// No traffic within ping interval plus timeout.
    PingTimeout,
    /// Underlying socket closed.
    TransportClose,
    /// Underlying socket failed.
    TransportError,
    /// Reason string not in the known set.
    Other(String),
}

impl DisconnectReason {
    /// Parses a reason string.
    #[must_use]
    pub fn parse(reason: &str) -> Self {
        match reason {
            "io server disconnect" => Self::ServerDisconnect,
            "io client disconnect" => Self::ClientDisconnect,
            "ping timeout" => Self::PingTimeout,
            "transport close" => Self::TransportClose,
            "transport error" => Self::TransportError,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the wire string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ServerDisconnect => "io server disconnect",
            Self::ClientDisconnect => "io client disconnect",
            Self::PingTimeout => "ping timeout",
            Self::TransportClose => "transport close",
            Self::TransportError => "transport error",
            Self::Other(reason) => reason,
        }
    }

    /// Returns `true` if the local side closed the connection.
    #[inline]
    #[must_use]
    pub fn is_client_initiated(&self) -> bool {
        matches!(self, Self::ClientDisconnect)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names_parse() {
        for name in [
            "connect",
            "ready",
            "disconnect",
            "reconnect_attempt",
            "connect_error",
            "heartbeat",
            "pong",
        ] {
            let event = EventName::from(name);
            assert!(!matches!(event, EventName::Custom(_)), "{name}");
            assert_eq!(event.as_str(), name);
        }
    }

    #[test]
    fn test_custom_name_passes_through() {
        let event = EventName::from("7-ticket");
        assert_eq!(event, EventName::Custom("7-ticket".into()));
        assert_eq!(event.to_string(), "7-ticket");
    }

    #[test]
    fn test_tenant_scoped_name() {
        let tenant = TenantId::from(7);
        let event = EventName::tenant_scoped(&tenant, "counter");
        assert_eq!(event.as_str(), "7-counter");
    }

    #[test]
    fn test_local_events() {
        assert!(EventName::Connect.is_local());
        assert!(EventName::Disconnect.is_local());
        assert!(!EventName::Ready.is_local());
        assert!(!EventName::Heartbeat.is_local());
    }

    #[test]
    fn test_disconnect_reason_round_trip() {
        let reason = DisconnectReason::parse("transport close");
        assert_eq!(reason, DisconnectReason::TransportClose);
        assert_eq!(reason.as_str(), "transport close");
        assert!(!reason.is_client_initiated());
        assert!(DisconnectReason::parse("io client disconnect").is_client_initiated());
        assert_eq!(
            DisconnectReason::parse("forced"),
            DisconnectReason::Other("forced".into())
        );
    }
}
