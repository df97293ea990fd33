//! Readiness gate.
//!
//! Tracks whether the server has finished tenant scoping on the current
//! physical connection. One gate lives as long as one transport.
//!
//! ```text
//!  NotReady ──connect──► Armed ──ready──► Ready
//!     ▲                    ▲                │
//!     │                    └────connect─────┤
//!     └──────────────disconnect─────────────┘
//! ```
//!
//! A `ready` that arrives while not armed is ignored, so each physical
//! connection enters `Ready` at most once.

// ============================================================================
// GateState
// ============================================================================

/// State of a [`ReadinessGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateState {
    /// No connection, or connection lost.
    #[default]
    NotReady,
    /// Connected, waiting for the server's `ready`.
    Armed,
    /// Server confirmed tenant scoping.
    Ready,
}

// ============================================================================
// ReadinessGate
// ============================================================================

/// Per-transport readiness state machine.
#[derive(Debug, Clone, Default)]
pub struct ReadinessGate {
    state: GateState,
}

impl ReadinessGate {
    /// Creates a gate in `NotReady`.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: GateState::NotReady,
        }
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> GateState {
        self.state
    }

    /// Returns `true` in `Ready`.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == GateState::Ready
    }

    /// Physical connection (re)established: drop readiness, arm for `ready`.
    #[inline]
    pub fn on_connect(&mut self) {
        self.state = GateState::Armed;
    }

    /// Server sent `ready`. Returns `true` if this entered `Ready`.
    #[inline]
    pub fn on_ready(&mut self) -> bool {
        if self.state == GateState::Armed {
            self.state = GateState::Ready;
            true
        } else {
            false
        }
    }

    /// Physical connection lost.
    #[inline]
    pub fn on_disconnect(&mut self) {
        self.state = GateState::NotReady;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_cycle() {
        let mut gate = ReadinessGate::new();
        assert_eq!(gate.state(), GateState::NotReady);

        gate.on_connect();
        assert_eq!(gate.state(), GateState::Armed);
        assert!(!gate.is_ready());

        assert!(gate.on_ready());
        assert!(gate.is_ready());

        gate.on_disconnect();
        assert_eq!(gate.state(), GateState::NotReady);

        gate.on_connect();
        assert!(gate.on_ready());
    }

    #[test]
    fn test_ready_without_connect_is_ignored() {
        let mut gate = ReadinessGate::new();
        assert!(!gate.on_ready());
        assert_eq!(gate.state(), GateState::NotReady);
    }

    #[test]
    fn test_ready_fires_once_per_connection() {
        let mut gate = ReadinessGate::new();
        gate.on_connect();
        assert!(gate.on_ready());
        assert!(!gate.on_ready());
        assert!(gate.is_ready());
    }

    #[test]
    fn test_connect_while_ready_rearms() {
        let mut gate = ReadinessGate::new();
        gate.on_connect();
        gate.on_ready();
        gate.on_connect();
        assert_eq!(gate.state(), GateState::Armed);
        assert!(!gate.is_ready());
    }
}
