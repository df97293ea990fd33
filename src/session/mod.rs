//! Session layer.
//!
//! Everything above the transport: the process-wide manager, the
//! per-consumer handles it hands out, and the readiness gate that decides
//! when registrations are replayed.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnectionManager`] | Owns the shared transport per (tenant, user) |
//! | [`ManagerBuilder`] | Fluent configuration builder |
//! | [`ManagerOptions`] | Endpoint and connection tuning |
//! | [`SessionHandle`] | Per-consumer façade, live or inert |
//! | [`ReadinessGate`] | Connect/ready state machine |
//! | [`SessionHooks`] | Reload and login redirect side effects |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for manager configuration.
pub mod builder;

/// Readiness state machine.
pub mod gate;

/// Session handles.
pub mod handle;

/// Navigation hooks.
pub mod hooks;

/// Connection manager.
pub mod manager;

/// Manager options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ManagerBuilder;
pub use gate::{GateState, ReadinessGate};
pub use handle::{LiveSession, SessionHandle};
pub use hooks::{NoopHooks, SessionHooks};
pub use manager::{ConnectionIdentity, ConnectionManager};
pub use options::ManagerOptions;
