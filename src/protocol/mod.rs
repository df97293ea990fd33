//! Wire protocol types.
//!
//! This module defines the event vocabulary and the frame format exchanged
//! with the realtime server.
//!
//! # Protocol Overview
//!
//! | Type | Purpose |
//! |------|---------|
//! | `EventName` | Closed lifecycle names plus open tenant-scoped names |
//! | `DisconnectReason` | Reason string carried by `disconnect` |
//! | `Frame` | JSON text frame `{ event, args }` |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Event names and disconnect reasons |
//! | `frame` | Frame encoding and decoding |

// ============================================================================
// Submodules
// ============================================================================

/// Event names and disconnect reasons.
pub mod event;

/// JSON wire frame.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{DisconnectReason, EventName};
pub use frame::Frame;
