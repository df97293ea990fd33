//! Credential source.
//!
//! The manager never owns credentials. It reads them through
//! [`CredentialSource`] on every session request and clears them when it
//! detects an expired token.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `memory` | In-process [`MemoryCredentials`] store |
//! | `token` | Unverified JWT expiry check |

// ============================================================================
// Submodules
// ============================================================================

/// In-process credential store.
pub mod memory;

/// Unverified JWT expiry check.
pub mod token;

// ============================================================================
// Imports
// ============================================================================

use crate::identifiers::{TenantId, UserId};

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::MemoryCredentials;
pub use token::TokenClaims;

// ============================================================================
// CredentialSource
// ============================================================================

/// Supplies the current authentication state.
pub trait CredentialSource: Send + Sync {
    /// Current auth token, if logged in.
    fn token(&self) -> Option<String>;

    /// Current user id, if logged in.
    fn user_id(&self) -> Option<UserId>;

    /// Tenant the user is currently scoped to, if any.
    fn tenant_id(&self) -> Option<TenantId>;

    /// Returns `true` if `token` is past its expiry.
    ///
    /// The default decodes the token without verifying it.
    fn is_expired(&self, token: &str) -> bool {
        token::is_expired(token)
    }

    /// Forgets all stored credentials.
    fn clear(&self);
}
