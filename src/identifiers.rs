//! Type-safe identifiers.
//!
//! Newtype wrappers keep tenant, user, listener and handle identifiers from
//! being mixed up at compile time.
//!
//! | Type | Source | Purpose |
//! |------|--------|---------|
//! | [`TenantId`] | caller / credentials | Tenant scope of a connection |
//! | [`UserId`] | credentials | User half of the connection identity |
//! | [`ListenerId`] | process counter | Identity of a registered callback |
//! | [`HandleId`] | UUID v4 | Identity of a session handle (logging) |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// TenantId
// ============================================================================

/// Canonical tenant identifier.
///
/// Tenants arrive as strings or numbers from different sources. Normalization
/// trims whitespace and rewrites purely numeric ids in canonical decimal form,
/// so `" 007"`, `"7"` and `7` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Normalizes a raw tenant id.
    ///
    /// Returns `None` for empty or whitespace-only input.
    #[must_use]
    pub fn normalize(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            let digits = trimmed.trim_start_matches('0');
            let canonical = if digits.is_empty() { "0" } else { digits };
            return Some(Self(canonical.to_string()));
        }

        Some(Self(trimmed.to_string()))
    }

    /// Returns the canonical string form.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for TenantId {
    #[inline]
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// UserId
// ============================================================================

/// User identifier as reported by the credential source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a user id.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// ListenerId
// ============================================================================

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a registered callback.
///
/// Transports use it to make re-attachment idempotent and to detach a
/// specific callback without comparing closures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocates the next listener id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

// ============================================================================
// HandleId
// ============================================================================

/// Identity of a session handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(Uuid);

impl HandleId {
    /// Generates a fresh handle id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_tenant_normalize_numeric() {
        assert_eq!(TenantId::normalize("7"), Some(TenantId::from(7)));
        assert_eq!(TenantId::normalize(" 007 "), Some(TenantId::from(7)));
        assert_eq!(TenantId::normalize("000"), Some(TenantId::from(0)));
    }

    #[test]
    fn test_tenant_normalize_empty() {
        assert_eq!(TenantId::normalize(""), None);
        assert_eq!(TenantId::normalize("   "), None);
    }

    #[test]
    fn test_tenant_normalize_slug() {
        let tenant = TenantId::normalize(" acme ").expect("slug tenant");
        assert_eq!(tenant.as_str(), "acme");
        assert_eq!(tenant.to_string(), "acme");
    }

    #[test]
    fn test_listener_ids_are_unique() {
        let a = ListenerId::next();
        let b = ListenerId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_handle_ids_are_unique() {
        assert_ne!(HandleId::generate(), HandleId::generate());
    }

    proptest! {
        #[test]
        fn prop_numeric_tenant_matches_integer(n in any::<u64>(), zeros in 0usize..4) {
            let raw = format!("{}{}", "0".repeat(zeros), n);
            prop_assert_eq!(TenantId::normalize(&raw), Some(TenantId::from(n)));
        }

        #[test]
        fn prop_normalize_is_idempotent(raw in "[ a-z0-9-]{0,12}") {
            if let Some(tenant) = TenantId::normalize(&raw) {
                prop_assert_eq!(TenantId::normalize(tenant.as_str()), Some(tenant));
            }
        }
    }
}
