//! In-process credential store.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::RwLock;
use tracing::debug;

use crate::identifiers::{TenantId, UserId};

use super::CredentialSource;

// ============================================================================
// MemoryCredentials
// ============================================================================

#[derive(Debug, Default)]
struct Stored {
    token: Option<String>,
    user_id: Option<UserId>,
    tenant_id: Option<TenantId>,
}

/// Credentials held in memory, replaceable at runtime.
///
/// Login code calls [`MemoryCredentials::set`]; the connection manager reads
/// through [`CredentialSource`] and clears it on detected expiry.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    stored: RwLock<Stored>,
}

impl MemoryCredentials {
    /// Creates an empty store.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding a logged-in identity.
    #[must_use]
    pub fn with_identity(
        token: impl Into<String>,
        user_id: impl Into<String>,
        tenant_id: Option<TenantId>,
    ) -> Self {
        let store = Self::new();
        store.set(token, user_id, tenant_id);
        store
    }

    /// Replaces the stored identity.
    pub fn set(
        &self,
        token: impl Into<String>,
        user_id: impl Into<String>,
        tenant_id: Option<TenantId>,
    ) {
        let mut stored = self.stored.write();
        stored.token = Some(token.into());
        stored.user_id = Some(UserId::new(user_id));
        stored.tenant_id = tenant_id;
    }

    /// Replaces only the token (refresh).
    pub fn set_token(&self, token: impl Into<String>) {
        self.stored.write().token = Some(token.into());
    }
}

impl CredentialSource for MemoryCredentials {
    fn token(&self) -> Option<String> {
        self.stored.read().token.clone()
    }

    fn user_id(&self) -> Option<UserId> {
        self.stored.read().user_id.clone()
    }

    fn tenant_id(&self) -> Option<TenantId> {
        self.stored.read().tenant_id.clone()
    }

    fn clear(&self) {
        *self.stored.write() = Stored::default();
        debug!("Credentials cleared");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store() {
        let store = MemoryCredentials::new();
        assert!(store.token().is_none());
        assert!(store.user_id().is_none());
        assert!(store.tenant_id().is_none());
    }

    #[test]
    fn test_set_and_clear() {
        let store = MemoryCredentials::with_identity("tok", "3", Some(TenantId::from(7)));
        assert_eq!(store.token().as_deref(), Some("tok"));
        assert_eq!(store.user_id(), Some(UserId::new("3")));
        assert_eq!(store.tenant_id(), Some(TenantId::from(7)));

        store.clear();
        assert!(store.token().is_none());
        assert!(store.user_id().is_none());
    }

    #[test]
    fn test_set_token_keeps_identity() {
        let store = MemoryCredentials::with_identity("old", "3", None);
        store.set_token("new");
        assert_eq!(store.token().as_deref(), Some("new"));
        assert_eq!(store.user_id(), Some(UserId::new("3")));
    }
}
