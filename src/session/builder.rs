//! Builder pattern for manager configuration.
//!
//! Provides a fluent API for wiring a [`ConnectionManager`] to its
//! collaborators.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tenant_session_mux::{ConnectionManager, MemoryCredentials};
//!
//! let credentials = Arc::new(MemoryCredentials::with_identity(token, "3", None));
//! let manager = ConnectionManager::builder()
//!     .endpoint("wss://rt.example.com/socket")
//!     .credentials(credentials)
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::credentials::CredentialSource;
use crate::error::{Error, Result};
use crate::transport::{TransportFactory, WsTransportFactory};

use super::hooks::{NoopHooks, SessionHooks};
use super::manager::ConnectionManager;
use super::options::ManagerOptions;

// ============================================================================
// ManagerBuilder
// ============================================================================

/// Builder for configuring a [`ConnectionManager`].
///
/// Use [`ConnectionManager::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ManagerBuilder {
    options: ManagerOptions,
    credentials: Option<Arc<dyn CredentialSource>>,
    factory: Option<Arc<dyn TransportFactory>>,
    hooks: Option<Arc<dyn SessionHooks>>,
}

impl fmt::Debug for ManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerBuilder")
            .field("options", &self.options)
            .field("credentials", &self.credentials.is_some())
            .field("factory", &self.factory.is_some())
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

// ============================================================================
// ManagerBuilder Implementation
// ============================================================================

impl ManagerBuilder {
    /// Creates a builder with default options and no collaborators.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the realtime server endpoint.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - `ws://` or `wss://` URL
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.options.endpoint = endpoint.into();
        self
    }

    /// Replaces all options at once.
    ///
    /// Overrides earlier calls to [`ManagerBuilder::endpoint`] and friends.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ManagerOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the delay before the forced reload on an expired token.
    #[inline]
    #[must_use]
    pub fn reload_delay(mut self, delay: Duration) -> Self {
        self.options.reload_delay = delay;
        self
    }

    /// Sets the login entry point used after credentials are cleared.
    #[inline]
    #[must_use]
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.options.login_path = path.into();
        self
    }

    /// Sets the credential source. Required.
    #[inline]
    #[must_use]
    pub fn credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the transport factory. Defaults to [`WsTransportFactory`].
    #[inline]
    #[must_use]
    pub fn transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Sets the navigation hooks. Defaults to [`NoopHooks`].
    #[inline]
    #[must_use]
    pub fn hooks(mut self, hooks: Arc<dyn SessionHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Builds the manager with validation.
    ///
    /// No connection is opened until the first session request.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no credential source is set
    /// - [`Error::Config`] or [`Error::Url`] if the options are invalid
    pub fn build(self) -> Result<ConnectionManager> {
        self.options.validate()?;

        let credentials = self.credentials.ok_or_else(|| {
            Error::config(
                "Credential source is required. Use .credentials() to set it.\n\
                 Example: ConnectionManager::builder().credentials(Arc::new(MemoryCredentials::new()))",
            )
        })?;
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(WsTransportFactory) as Arc<dyn TransportFactory>);
        let hooks = self
            .hooks
            .unwrap_or_else(|| Arc::new(NoopHooks) as Arc<dyn SessionHooks>);

        Ok(ConnectionManager::new(self.options, credentials, factory, hooks))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::credentials::MemoryCredentials;

    fn credentials() -> Arc<dyn CredentialSource> {
        Arc::new(MemoryCredentials::new())
    }

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = ManagerBuilder::new();
        assert!(builder.credentials.is_none());
        assert!(builder.factory.is_none());
        assert!(builder.hooks.is_none());
        assert!(builder.options.endpoint.is_empty());
    }

    #[test]
    fn test_setters() {
        let builder = ManagerBuilder::new()
            .endpoint("wss://rt.example.com")
            .reload_delay(Duration::from_millis(5))
            .login_path("/auth");
        assert_eq!(builder.options.endpoint, "wss://rt.example.com");
        assert_eq!(builder.options.reload_delay, Duration::from_millis(5));
        assert_eq!(builder.options.login_path, "/auth");
    }

    #[test]
    fn test_build_fails_without_credentials() {
        let result = ManagerBuilder::new().endpoint("wss://rt.example.com").build();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Credential"));
    }

    #[test]
    fn test_build_fails_without_endpoint() {
        let result = ManagerBuilder::new().credentials(credentials()).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_build_uses_defaults() {
        let manager = ManagerBuilder::new()
            .endpoint("wss://rt.example.com")
            .credentials(credentials())
            .build()
            .expect("build");
        assert!(!manager.is_ready());
        assert!(manager.active_identity().is_none());
        assert!(manager.transport_state().is_none());
    }

    #[test]
    fn test_options_override() {
        let options = ManagerOptions::new()
            .with_endpoint("ws://127.0.0.1:9")
            .with_login_path("/signin");
        let builder = ManagerBuilder::new().endpoint("ignored").options(options.clone());
        assert_eq!(builder.options, options);
    }
}
