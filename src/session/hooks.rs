//! Application side effects triggered by the manager.

use tracing::info;

/// Navigation hooks the host application provides.
///
/// Called from transport event callbacks or a timer task; implementations
/// must not block.
pub trait SessionHooks: Send + Sync {
    /// Full reload, scheduled after an expired token is detected on a
    /// session request.
    fn reload(&self);

    /// Leave for the login entry point after credentials were cleared.
    fn redirect_to_login(&self, path: &str);
}

/// Hooks that only log.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl SessionHooks for NoopHooks {
    fn reload(&self) {
        info!("Reload requested");
    }

    fn redirect_to_login(&self, path: &str) {
        info!(path, "Login redirect requested");
    }
}
