//! Connection manager.
//!
//! Owns at most one transport per process, keyed by the active
//! (tenant, user) identity, and hands out [`SessionHandle`]s multiplexed
//! over it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              ConnectionManager               │
//! │  identity (tenant, user) ── dyn Transport    │
//! │  ReadinessGate        ── lifecycle wiring    │
//! │  ┌────────────┐ ┌────────────┐ ┌──────────┐  │
//! │  │ handle #1  │ │ handle #2  │ │ handle … │  │
//! │  │ registry   │ │ registry   │ │ registry │  │
//! │  └────────────┘ └────────────┘ └──────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Lifecycle Wiring
//!
//! | Event | Reaction |
//! |-------|----------|
//! | `connect` | readiness dropped, gate armed for `ready` |
//! | `ready` | gate ready, every live handle replayed, ready queue flushed |
//! | `disconnect` | readiness dropped; remote reasons re-check the token |
//! | `reconnect_attempt` | token re-checked and written into the query |
//! | `heartbeat` | echoed back verbatim |
//! | `connect_error` | logged |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::credentials::CredentialSource;
use crate::error::{Error, Result};
use crate::identifiers::{TenantId, UserId};
use crate::protocol::{DisconnectReason, EventName};
use crate::transport::{Listener, Transport, TransportFactory, TransportState};

use super::builder::ManagerBuilder;
use super::gate::ReadinessGate;
use super::handle::{HandleInner, LiveSession, SessionHandle};
use super::hooks::SessionHooks;
use super::options::ManagerOptions;

// ============================================================================
// Types
// ============================================================================

/// Deferred callback.
type Deferred = Box<dyn FnOnce() + Send>;

// ============================================================================
// ConnectionIdentity
// ============================================================================

/// Identity the active transport was opened for.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionIdentity {
    /// Tenant scope.
    pub tenant_id: TenantId,
    /// User.
    pub user_id: UserId,
    /// Token the transport was opened with.
    pub token: String,
}

impl ConnectionIdentity {
    /// Returns `true` if this identity serves `(tenant_id, user_id)`.
    ///
    /// The token is not compared: a refreshed token reuses the transport.
    #[inline]
    #[must_use]
    pub fn serves(&self, tenant_id: &TenantId, user_id: &UserId) -> bool {
        &self.tenant_id == tenant_id && &self.user_id == user_id
    }
}

impl fmt::Debug for ConnectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionIdentity")
            .field("tenant_id", &self.tenant_id)
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// PendingReady
// ============================================================================

/// Work held back until the gate reaches `Ready`.
enum PendingReady {
    Callback(Deferred),
    Emit(EventName, Vec<Value>),
}

// ============================================================================
// ManagerState
// ============================================================================

#[derive(Default)]
struct ManagerState {
    identity: Option<ConnectionIdentity>,
    transport: Option<Arc<dyn Transport>>,
    /// Bumped on every transport change; lifecycle callbacks from an older
    /// transport compare against it and bail out.
    generation: u64,
    gate: ReadinessGate,
    handles: Vec<Weak<HandleInner>>,
    ready_queue: Vec<PendingReady>,
    connect_queue: Vec<Deferred>,
}

impl ManagerState {
    /// Detaches everything from the current transport and forgets it.
    ///
    /// The transport is not closed: retired handles may still hold it.
    /// Queued emits belong to the retired identity and are dropped with it;
    /// deferred callbacks stay queued for the next connection.
    fn retire_transport(&mut self) -> Option<Arc<dyn Transport>> {
        let transport = self.transport.take()?;
        transport.remove_all_listeners();
        self.identity = None;
        self.generation += 1;
        self.gate = ReadinessGate::new();
        self.handles.clear();

        let queued = self.ready_queue.len();
        self.ready_queue
            .retain(|item| matches!(item, PendingReady::Callback(_)));
        if queued != self.ready_queue.len() {
            debug!(
                dropped = queued - self.ready_queue.len(),
                "Queued emits dropped with retired transport"
            );
        }
        Some(transport)
    }

    /// Live handles, pruning the ones callers dropped.
    fn live_handles(&mut self) -> Vec<Arc<HandleInner>> {
        let mut live = Vec::with_capacity(self.handles.len());
        self.handles.retain(|weak| match weak.upgrade() {
            Some(handle) => {
                live.push(handle);
                true
            }
            None => false,
        });
        live
    }
}

// ============================================================================
// ManagerInner
// ============================================================================

pub(crate) struct ManagerInner {
    options: ManagerOptions,
    credentials: Arc<dyn CredentialSource>,
    factory: Arc<dyn TransportFactory>,
    hooks: Arc<dyn SessionHooks>,
    state: Mutex<ManagerState>,
    /// Pending delayed reload, at most one.
    reload_task: Mutex<Option<JoinHandle<()>>>,
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Process-wide connection manager.
///
/// Construct one with [`ConnectionManager::builder`] and pass clones to
/// consumers. Clones share state.
///
/// # Example
///
/// ```ignore
/// let manager = ConnectionManager::builder()
///     .endpoint("wss://rt.example.com/socket")
///     .credentials(credentials)
///     .build()?;
///
/// let session = manager.get_session("7");
/// session.on("7-ticket", |args| refresh(args));
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.options.endpoint)
            .field("identity", &self.active_identity())
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionManager - Constructor
// ============================================================================

impl ConnectionManager {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }

    pub(crate) fn new(
        options: ManagerOptions,
        credentials: Arc<dyn CredentialSource>,
        factory: Arc<dyn TransportFactory>,
        hooks: Arc<dyn SessionHooks>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                options,
                credentials,
                factory,
                hooks,
                state: Mutex::new(ManagerState::default()),
                reload_task: Mutex::new(None),
            }),
        }
    }
}

// ============================================================================
// ConnectionManager - Public API
// ============================================================================

impl ConnectionManager {
    /// Returns a handle on the shared connection for `tenant_id`.
    ///
    /// Synchronous and infallible. Reuses the transport while the
    /// (tenant, user) identity is unchanged, rebuilds it when the identity
    /// changes, and returns [`SessionHandle::Inert`] when no authenticated
    /// connection can exist. An expired token also schedules a reload.
    pub fn get_session(&self, tenant_id: &str) -> SessionHandle {
        let error = match self.inner.try_session(tenant_id) {
            Ok(handle) => return handle,
            Err(error) => error,
        };

        if !error.is_auth_error() {
            warn!(error = %error, "Realtime session unavailable");
        } else if matches!(error, Error::AuthExpired) {
            warn!("Token expired, scheduling reload");
            ManagerInner::schedule_reload(&self.inner);
        } else {
            debug!("No credentials, returning inert session");
        }
        SessionHandle::Inert
    }

    /// Runs `callback` once the server has confirmed tenant scoping.
    ///
    /// Invoked immediately if already ready, otherwise on the next `ready`.
    pub fn on_ready<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        if state.gate.is_ready() {
            drop(state);
            callback();
        } else {
            state.ready_queue.push(PendingReady::Callback(Box::new(callback)));
        }
    }

    /// Runs `callback` once the physical connection is up.
    ///
    /// Invoked immediately if connected, otherwise on the next `connect`.
    pub fn on_connect<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        let connected = state
            .transport
            .as_ref()
            .is_some_and(|t| t.state() == TransportState::Connected);
        if connected {
            drop(state);
            callback();
        } else {
            state.connect_queue.push(Box::new(callback));
        }
    }

    /// Sends an event once the gate is ready, preserving call order.
    ///
    /// Unlike [`SessionHandle::emit`], which sends immediately, this holds
    /// the event in the manager's queue until the next `ready`.
    pub fn emit_when_ready(&self, event: impl Into<EventName>, args: Vec<Value>) {
        let event = event.into();
        let mut state = self.inner.state.lock();
        if state.gate.is_ready()
            && let Some(transport) = state.transport.clone()
        {
            drop(state);
            transport.emit(&event, args);
        } else {
            state.ready_queue.push(PendingReady::Emit(event, args));
        }
    }

    /// Closes the transport and resets all manager state.
    ///
    /// A reload scheduled by an expired token is cancelled as well.
    /// For deliberate logout only; never called automatically.
    pub fn teardown(&self) {
        self.inner.cancel_reload();
        let transport = {
            let mut state = self.inner.state.lock();
            let transport = state.retire_transport();
            state.ready_queue.clear();
            state.connect_queue.clear();
            transport
        };

        if let Some(transport) = transport {
            transport.close();
            info!("Realtime transport torn down");
        }
    }

    /// Returns `true` if the server confirmed tenant scoping on the current
    /// connection.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.state.lock().gate.is_ready()
    }

    /// Identity of the active transport.
    #[must_use]
    pub fn active_identity(&self) -> Option<ConnectionIdentity> {
        self.inner.state.lock().identity.clone()
    }

    /// State of the active transport.
    #[must_use]
    pub fn transport_state(&self) -> Option<TransportState> {
        self.inner.state.lock().transport.as_ref().map(|t| t.state())
    }

    /// Number of handles on the active transport still held by callers.
    #[must_use]
    pub fn live_handle_count(&self) -> usize {
        self.inner.state.lock().live_handles().len()
    }
}

// ============================================================================
// ManagerInner - Session Resolution
// ============================================================================

impl ManagerInner {
    fn try_session(self: &Arc<Self>, raw_tenant: &str) -> Result<SessionHandle> {
        // Held for the whole resolution so concurrent requests during a
        // rebuild open exactly one transport.
        let mut state = self.state.lock();

        let user_id = self.credentials.user_id();

        let tenant_id = match TenantId::normalize(raw_tenant) {
            Some(tenant_id) => tenant_id,
            None if state.transport.is_none() => return Err(Error::NoCredentials),
            None => self
                .credentials
                .tenant_id()
                .or_else(|| state.identity.as_ref().map(|i| i.tenant_id.clone()))
                .ok_or(Error::NoCredentials)?,
        };
        let user_id = user_id.ok_or(Error::NoCredentials)?;

        let unchanged = state
            .identity
            .as_ref()
            .is_some_and(|identity| identity.serves(&tenant_id, &user_id));
        let terminal = state
            .transport
            .as_ref()
            .is_some_and(|transport| transport.state().is_terminal());
        if terminal {
            state.retire_transport();
            info!(tenant_id = %tenant_id, "Previous transport closed, reopening");
        } else if !unchanged && state.retire_transport().is_some() {
            info!(tenant_id = %tenant_id, user_id = %user_id, "Identity changed, previous transport detached");
        }

        let token = self.credentials.token().ok_or(Error::NoCredentials)?;
        if self.credentials.is_expired(&token) {
            return Err(Error::AuthExpired);
        }

        let transport = match state.transport.clone() {
            Some(transport) => transport,
            None => self.open_transport(&mut state, tenant_id.clone(), user_id, token)?,
        };

        let session = LiveSession::new(tenant_id, transport);
        state.handles.push(session.downgrade());
        Ok(SessionHandle::Live(session))
    }

    fn open_transport(
        self: &Arc<Self>,
        state: &mut ManagerState,
        tenant_id: TenantId,
        user_id: UserId,
        token: String,
    ) -> Result<Arc<dyn Transport>> {
        let options = self.options.connect_options(&token);
        let transport = self.factory.connect(&options)?;

        state.generation += 1;
        state.gate = ReadinessGate::new();
        self.wire(&transport, state.generation);

        info!(
            tenant_id = %tenant_id,
            user_id = %user_id,
            endpoint = %self.options.endpoint,
            "Realtime transport opened"
        );

        state.identity = Some(ConnectionIdentity {
            tenant_id,
            user_id,
            token,
        });
        state.transport = Some(Arc::clone(&transport));
        Ok(transport)
    }

    fn schedule_reload(self: &Arc<Self>) {
        let mut reload_task = self.reload_task.lock();
        if reload_task.as_ref().is_some_and(|task| !task.is_finished()) {
            trace!("Reload already scheduled");
            return;
        }

        let delay = self.options.reload_delay;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let hooks = Arc::clone(&self.hooks);
                *reload_task = Some(runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    hooks.reload();
                }));
            }
            Err(_) => {
                drop(reload_task);
                warn!("No runtime to delay the reload, reloading now");
                self.hooks.reload();
            }
        }
    }

    fn cancel_reload(&self) {
        if let Some(task) = self.reload_task.lock().take()
            && !task.is_finished()
        {
            task.abort();
            debug!("Pending reload cancelled");
        }
    }
}

// ============================================================================
// ManagerInner - Lifecycle Wiring
// ============================================================================

impl ManagerInner {
    /// Attaches the manager's lifecycle listeners, once per transport.
    fn wire(self: &Arc<Self>, transport: &Arc<dyn Transport>, generation: u64) {
        let manager = Arc::downgrade(self);
        let link = Arc::downgrade(transport);

        transport.on(&EventName::Connect, {
            let manager = manager.clone();
            Listener::new(move |_| {
                if let Some(manager) = manager.upgrade() {
                    manager.handle_connect(generation);
                }
            })
        });

        transport.on(&EventName::Ready, {
            let manager = manager.clone();
            Listener::new(move |_| {
                if let Some(manager) = manager.upgrade() {
                    manager.handle_ready(generation);
                }
            })
        });

        transport.on(&EventName::Disconnect, {
            let manager = manager.clone();
            Listener::new(move |args| {
                if let Some(manager) = manager.upgrade() {
                    let reason = args
                        .first()
                        .and_then(Value::as_str)
                        .map(DisconnectReason::parse)
                        .unwrap_or(DisconnectReason::TransportClose);
                    manager.handle_disconnect(generation, &reason);
                }
            })
        });

        transport.on(&EventName::ReconnectAttempt, {
            let manager = manager.clone();
            let link = link.clone();
            Listener::new(move |args| {
                if let (Some(manager), Some(transport)) = (manager.upgrade(), link.upgrade()) {
                    let attempt = args.first().and_then(Value::as_u64).unwrap_or_default();
                    manager.handle_reconnect_attempt(generation, attempt, transport.as_ref());
                }
            })
        });

        transport.on(&EventName::Heartbeat, {
            let link = link.clone();
            Listener::new(move |args| {
                if let Some(transport) = link.upgrade() {
                    trace!("Heartbeat echoed");
                    transport.emit(&EventName::Heartbeat, args.to_vec());
                }
            })
        });

        transport.on(
            &EventName::Pong,
            Listener::new(|_| trace!("Pong received")),
        );

        transport.on(
            &EventName::ConnectError,
            Listener::new(|args| {
                let message = args.first().and_then(Value::as_str).unwrap_or("unknown");
                warn!(error = message, "Realtime connection error, transport will retry");
            }),
        );
    }

    fn handle_connect(&self, generation: u64) {
        let callbacks = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            state.gate.on_connect();
            std::mem::take(&mut state.connect_queue)
        };

        debug!(pending = callbacks.len(), "Transport connected, waiting for ready");
        for callback in callbacks {
            callback();
        }
    }

    fn handle_ready(&self, generation: u64) {
        let (pending, transport) = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            if !state.gate.on_ready() {
                debug!("Ready without a fresh connect, ignored");
                return;
            }

            let handles = state.live_handles();
            let replayed: usize = handles.iter().map(|handle| handle.replay()).sum();
            info!(handles = handles.len(), listeners = replayed, "Session ready, listeners replayed");

            (std::mem::take(&mut state.ready_queue), state.transport.clone())
        };

        for item in pending {
            match item {
                PendingReady::Callback(callback) => callback(),
                PendingReady::Emit(event, args) => {
                    if let Some(transport) = &transport {
                        transport.emit(&event, args);
                    }
                }
            }
        }
    }

    fn handle_disconnect(&self, generation: u64, reason: &DisconnectReason) {
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            state.gate.on_disconnect();
        }

        if reason.is_client_initiated() {
            debug!(reason = %reason, "Transport closed locally");
            return;
        }

        if self.token_is_stale() {
            warn!(reason = %reason, "Disconnected with an expired token");
            self.expire_credentials();
        } else {
            debug!(reason = %reason, "Disconnected, transport will reconnect");
        }
    }

    fn handle_reconnect_attempt(&self, generation: u64, attempt: u64, transport: &dyn Transport) {
        if self.state.lock().generation != generation {
            return;
        }

        match self.credentials.token() {
            Some(token) if !self.credentials.is_expired(&token) => {
                transport.set_query("token", &token);
                debug!(attempt, "Reconnect attempt with current token");
            }
            _ => {
                warn!(attempt, "Token expired before reconnect, aborting");
                {
                    let mut state = self.state.lock();
                    if state.generation == generation {
                        state.retire_transport();
                    }
                }
                transport.close();
                self.expire_credentials();
            }
        }
    }

    /// Absent or expired token.
    fn token_is_stale(&self) -> bool {
        self.credentials
            .token()
            .is_none_or(|token| self.credentials.is_expired(&token))
    }

    fn expire_credentials(&self) {
        self.credentials.clear();
        self.hooks.redirect_to_login(&self.options.login_path);
    }
}

// ============================================================================
// Tests
// ============================================================================
