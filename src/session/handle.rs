//! Session handles.
//!
//! A [`SessionHandle`] is what a consumer (a widget, a counter, a list
//! refresher) holds. It attaches listeners and sends events on the shared
//! transport without knowing anything about connection lifecycle.
//!
//! Every registration is also recorded in the handle's own registry. After
//! a reconnect the manager replays all registries onto the transport, so
//! consumers never re-subscribe by hand.
//!
//! # Example
//!
//! ```ignore
//! let session = manager.get_session("7");
//! let id = session.on("7-ticket", |args| println!("ticket changed: {args:?}"));
//! session.emit("7-ticket-seen", vec![json!({ "id": 42 })]);
//! session.off("7-ticket", id);
//! session.disconnect();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::identifiers::{HandleId, ListenerId, TenantId};
use crate::protocol::EventName;
use crate::transport::{Listener, Transport};

// ============================================================================
// HandleInner
// ============================================================================

/// Shared state of a live handle.
pub(crate) struct HandleInner {
    id: HandleId,
    tenant_id: TenantId,
    transport: Arc<dyn Transport>,
    /// Registered listeners in registration order. Source of truth for replay.
    registry: Mutex<Vec<(EventName, Listener)>>,
}

impl HandleInner {
    /// Re-attaches every registered listener. Returns how many were replayed.
    ///
    /// Attachment is idempotent per listener id, so replaying onto a
    /// transport that still holds the listeners causes no double delivery.
    pub(crate) fn replay(&self) -> usize {
        let registry = self.registry.lock();
        for (event, listener) in registry.iter() {
            self.transport.on(event, listener.clone());
        }
        registry.len()
    }
}

// ============================================================================
// LiveSession
// ============================================================================

/// Handle bound to a transport.
#[derive(Clone)]
pub struct LiveSession {
    inner: Arc<HandleInner>,
}

impl LiveSession {
    pub(crate) fn new(tenant_id: TenantId, transport: Arc<dyn Transport>) -> Self {
        let inner = Arc::new(HandleInner {
            id: HandleId::generate(),
            tenant_id,
            transport,
            registry: Mutex::new(Vec::new()),
        });
        debug!(handle = %inner.id, tenant_id = %inner.tenant_id, "Session handle created");
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<HandleInner> {
        Arc::downgrade(&self.inner)
    }

    /// Handle id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> HandleId {
        self.inner.id
    }

    /// Tenant this handle was requested for.
    #[inline]
    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        &self.inner.tenant_id
    }

    /// Returns `true` if both handles share one transport.
    #[must_use]
    pub fn shares_transport_with(&self, other: &LiveSession) -> bool {
        Arc::ptr_eq(&self.inner.transport, &other.inner.transport)
    }

    fn on(&self, event: EventName, listener: Listener) -> ListenerId {
        let id = listener.id();
        let mut registry = self.inner.registry.lock();
        // Attach now, without waiting for readiness: an early event is better
        // than a missed one.
        self.inner.transport.on(&event, listener.clone());
        registry.push((event, listener));
        id
    }

    fn off(&self, event: &EventName, id: ListenerId) {
        let mut registry = self.inner.registry.lock();
        self.inner.transport.off(event, id);
        registry.retain(|(e, l)| !(e == event && l.id() == id));
    }

    fn emit(&self, event: &EventName, args: Vec<Value>) {
        trace!(handle = %self.inner.id, event = %event, "Emit");
        self.inner.transport.emit(event, args);
    }

    fn disconnect(&self) {
        let mut registry = self.inner.registry.lock();
        for (event, listener) in registry.drain(..) {
            self.inner.transport.off(&event, listener.id());
        }
        debug!(handle = %self.inner.id, "Session handle released its listeners");
    }

    fn listener_count(&self) -> usize {
        self.inner.registry.lock().len()
    }
}

// ============================================================================
// SessionHandle
// ============================================================================

/// Per-consumer façade over the shared connection.
///
/// Every method is synchronous and infallible. An [`SessionHandle::Inert`]
/// handle (no credentials, expired token) accepts every call and does
/// nothing, so callers never need to check what they got.
#[derive(Clone)]
pub enum SessionHandle {
    /// Bound to the shared transport.
    Live(LiveSession),
    /// No connection can exist; every operation is a no-op.
    Inert,
}

impl SessionHandle {
    /// Returns `true` for the no-op handle.
    #[inline]
    #[must_use]
    pub fn is_inert(&self) -> bool {
        matches!(self, Self::Inert)
    }

    /// Returns the live session, if any.
    #[inline]
    #[must_use]
    pub fn as_live(&self) -> Option<&LiveSession> {
        match self {
            Self::Live(live) => Some(live),
            Self::Inert => None,
        }
    }

    /// Registers a callback for `event`.
    ///
    /// Attaches to the transport immediately and records the callback for
    /// replay after every future reconnect. Returns the id to pass to
    /// [`SessionHandle::off`].
    pub fn on<F>(&self, event: impl Into<EventName>, callback: F) -> ListenerId
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let listener = Listener::new(callback);
        match self {
            Self::Live(live) => live.on(event.into(), listener),
            Self::Inert => listener.id(),
        }
    }

    /// Registers an existing listener's callback for `event`.
    ///
    /// Each registration gets its own id, so one listener shared between
    /// handles is released independently by each. Pass the returned id,
    /// not `listener.id()`, to [`SessionHandle::off`].
    pub fn on_listener(&self, event: impl Into<EventName>, listener: &Listener) -> ListenerId {
        let listener = listener.rebind();
        match self {
            Self::Live(live) => live.on(event.into(), listener),
            Self::Inert => listener.id(),
        }
    }

    /// Detaches a callback and drops it from the replay registry.
    pub fn off(&self, event: impl Into<EventName>, id: ListenerId) {
        if let Self::Live(live) = self {
            live.off(&event.into(), id);
        }
    }

    /// Sends an event on the shared transport, without waiting for readiness.
    pub fn emit(&self, event: impl Into<EventName>, args: Vec<Value>) {
        if let Self::Live(live) = self {
            live.emit(&event.into(), args);
        }
    }

    /// Releases this handle's listeners.
    ///
    /// Only this handle's attachments are removed. The shared transport
    /// stays open for sibling handles.
    pub fn disconnect(&self) {
        if let Self::Live(live) = self {
            live.disconnect();
        }
    }

    /// Number of listeners recorded for replay.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        match self {
            Self::Live(live) => live.listener_count(),
            Self::Inert => 0,
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live(live) => f
                .debug_struct("SessionHandle::Live")
                .field("id", &live.inner.id)
                .field("tenant_id", &live.inner.tenant_id)
                .field("listeners", &live.listener_count())
                .finish_non_exhaustive(),
            Self::Inert => f.write_str("SessionHandle::Inert"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::transport::{ConnectOptions, MemoryTransport};

    fn transport() -> Arc<MemoryTransport> {
        Arc::new(MemoryTransport::new(ConnectOptions::new("ws://127.0.0.1:9")))
    }

    fn handle(transport: &Arc<MemoryTransport>) -> SessionHandle {
        let transport: Arc<dyn Transport> = Arc::clone(transport) as Arc<dyn Transport>;
        SessionHandle::Live(LiveSession::new(TenantId::from(7), transport))
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&[Value]) + Send + Sync + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        (hits, move |_: &[Value]| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_on_attaches_before_ready() {
        let transport = transport();
        let session = handle(&transport);
        let (hits, callback) = counter();

        session.on("7-ticket", callback);
        assert_eq!(transport.listener_count(&EventName::from("7-ticket")), 1);

        transport.server_emit(&EventName::from("7-ticket"), vec![json!(1)]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(session.listener_count(), 1);
    }

    #[test]
    fn test_off_detaches_and_forgets() {
        let transport = transport();
        let session = handle(&transport);
        let (hits, callback) = counter();

        let id = session.on("7-ticket", callback);
        session.off("7-ticket", id);

        assert_eq!(session.listener_count(), 0);
        assert_eq!(transport.server_emit(&EventName::from("7-ticket"), vec![]), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_off_wrong_event_keeps_listener() {
        let transport = transport();
        let session = handle(&transport);
        let (_, callback) = counter();

        let id = session.on("7-ticket", callback);
        session.off("7-counter", id);
        assert_eq!(session.listener_count(), 1);
    }

    #[test]
    fn test_emit_is_immediate_and_fifo() {
        let transport = transport();
        let session = handle(&transport);

        session.emit("7-a", vec![json!(1)]);
        session.emit("7-b", vec![json!(2)]);
        session.emit("7-c", vec![json!(3)]);

        let events: Vec<_> = transport.sent().into_iter().map(|f| f.event).collect();
        assert_eq!(events, vec!["7-a", "7-b", "7-c"]);
    }

    #[test]
    fn test_replay_is_idempotent() {
        let transport = transport();
        let session = handle(&transport);
        let (hits, callback) = counter();
        session.on("7-ticket", callback);

        let Some(live) = session.as_live() else {
            panic!("live handle expected");
        };
        assert_eq!(live.inner.replay(), 1);
        assert_eq!(live.inner.replay(), 1);

        transport.server_emit(&EventName::from("7-ticket"), vec![]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disconnect_spares_siblings() {
        let transport = transport();
        let first = handle(&transport);
        let second = handle(&transport);
        let (first_hits, first_cb) = counter();
        let (second_hits, second_cb) = counter();

        first.on("7-ticket", first_cb);
        second.on("7-ticket", second_cb);
        first.disconnect();

        transport.server_emit(&EventName::from("7-ticket"), vec![]);
        assert_eq!(first_hits.load(Ordering::SeqCst), 0);
        assert_eq!(second_hits.load(Ordering::SeqCst), 1);
        assert!(!transport.is_closed());
        assert_eq!(first.listener_count(), 0);
    }

    #[test]
    fn test_shared_listener_released_per_handle() {
        let transport = transport();
        let first = handle(&transport);
        let second = handle(&transport);
        let (hits, callback) = counter();
        let shared = Listener::new(callback);

        let first_id = first.on_listener("7-ticket", &shared);
        let second_id = second.on_listener("7-ticket", &shared);
        assert_ne!(first_id, second_id);
        assert_ne!(first_id, shared.id());

        first.disconnect();
        transport.server_emit(&EventName::from("7-ticket"), vec![]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        second.off("7-ticket", second_id);
        assert_eq!(transport.server_emit(&EventName::from("7-ticket"), vec![]), 0);
    }

    #[test]
    fn test_inert_handle_is_a_no_op() {
        let session = SessionHandle::Inert;
        let (hits, callback) = counter();

        let id = session.on("7-ticket", callback);
        session.emit("7-ticket", vec![json!(1)]);
        session.off("7-ticket", id);
        session.disconnect();

        assert!(session.is_inert());
        assert!(session.as_live().is_none());
        assert_eq!(session.listener_count(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_shares_transport() {
        let transport = transport();
        let a = handle(&transport);
        let b = handle(&transport);
        let c = handle(&self::transport());
        let (a, b, c) = (
            a.as_live().expect("live").clone(),
            b.as_live().expect("live").clone(),
            c.as_live().expect("live").clone(),
        );
        assert!(a.shares_transport_with(&b));
        assert!(!a.shares_transport_with(&c));
        assert_ne!(a.id(), b.id());
    }
}
