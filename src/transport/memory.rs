//! In-process transport.
//!
//! Records outbound frames and lets the caller play the server: inject
//! lifecycle events and domain events directly into the listener table.
//! Used by the test suite and by embedders that bridge another channel.
//!
//! # Example
//!
//! ```ignore
//! let factory = Arc::new(MemoryTransportFactory::new());
//! // ... build a manager with this factory, request a session ...
//! let transport = factory.last().expect("transport opened");
//! transport.simulate_connect();
//! transport.server_emit(&EventName::Ready, vec![]);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::error::Result;
use crate::identifiers::ListenerId;
use crate::protocol::{DisconnectReason, EventName, Frame};

use super::{ConnectOptions, Listener, ListenerTable, Transport, TransportFactory, TransportState};

// ============================================================================
// MemoryTransport
// ============================================================================

/// Transport whose "server" is the calling code.
pub struct MemoryTransport {
    options: ConnectOptions,
    listeners: ListenerTable,
    state: Mutex<TransportState>,
    query: Mutex<BTreeMap<String, String>>,
    sent: Mutex<Vec<Frame>>,
    closed: AtomicBool,
}

impl MemoryTransport {
    /// Creates a disconnected transport.
    #[must_use]
    pub fn new(options: ConnectOptions) -> Self {
        let query = options.query.clone();
        Self {
            options,
            listeners: ListenerTable::new(),
            state: Mutex::new(TransportState::Connecting),
            query: Mutex::new(query),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Options the transport was opened with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Marks the link up and delivers `connect`.
    pub fn simulate_connect(&self) {
        *self.state.lock() = TransportState::Connected;
        self.listeners.dispatch(&EventName::Connect, &[]);
    }

    /// Marks the link down and delivers `disconnect` with `reason`.
    pub fn simulate_disconnect(&self, reason: &DisconnectReason) {
        *self.state.lock() = TransportState::Disconnected;
        self.listeners
            .dispatch(&EventName::Disconnect, &[json!(reason.as_str())]);
    }

    /// Delivers `reconnect_attempt` with the attempt number.
    pub fn simulate_reconnect_attempt(&self, attempt: u32) {
        *self.state.lock() = TransportState::Connecting;
        self.listeners
            .dispatch(&EventName::ReconnectAttempt, &[json!(attempt)]);
    }

    /// Gives up reconnecting, as a transport does after its last attempt.
    ///
    /// No event is delivered; the transport just stops.
    pub fn simulate_exhausted(&self) {
        self.closed.store(true, Ordering::SeqCst);
        *self.state.lock() = TransportState::Closed;
        debug!("Memory transport gave up reconnecting");
    }

    /// Delivers an event as if the server sent it. Returns listeners invoked.
    pub fn server_emit(&self, event: &EventName, args: Vec<Value>) -> usize {
        if self.is_closed() {
            trace!(event = %event, "Closed transport ignores server event");
            return 0;
        }
        self.listeners.dispatch(event, &args)
    }

    /// Frames emitted so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<Frame> {
        self.sent.lock().clone()
    }

    /// Current query parameters.
    #[must_use]
    pub fn query(&self) -> BTreeMap<String, String> {
        self.query.lock().clone()
    }

    /// Returns `true` once `close()` was called.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Listeners attached for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &EventName) -> usize {
        self.listeners.count(event)
    }

    /// Listeners attached across all events.
    #[must_use]
    pub fn total_listeners(&self) -> usize {
        self.listeners.total()
    }
}

impl Transport for MemoryTransport {
    fn state(&self) -> TransportState {
        *self.state.lock()
    }

    fn on(&self, event: &EventName, listener: Listener) {
        self.listeners.attach(event, listener);
    }

    fn off(&self, event: &EventName, id: ListenerId) {
        self.listeners.detach(event, id);
    }

    fn emit(&self, event: &EventName, args: Vec<Value>) {
        if self.is_closed() {
            trace!(event = %event, "Emit on closed transport dropped");
            return;
        }
        self.sent.lock().push(Frame::new(event, args));
    }

    fn remove_all_listeners(&self) {
        self.listeners.clear();
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let was_connected = {
            let mut state = self.state.lock();
            let was = *state == TransportState::Connected;
            *state = TransportState::Closed;
            was
        };
        if was_connected {
            self.listeners.dispatch(
                &EventName::Disconnect,
                &[json!(DisconnectReason::ClientDisconnect.as_str())],
            );
        }
        debug!("Memory transport closed");
    }

    fn set_query(&self, key: &str, value: &str) {
        self.query.lock().insert(key.to_string(), value.to_string());
    }
}

// ============================================================================
// MemoryTransportFactory
// ============================================================================

/// Factory remembering every transport it opened.
#[derive(Default)]
pub struct MemoryTransportFactory {
    created: Mutex<Vec<Arc<MemoryTransport>>>,
}

impl MemoryTransportFactory {
    /// Creates a factory.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transports opened so far.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }

    /// Most recently opened transport.
    #[must_use]
    pub fn last(&self) -> Option<Arc<MemoryTransport>> {
        self.created.lock().last().cloned()
    }

    /// Every transport opened so far, oldest first.
    #[must_use]
    pub fn transports(&self) -> Vec<Arc<MemoryTransport>> {
        self.created.lock().clone()
    }
}

impl TransportFactory for MemoryTransportFactory {
    fn connect(&self, options: &ConnectOptions) -> Result<Arc<dyn Transport>> {
        options.validate()?;
        let transport = Arc::new(MemoryTransport::new(options.clone()));
        self.created.lock().push(Arc::clone(&transport));
        debug!(endpoint = %options.endpoint, "Memory transport opened");
        Ok(transport)
    }
}

// ============================================================================
// Tests
// ============================================================================
