//! Listener table shared by all transports.
//!
//! Maps each event name to an ordered list of listeners. Attaching a
//! listener whose id is already present for that event is a no-op, which
//! makes replay after reconnect idempotent.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::trace;

use crate::identifiers::ListenerId;
use crate::protocol::EventName;

// ============================================================================
// Types
// ============================================================================

/// Callback invoked with the event's arguments.
pub type Callback = Arc<dyn Fn(&[Value]) + Send + Sync>;

// ============================================================================
// Listener
// ============================================================================

/// A callback with a stable identity.
#[derive(Clone)]
pub struct Listener {
    id: ListenerId,
    callback: Callback,
}

impl Listener {
    /// Wraps a closure under a fresh id.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        Self {
            id: ListenerId::next(),
            callback: Arc::new(callback),
        }
    }

    /// Same callback under a fresh id.
    #[must_use]
    pub fn rebind(&self) -> Self {
        Self {
            id: ListenerId::next(),
            callback: Arc::clone(&self.callback),
        }
    }

    /// Returns the listener id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Invokes the callback.
    #[inline]
    pub fn call(&self, args: &[Value]) {
        (self.callback)(args);
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ListenerTable
// ============================================================================

/// Event name to listeners, in attach order.
#[derive(Default)]
pub struct ListenerTable {
    inner: Mutex<FxHashMap<EventName, Vec<Listener>>>,
}

impl ListenerTable {
    /// Creates an empty table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a listener. Returns `false` if it was already attached.
    pub fn attach(&self, event: &EventName, listener: Listener) -> bool {
        let mut inner = self.inner.lock();
        let list = inner.entry(event.clone()).or_default();
        if list.iter().any(|l| l.id == listener.id) {
            return false;
        }
        list.push(listener);
        true
    }

    /// Detaches a listener. Returns `false` if it was not attached.
    pub fn detach(&self, event: &EventName, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let Some(list) = inner.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| l.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            inner.remove(event);
        }
        removed
    }

    /// Removes every listener.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Invokes every listener for `event` in attach order.
    ///
    /// The list is cloned out of the lock first, so callbacks may attach,
    /// detach, or emit without deadlocking.
    pub fn dispatch(&self, event: &EventName, args: &[Value]) -> usize {
        let listeners = match self.inner.lock().get(event) {
            Some(list) => list.clone(),
            None => return 0,
        };

        trace!(event = %event, count = listeners.len(), "Dispatching event");

        for listener in &listeners {
            listener.call(args);
        }
        listeners.len()
    }

    /// Returns the number of listeners for `event`.
    #[must_use]
    pub fn count(&self, event: &EventName) -> usize {
        self.inner.lock().get(event).map_or(0, Vec::len)
    }

    /// Returns the number of listeners across all events.
    #[must_use]
    pub fn total(&self) -> usize {
        self.inner.lock().values().map(Vec::len).sum()
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

    fn counting() -> (Listener, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        let listener = Listener::new(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });
        (listener, hits)
    }

    #[test]
    fn test_attach_is_idempotent() {
        let table = ListenerTable::new();
        let event = EventName::from("7-ticket");
        let (listener, hits) = counting();

        assert!(table.attach(&event, listener.clone()));
        assert!(!table.attach(&event, listener));
        assert_eq!(table.count(&event), 1);

        table.dispatch(&event, &[json!(1)]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detach() {
        let table = ListenerTable::new();
        let event = EventName::from("7-ticket");
        let (listener, hits) = counting();

        table.attach(&event, listener.clone());
        assert!(table.detach(&event, listener.id()));
        assert!(!table.detach(&event, listener.id()));
        assert_eq!(table.dispatch(&event, &[]), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dispatch_order_and_args() {
        let table = ListenerTable::new();
        let event = EventName::Heartbeat;
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            table.attach(
                &event,
                Listener::new(move |args| seen.lock().push((tag, args.to_vec()))),
            );
        }

        table.dispatch(&event, &[json!({ "x": 1 })]);
        let seen = seen.lock();
        assert_eq!(
            seen.iter().map(|(t, _)| *t).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert!(seen.iter().all(|(_, args)| args == &vec![json!({ "x": 1 })]));
    }

    #[test]
    fn test_callback_may_detach_itself() {
        let table = Arc::new(ListenerTable::new());
        let event = EventName::Ready;
        let table_clone = Arc::clone(&table);
        let id_slot = Arc::new(Mutex::new(None));
        let id_slot_clone = Arc::clone(&id_slot);

        let listener = Listener::new(move |_| {
            if let Some(id) = *id_slot_clone.lock() {
                table_clone.detach(&EventName::Ready, id);
            }
        });
        *id_slot.lock() = Some(listener.id());
        table.attach(&event, listener);

        assert_eq!(table.dispatch(&event, &[]), 1);
        assert_eq!(table.count(&event), 0);
    }

    #[test]
    fn test_clear_and_total() {
        let table = ListenerTable::new();
        table.attach(&EventName::Connect, counting().0);
        table.attach(&EventName::Ready, counting().0);
        table.attach(&EventName::Ready, counting().0);
        assert_eq!(table.total(), 3);
        table.clear();
        assert_eq!(table.total(), 0);
    }
}
