//! Multicast subscriber registry
//!
//! Each of the interceptor's three streams is an [`EventChannel`]. Handlers
//! run synchronously on the hook thread in the order they subscribed.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use crate::events::KeyEvent;

type Handler = Arc<dyn Fn(&KeyEvent) + Send + Sync>;

/// Token returned by [`EventChannel::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered list of handlers for one event stream
pub struct EventChannel {
    name: &'static str,
    next_id: AtomicU64,
    handlers: Mutex<Vec<(SubscriptionId, Handler)>>,
}

impl EventChannel {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: AtomicU64::new(1),
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&KeyEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.lock().push((id, Arc::new(handler)));
        id
    }

    /// Returns false if the id was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Invoke every handler with `event`.
    ///
    /// The list is snapshotted first so handlers may subscribe or
    /// unsubscribe. A panicking handler is logged and skipped; the rest
    /// still run. Returns the number of handlers that panicked.
    pub fn dispatch(&self, event: &KeyEvent) -> usize {
        let snapshot: Vec<(SubscriptionId, Handler)> = self.handlers.lock().clone();
        let mut faults = 0;

        for (id, handler) in snapshot {
            let result = panic::catch_unwind(AssertUnwindSafe(|| handler(event)));
            if let Err(payload) = result {
                faults += 1;
                error!(
                    channel = self.name,
                    subscription = id.0,
                    panic = panic_message(&*payload),
                    "key event subscriber panicked"
                );
            }
        }

        faults
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
