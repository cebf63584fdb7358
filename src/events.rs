//! Subscriber lists for the three monitor event streams.
//!
//! Handlers run synchronously on the polling task, in registration order.
//! A panicking handler is caught and logged; it cannot abort the poll or
//! starve the handlers registered after it.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use crate::transition::BuildTransition;

/// Fired exactly once at the end of every poll, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollCompleted {
    pub project: String,
    pub connected: bool,
}

/// Fired when a build starts or completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOccurred {
    pub project: String,
    pub transition: BuildTransition,
}

/// Fired when the server publishes a new non-empty message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageReceived {
    pub project: String,
    pub message: String,
}

/// Handle returned by [`Observers::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Handler<M, E> = Arc<dyn Fn(&M, &E) + Send + Sync>;

/// Registered handlers for one event stream. `M` is the source passed to
/// every handler alongside the event.
pub struct Observers<M: ?Sized, E> {
    handlers: Mutex<Vec<(SubscriptionId, Handler<M, E>)>>,
}

impl<M: ?Sized, E> Default for Observers<M, E> {
    fn default() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
        }
    }
}

impl<M: ?Sized, E> fmt::Debug for Observers<M, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("subscribers", &self.len())
            .finish()
    }
}

impl<M: ?Sized, E> Observers<M, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<H>(&self, handler: H) -> SubscriptionId
    where
        H: Fn(&M, &E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        let handler: Handler<M, E> = Arc::new(handler);
        self.lock().push((id, handler));
        id
    }

    /// Returns `false` if the id was not (or no longer) registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.lock();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every handler in registration order and return how many
    /// panicked. The list is copied first, so handlers may subscribe or
    /// unsubscribe while being notified.
    pub fn emit(&self, source: &M, event: &E) -> usize {
        let handlers: Vec<_> = self.lock().iter().map(|(id, h)| (*id, h.clone())).collect();

        let mut failures = 0;
        for (id, handler) in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(source, event))).is_err() {
                failures += 1;
                error!(subscription = %id, "event handler panicked");
            }
        }
        failures
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Handler<M, E>)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
