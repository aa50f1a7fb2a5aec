//! Event fan-out to local subscribers.
//!
//! Subscribers are notified in registration order. Synchronous callbacks run
//! inline on the dispatching task. Asynchronous callbacks are fed through a
//! per-subscriber queue drained by its own worker task, so each subscriber sees
//! events in arrival order without stalling the dispatcher or other subscribers.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use mass_core::{EventType, MassEvent};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Callback invoked inline with a borrowed event.
pub type SyncCallback = Arc<dyn Fn(&MassEvent) + Send + Sync>;

/// Callback returning a future; run on the subscriber's worker task.
pub type AsyncCallback = Arc<dyn Fn(MassEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// A subscriber's notification routine.
#[derive(Clone)]
pub enum EventCallback {
    /// Invoked synchronously during dispatch.
    Sync(SyncCallback),
    /// Scheduled on a dedicated, ordered worker.
    Async(AsyncCallback),
}

impl EventCallback {
    /// Wrap a plain closure.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&MassEvent) + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Wrap a closure returning a future.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(MassEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::Async(Arc::new(move |event| Box::pin(f(event))))
    }
}

impl fmt::Debug for EventCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("EventCallback::Sync"),
            Self::Async(_) => f.write_str("EventCallback::Async"),
        }
    }
}

/// Which events a subscriber wants.
///
/// An unset dimension matches everything. A set object-id filter never
/// matches an event without an object id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventFilter {
    events: Option<HashSet<EventType>>,
    ids: Option<HashSet<String>>,
}

impl EventFilter {
    /// Match every event.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to the given event types.
    #[must_use]
    pub fn events(mut self, events: impl IntoIterator<Item = EventType>) -> Self {
        self.events = Some(events.into_iter().collect());
        self
    }

    /// Restrict to the given object ids.
    #[must_use]
    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Whether `event` passes both dimensions.
    pub fn matches(&self, event: &MassEvent) -> bool {
        if let Some(events) = &self.events {
            if !events.contains(&event.event) {
                return false;
            }
        }
        match (&self.ids, &event.object_id) {
            (None, _) => true,
            (Some(ids), Some(id)) => ids.contains(id),
            (Some(_), None) => false,
        }
    }
}

/// Unstarted worker state for an async subscriber.
type IdleWorker = (mpsc::UnboundedReceiver<MassEvent>, AsyncCallback);

enum Delivery {
    Inline(SyncCallback),
    Queued {
        tx: mpsc::UnboundedSender<MassEvent>,
        idle: Mutex<Option<IdleWorker>>,
    },
}

struct Subscriber {
    id: u64,
    filter: EventFilter,
    delivery: Delivery,
}

impl Subscriber {
    fn deliver(&self, event: &MassEvent) {
        match &self.delivery {
            Delivery::Inline(callback) => callback(event),
            Delivery::Queued { tx, idle } => {
                if idle.lock().is_some() {
                    start_worker(self.id, idle);
                }
                if tx.send(event.clone()).is_err() {
                    debug!(subscriber = self.id, "subscriber worker gone, event dropped");
                }
            }
        }
    }
}

fn start_worker(subscriber: u64, idle: &Mutex<Option<IdleWorker>>) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        warn!(subscriber, "no runtime to run async subscriber, events stay queued");
        return;
    };
    let Some((mut rx, callback)) = idle.lock().take() else {
        return;
    };
    drop(handle.spawn(async move {
        while let Some(event) = rx.recv().await {
            callback(event).await;
        }
        debug!(subscriber, "subscriber worker finished");
    }));
}

/// Routes incoming events to subscribers.
pub struct EventRouter {
    subscribers: RwLock<Vec<Arc<Subscriber>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl EventRouter {
    /// Router with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Add a subscriber. The returned handle removes it again.
    ///
    /// Subscribing after [`close`](Self::close) is allowed but the callback
    /// will never fire.
    pub fn subscribe(self: &Arc<Self>, callback: EventCallback, filter: EventFilter) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let delivery = match callback {
            EventCallback::Sync(f) => Delivery::Inline(f),
            EventCallback::Async(f) => {
                let (tx, rx) = mpsc::unbounded_channel();
                Delivery::Queued {
                    tx,
                    idle: Mutex::new(Some((rx, f))),
                }
            }
        };
        self.subscribers.write().push(Arc::new(Subscriber {
            id,
            filter,
            delivery,
        }));
        debug!(subscriber = id, "subscriber added");
        SubscriptionHandle {
            id,
            router: Arc::downgrade(self),
        }
    }

    /// Remove subscriber `id`. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        let removed = subscribers.len() != before;
        if removed {
            debug!(subscriber = id, "subscriber removed");
        }
        removed
    }

    /// Deliver `event` to every matching subscriber.
    ///
    /// Works on a snapshot, so callbacks may subscribe or unsubscribe freely.
    /// A no-op once the router is closed. Returns the number of subscribers
    /// the event was delivered to.
    pub fn dispatch(&self, event: &MassEvent) -> usize {
        if self.is_closed() {
            return 0;
        }
        let snapshot: Vec<Arc<Subscriber>> = self.subscribers.read().clone();
        let mut delivered = 0;
        for subscriber in snapshot.iter().filter(|s| s.filter.matches(event)) {
            subscriber.deliver(event);
            delivered += 1;
        }
        delivered
    }

    /// Stop all further dispatch and drop every subscriber.
    ///
    /// Async workers finish the events already queued for them, then exit.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let dropped = std::mem::take(&mut *self.subscribers.write());
            debug!(subscribers = dropped.len(), "event router closed");
        }
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes its subscription on [`unsubscribe`](Self::unsubscribe).
///
/// Dropping the handle leaves the subscription in place.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: u64,
    router: Weak<EventRouter>,
}

impl SubscriptionHandle {
    /// Subscriber id within its router.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the subscription. Returns `false` if it was already gone or
    /// the router no longer exists.
    pub fn unsubscribe(self) -> bool {
        self.router
            .upgrade()
            .is_some_and(|router| router.unsubscribe(self.id))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
