// EventBus: priority-ordered publish/subscribe registry
//
// Single Responsibility: subscriber bookkeeping and synchronous dispatch
//
// Event names are colon-delimited strings (`domain:action`) so external
// producers can publish without sharing Rust types; `topics` layers typed
// payloads on top for in-crate producers and consumers.

use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::config::BusConfig;
use crate::engine::backend::ClockSource;

mod scoped;
pub mod topics;

pub use scoped::ScopedBus;
pub use topics::Topic;

/// Subscriber callback. An `Err` (or a panic) is logged and isolated.
pub type Callback = Arc<dyn Fn(&EventEnvelope) -> anyhow::Result<()> + Send + Sync>;

/// What subscribers receive for each publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    pub data: serde_json::Value,
    /// Seconds on the resource clock, or the caller-supplied timestamp
    pub timestamp: Option<f64>,
}

/// Dispatch counters. Diagnostics only; nothing else is retained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusStats {
    pub total_published: u64,
    pub per_event: BTreeMap<String, u64>,
    pub failed_dispatches: u64,
}

struct Subscriber {
    id: u64,
    callback: Callback,
    priority: i32,
}

#[derive(Default)]
struct Registry {
    buckets: HashMap<String, Vec<Subscriber>>,
    stats: BusStats,
}

struct BusInner {
    registry: Mutex<Registry>,
    clock: RwLock<Option<Arc<dyn ClockSource>>>,
    stamp_with_clock: bool,
    next_id: AtomicU64,
}

impl BusInner {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        // Callbacks never run under this lock, so poisoning can only come
        // from a panic in bookkeeping; the registry itself stays consistent.
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn remove_id(&self, event: &str, id: u64) -> bool {
        let mut registry = self.lock();
        let Some(bucket) = registry.buckets.get_mut(event) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|sub| sub.id != id);
        let removed = bucket.len() != before;
        if bucket.is_empty() {
            registry.buckets.remove(event);
        }
        removed
    }
}

/// Handle returned by `subscribe`; the only thing a consumer needs to detach.
#[derive(Debug, Clone)]
pub struct SubscriptionToken {
    bus: Weak<BusInner>,
    event: String,
    id: u64,
}

impl SubscriptionToken {
    /// Token for a rejected subscription; unsubscribing it does nothing.
    pub fn noop() -> Self {
        Self {
            bus: Weak::new(),
            event: String::new(),
            id: 0,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.id == 0
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// Remove the subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        match self.bus.upgrade() {
            Some(inner) if !self.is_noop() => inner.remove_id(&self.event, self.id),
            _ => false,
        }
    }
}

/// Cloneable handle to a shared subscriber registry.
///
/// Dispatch is synchronous: `publish` runs every subscriber on the calling
/// thread, highest priority first, and returns when all have finished.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_config(&BusConfig::default())
    }

    pub fn with_config(config: &BusConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                registry: Mutex::new(Registry::default()),
                clock: RwLock::new(None),
                stamp_with_clock: config.stamp_with_resource_clock,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Install (or clear) the clock used when `publish` gets no timestamp.
    pub fn set_clock(&self, clock: Option<Arc<dyn ClockSource>>) {
        match self.inner.clock.write() {
            Ok(mut guard) => *guard = clock,
            Err(poisoned) => *poisoned.into_inner() = clock,
        }
    }

    // ========================================================================
    // SUBSCRIPTION
    // ========================================================================

    /// Register `callback` for `event`.
    ///
    /// Higher priorities run first; equal priorities run in registration
    /// order. An empty event name is rejected with a warning and a no-op
    /// token.
    pub fn subscribe<F>(&self, event: &str, callback: F, priority: i32) -> SubscriptionToken
    where
        F: Fn(&EventEnvelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe_callback(event, Arc::new(callback), priority)
    }

    /// Like `subscribe`, keeping the caller's `Arc` so it can later be
    /// passed to `unsubscribe`.
    pub fn subscribe_callback(
        &self,
        event: &str,
        callback: Callback,
        priority: i32,
    ) -> SubscriptionToken {
        if !is_valid_event_name(event) {
            log::warn!("[EventBus] Rejected subscription to invalid event name {:?}", event);
            return SubscriptionToken::noop();
        }
        let id = self.next_id();
        self.register(event, id, callback, priority)
    }

    /// Subscribe for a single dispatch. The wrapper detaches itself before
    /// invoking `callback`, so ordering matches an ordinary subscription.
    pub fn once<F>(&self, event: &str, callback: F, priority: i32) -> SubscriptionToken
    where
        F: Fn(&EventEnvelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        if !is_valid_event_name(event) {
            log::warn!("[EventBus] Rejected once() on invalid event name {:?}", event);
            return SubscriptionToken::noop();
        }

        let id = self.next_id();
        let bus = Arc::downgrade(&self.inner);
        let name = event.to_string();
        let fired = AtomicBool::new(false);

        let wrapper = move |envelope: &EventEnvelope| -> anyhow::Result<()> {
            if fired.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            if let Some(inner) = bus.upgrade() {
                inner.remove_id(&name, id);
            }
            callback(envelope)
        };

        self.register(event, id, Arc::new(wrapper), priority)
    }

    /// Remove every registration of `callback` (compared by `Arc` identity).
    pub fn unsubscribe(&self, event: &str, callback: &Callback) -> bool {
        let target = Arc::as_ptr(callback) as *const ();
        let mut registry = self.inner.lock();
        let Some(bucket) = registry.buckets.get_mut(event) else {
            return false;
        };

        let before = bucket.len();
        bucket.retain(|sub| Arc::as_ptr(&sub.callback) as *const () != target);
        let removed = bucket.len() != before;
        if bucket.is_empty() {
            registry.buckets.remove(event);
        }
        removed
    }

    /// Forward envelopes for `event` into an async stream.
    ///
    /// The subscription detaches itself on the first publish after the
    /// stream is dropped.
    pub fn subscribe_stream(
        &self,
        event: &str,
        priority: i32,
    ) -> UnboundedReceiverStream<EventEnvelope> {
        let (tx, rx) = mpsc::unbounded_channel();

        if !is_valid_event_name(event) {
            log::warn!("[EventBus] Rejected stream on invalid event name {:?}", event);
            return UnboundedReceiverStream::new(rx);
        }

        let id = self.next_id();
        let bus = Arc::downgrade(&self.inner);
        let name = event.to_string();

        let forward = move |envelope: &EventEnvelope| -> anyhow::Result<()> {
            if tx.send(envelope.clone()).is_err() {
                if let Some(inner) = bus.upgrade() {
                    inner.remove_id(&name, id);
                }
            }
            Ok(())
        };

        self.register(event, id, Arc::new(forward), priority);
        UnboundedReceiverStream::new(rx)
    }

    // ========================================================================
    // DISPATCH
    // ========================================================================

    /// Deliver `data` to the current subscribers of `event`.
    ///
    /// The timestamp is `timestamp`, else the installed clock, else `None`.
    /// Subscribers are snapshotted before the first call; changes made
    /// during dispatch apply to the next publish. Returns the number of
    /// subscribers that completed without error.
    pub fn publish(&self, event: &str, data: serde_json::Value, timestamp: Option<f64>) -> usize {
        if !is_valid_event_name(event) {
            log::warn!("[EventBus] Ignoring publish to invalid event name {:?}", event);
            return 0;
        }

        let timestamp = timestamp.or_else(|| self.clock_time());

        let snapshot: Vec<(u64, Callback)> = {
            let mut registry = self.inner.lock();
            registry.stats.total_published += 1;
            *registry.stats.per_event.entry(event.to_string()).or_insert(0) += 1;
            registry
                .buckets
                .get(event)
                .map(|bucket| {
                    bucket
                        .iter()
                        .map(|sub| (sub.id, Arc::clone(&sub.callback)))
                        .collect()
                })
                .unwrap_or_default()
        };

        if snapshot.is_empty() {
            log::trace!("[EventBus] {} published with no subscribers", event);
            return 0;
        }

        let envelope = EventEnvelope {
            event: event.to_string(),
            data,
            timestamp,
        };

        let mut delivered = 0;
        let mut failed = 0;
        for (id, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(&envelope))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    failed += 1;
                    log::error!(
                        "[EventBus] Subscriber {} for {} failed: {:#}",
                        id,
                        event,
                        err
                    );
                }
                Err(panic) => {
                    failed += 1;
                    log::error!(
                        "[EventBus] Subscriber {} for {} panicked: {}",
                        id,
                        event,
                        panic_message(panic.as_ref())
                    );
                }
            }
        }

        if failed > 0 {
            self.inner.lock().stats.failed_dispatches += failed;
        }
        delivered
    }

    /// Typed publish; serialization failures are logged and dropped.
    pub fn publish_topic<T: Topic>(&self, payload: &T::Payload) -> usize {
        match serde_json::to_value(payload) {
            Ok(data) => self.publish(T::NAME, data, None),
            Err(err) => {
                log::error!("[EventBus] Failed to encode payload for {}: {}", T::NAME, err);
                0
            }
        }
    }

    /// Typed subscribe; a payload that does not decode counts as a
    /// subscriber failure and is isolated like any other.
    pub fn subscribe_topic<T, F>(&self, callback: F, priority: i32) -> SubscriptionToken
    where
        T: Topic,
        F: Fn(T::Payload, Option<f64>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe(
            T::NAME,
            move |envelope| {
                let payload = topics::decode::<T>(envelope)?;
                callback(payload, envelope.timestamp)
            },
            priority,
        )
    }

    // ========================================================================
    // INTROSPECTION
    // ========================================================================

    pub fn namespace(&self, prefix: &str) -> ScopedBus {
        ScopedBus::new(self.clone(), prefix)
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.inner
            .lock()
            .buckets
            .get(event)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn has_subscribers(&self, event: &str) -> bool {
        self.subscriber_count(event) > 0
    }

    /// Events with at least one subscriber, sorted.
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().buckets.keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop subscribers for one event, or for all events.
    pub fn clear(&self, event: Option<&str>) {
        let mut registry = self.inner.lock();
        match event {
            Some(name) => {
                registry.buckets.remove(name);
            }
            None => registry.buckets.clear(),
        }
    }

    pub fn stats(&self) -> BusStats {
        self.inner.lock().stats.clone()
    }

    pub fn reset_stats(&self) {
        self.inner.lock().stats = BusStats::default();
    }

    // ========================================================================
    // PRIVATE HELPER METHODS
    // ========================================================================

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn register(&self, event: &str, id: u64, callback: Callback, priority: i32) -> SubscriptionToken {
        let mut registry = self.inner.lock();
        let bucket = registry.buckets.entry(event.to_string()).or_default();
        bucket.push(Subscriber {
            id,
            callback,
            priority,
        });
        // Stable sort keeps registration order among equal priorities.
        bucket.sort_by(|a, b| b.priority.cmp(&a.priority));

        SubscriptionToken {
            bus: Arc::downgrade(&self.inner),
            event: event.to_string(),
            id,
        }
    }

    fn clock_time(&self) -> Option<f64> {
        if !self.inner.stamp_with_clock {
            return None;
        }
        let guard = match self.inner.clock.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.as_ref().and_then(|clock| clock.now_seconds())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn is_valid_event_name(event: &str) -> bool {
    !event.trim().is_empty()
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
