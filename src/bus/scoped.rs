use super::{Callback, EventBus, EventEnvelope, SubscriptionToken};

/// Bus view that prefixes every event name with `prefix:`.
///
/// `bus.namespace("microphone").publish("granted", ..)` is the same as
/// `bus.publish("microphone:granted", ..)`.
#[derive(Clone)]
pub struct ScopedBus {
    bus: EventBus,
    prefix: String,
}

impl ScopedBus {
    pub(super) fn new(bus: EventBus, prefix: &str) -> Self {
        Self {
            bus,
            prefix: prefix.trim_end_matches(':').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Fully qualified name for `event` in this namespace.
    pub fn qualify(&self, event: &str) -> String {
        format!("{}:{}", self.prefix, event)
    }

    pub fn subscribe<F>(&self, event: &str, callback: F, priority: i32) -> SubscriptionToken
    where
        F: Fn(&EventEnvelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus.subscribe(&self.qualify(event), callback, priority)
    }

    pub fn once<F>(&self, event: &str, callback: F, priority: i32) -> SubscriptionToken
    where
        F: Fn(&EventEnvelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus.once(&self.qualify(event), callback, priority)
    }

    pub fn unsubscribe(&self, event: &str, callback: &Callback) -> bool {
        self.bus.unsubscribe(&self.qualify(event), callback)
    }

    pub fn publish(&self, event: &str, data: serde_json::Value, timestamp: Option<f64>) -> usize {
        self.bus.publish(&self.qualify(event), data, timestamp)
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.bus.subscriber_count(&self.qualify(event))
    }

    /// Nested namespace: `ns.namespace("b")` prefixes with `a:b:`.
    pub fn namespace(&self, prefix: &str) -> ScopedBus {
        ScopedBus::new(self.bus.clone(), &self.qualify(prefix))
    }
}
