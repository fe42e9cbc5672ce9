//! Event recording through the state backend.

use std::sync::Arc;

use tracing::warn;

use fleetplace_api::{Event, EventType, ObjectMeta, ResourceKey};
use fleetplace_store::{Clock, MemoryStore};

/// Records events against resources. Failures are logged and dropped;
/// events are advisory and must never fail a reconcile.
#[derive(Clone)]
pub struct EventRecorder {
    store: MemoryStore<Event>,
    clock: Arc<dyn Clock>,
}

impl EventRecorder {
    pub fn new(store: MemoryStore<Event>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn warning(&self, regarding: &ResourceKey, reason: &str, message: impl Into<String>) {
        self.record(regarding, EventType::Warning, reason, message.into());
    }

    pub fn normal(&self, regarding: &ResourceKey, reason: &str, message: impl Into<String>) {
        self.record(regarding, EventType::Normal, reason, message.into());
    }

    fn record(&self, regarding: &ResourceKey, event_type: EventType, reason: &str, message: String) {
        let now = self.clock.now();
        let name = format!(
            "{}.{}.{:x}",
            regarding.name,
            reason.to_lowercase(),
            now.timestamp_nanos_opt().unwrap_or_default()
        );
        let event = Event {
            meta: ObjectMeta::namespaced(regarding.namespace.clone(), name),
            regarding: regarding.clone(),
            event_type,
            reason: reason.to_string(),
            message,
            last_timestamp: now,
        };
        if let Err(e) = self.store.create(event) {
            warn!(regarding = %regarding, reason, error = %e, "failed to record event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetplace_store::SystemClock;

    #[test]
    fn records_warning_events() {
        let store = MemoryStore::<Event>::new();
        let recorder = EventRecorder::new(store.clone(), Arc::new(SystemClock));

        let key = ResourceKey::namespaced("ns1", "placement1");
        recorder.warning(&key, "SchedulingFailed", "backend unavailable");

        let events = store.list(Some("ns1"));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, "SchedulingFailed");
        assert_eq!(events[0].event_type, EventType::Warning);
        assert_eq!(events[0].regarding, key);
    }
}
