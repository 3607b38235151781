//! Event Bus: per-orchestrator typed publish/subscribe with
//! priority-ordered handler lists and per-handler failure isolation.
//!
//! Subscriptions are mutated only at session setup/teardown, never from
//! inside `emit`, so this holds its handler
//! lists behind plain `Vec`s rather than a lock-protected map.

use std::collections::HashMap;
use std::sync::Arc;

use crate::events::{EventType, OutputEvent};

/// Handler dispatch priority. Equal-priority handlers run in
/// registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    High,
    Normal,
    Low,
}

/// A fallible event handler. Returning `Err` is caught by [`EventBus::emit`]
/// and logged; it never stops peer handlers from running.
pub type Handler = Arc<dyn Fn(&OutputEvent) -> anyhow::Result<()> + Send + Sync>;

/// Opaque handle returned by [`EventBus::subscribe`], used to
/// [`EventBus::unsubscribe`] later. Carries no meaning beyond identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

struct Entry {
    id: u64,
    name: &'static str,
    priority: Priority,
    insertion: u64,
    handler: Handler,
}

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    handlers: HashMap<EventType, Vec<Entry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event_type` at `priority`. Handlers at
    /// the same priority run in the order they were registered.
    pub fn subscribe(&mut self, event_type: EventType, name: &'static str, priority: Priority, handler: Handler) -> Subscription {
        let id = self.next_id;
        self.next_id += 1;
        let entries = self.handlers.entry(event_type).or_default();
        entries.push(Entry {
            id,
            name,
            priority,
            insertion: id,
            handler,
        });
        entries.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.insertion.cmp(&b.insertion)));
        Subscription(id)
    }

    /// Remove a subscription. Idempotent: unsubscribing twice, or a
    /// subscription already cleared, is a no-op.
    pub fn unsubscribe(&mut self, subscription: Subscription) {
        for entries in self.handlers.values_mut() {
            entries.retain(|e| e.id != subscription.0);
        }
    }

    /// Invoke every handler registered for `event.event_type()` in priority
    /// order, serially. A handler's failure is logged and does not prevent
    /// the remaining handlers from running. Returns only once every
    /// handler has completed.
    pub fn emit(&self, event: &OutputEvent) {
        let event_type = event.event_type();
        let Some(entries) = self.handlers.get(&event_type) else {
            return;
        };
        for entry in entries {
            if let Err(err) = (entry.handler)(event) {
                tracing::error!(handler = entry.name, error = %err, "event handler failed");
            }
        }
    }

    /// Drop all subscriptions across every event type.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    pub fn subscriber_count(&self, event_type: EventType) -> usize {
        self.handlers.get(&event_type).map(Vec::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn sentence_event() -> OutputEvent {
        OutputEvent::Sentence {
            text: "hi".into(),
            seq: 0,
        }
    }

    #[test]
    fn handlers_fire_in_priority_order() {
        let mut bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        bus.subscribe(EventType::Sentence, "low", Priority::Low, Arc::new(move |_| {
            o1.lock().unwrap().push("low");
            Ok(())
        }));
        let o2 = order.clone();
        bus.subscribe(EventType::Sentence, "high", Priority::High, Arc::new(move |_| {
            o2.lock().unwrap().push("high");
            Ok(())
        }));
        let o3 = order.clone();
        bus.subscribe(EventType::Sentence, "normal", Priority::Normal, Arc::new(move |_| {
            o3.lock().unwrap().push("normal");
            Ok(())
        }));

        bus.emit(&sentence_event());
        assert_eq!(*order.lock().unwrap(), vec!["high", "normal", "low"]);
    }

    #[test]
    fn equal_priority_handlers_run_in_registration_order() {
        let mut bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let o = order.clone();
            bus.subscribe(EventType::Sentence, name, Priority::Normal, Arc::new(move |_| {
                o.lock().unwrap().push(name);
                Ok(())
            }));
        }
        bus.emit(&sentence_event());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn a_failing_handler_does_not_prevent_later_handlers() {
        let mut bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        bus.subscribe(EventType::Sentence, "failing", Priority::High, Arc::new(|_| {
            anyhow::bail!("boom")
        }));
        let c = calls.clone();
        bus.subscribe(EventType::Sentence, "ok", Priority::Normal, Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        bus.emit(&sentence_event());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let mut bus = EventBus::new();
        let sub = bus.subscribe(EventType::Sentence, "h", Priority::Normal, Arc::new(|_| Ok(())));
        assert_eq!(bus.subscriber_count(EventType::Sentence), 1);
        bus.unsubscribe(sub);
        bus.unsubscribe(sub);
        assert_eq!(bus.subscriber_count(EventType::Sentence), 0);
    }

    #[test]
    fn clear_removes_every_subscription() {
        let mut bus = EventBus::new();
        bus.subscribe(EventType::Sentence, "h1", Priority::Normal, Arc::new(|_| Ok(())));
        bus.subscribe(EventType::Error, "h2", Priority::High, Arc::new(|_| Ok(())));
        bus.clear();
        assert_eq!(bus.subscriber_count(EventType::Sentence), 0);
        assert_eq!(bus.subscriber_count(EventType::Error), 0);
    }

    #[test]
    fn emit_with_no_subscribers_is_a_no_op() {
        let bus = EventBus::new();
        bus.emit(&sentence_event());
    }
}
