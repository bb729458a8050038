//! In-memory event bus for tests/dev.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::bus::{EventBus, EventHandler, PublishError, SubscriptionHandle};
use crate::envelope::EventEnvelope;

struct TopicSubscriber {
    stop: Arc<AtomicBool>,
    handler: EventHandler,
}

/// In-memory fan-out bus.
///
/// - No IO, no persistence, no offsets
/// - Every live subscriber on a topic sees every publish (groups are not
///   load-balanced)
/// - Handlers run synchronously on the publisher's thread, so tests observe
///   effects immediately after `publish` returns
#[derive(Default)]
pub struct InMemoryEventBus {
    subscribers: Mutex<HashMap<String, Vec<TopicSubscriber>>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions on a topic (test helper).
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .get(topic)
            .map(|subs| {
                subs.iter()
                    .filter(|s| !s.stop.load(Ordering::SeqCst))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Publish a raw JSON value, bypassing the typed envelope.
    ///
    /// Lets tests drive the validation path with malformed entries, the same
    /// way a foreign producer could on a durable stream.
    pub fn publish_raw(&self, topic: &str, value: &serde_json::Value) -> Result<(), PublishError> {
        let mut subs = self.subscribers.lock().unwrap();

        let Some(topic_subs) = subs.get_mut(topic) else {
            return Ok(());
        };

        // Drop unsubscribed handlers while publishing.
        topic_subs.retain(|s| !s.stop.load(Ordering::SeqCst));

        for sub in topic_subs.iter() {
            if let Err(e) = (sub.handler)(value) {
                // No PEL in memory: the failure is logged and the message is gone.
                warn!(topic, error = %e, "in-memory handler failed");
            }
        }

        Ok(())
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(&self, topic: &str, envelope: &EventEnvelope) -> Result<(), PublishError> {
        let value = serde_json::to_value(envelope)
            .map_err(|e| PublishError::Serialization(e.to_string()))?;
        self.publish_raw(topic, &value)
    }

    fn subscribe(
        &self,
        topic: &str,
        _group: &str,
        _consumer: &str,
        handler: EventHandler,
    ) -> SubscriptionHandle {
        let stop = Arc::new(AtomicBool::new(false));

        self.subscribers
            .lock()
            .unwrap()
            .entry(topic.to_string())
            .or_default()
            .push(TopicSubscriber {
                stop: stop.clone(),
                handler,
            });

        SubscriptionHandle::detached(stop)
    }
}
