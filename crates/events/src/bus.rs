//! Event publishing/subscription abstraction (mechanics only).
//!
//! At-least-once delivery is acceptable; handlers must be idempotent. A
//! failing handler leaves the entry unacknowledged on durable transports.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use thiserror::Error;

use crate::envelope::EventEnvelope;

/// Subscription callback invoked once per delivered entry.
///
/// Delivery hands over the raw JSON value; classifying it against the
/// envelope contract is the consumer's first pipeline step.
pub type EventHandler = Arc<dyn Fn(&serde_json::Value) -> Result<(), HandlerError> + Send + Sync>;

/// Publish-side failure. Non-fatal to the caller; the event is simply lost
/// from this attempt.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("serialization failure: {0}")]
    Serialization(String),
}

/// Failure raised by a subscription handler.
///
/// On durable transports the entry stays in the pending-entries list and is
/// redelivered; the subscription loop itself keeps running.
#[derive(Debug, Error)]
#[error("handler failed: {0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Handle to a running subscription.
///
/// Carries the shared stop flag polled by the consumption loop between
/// blocking reads and after each handler invocation.
#[derive(Debug)]
pub struct SubscriptionHandle {
    stop: Arc<AtomicBool>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriptionHandle {
    /// Handle backed by a consumption-loop thread.
    pub fn with_thread(stop: Arc<AtomicBool>, join: JoinHandle<()>) -> Self {
        Self {
            stop,
            join: Mutex::new(Some(join)),
        }
    }

    /// Handle with no thread of its own (in-memory fan-out).
    pub fn detached(stop: Arc<AtomicBool>) -> Self {
        Self {
            stop,
            join: Mutex::new(None),
        }
    }

    /// Request the loop to stop and wait for it to exit. Idempotent.
    pub fn unsubscribe(&self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.lock().unwrap().take() {
            let _ = join.join();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Domain-agnostic event bus.
///
/// Two implementations share this contract: the durable stream-backed bus
/// and the in-memory fan-out used in tests/dev.
pub trait EventBus: Send + Sync {
    /// Publish one envelope to a topic.
    fn publish(&self, topic: &str, envelope: &EventEnvelope) -> Result<(), PublishError>;

    /// Start consuming a topic as `consumer` within `group`.
    ///
    /// The loop runs asynchronously to the caller; `handler` is invoked once
    /// per delivered entry, in arrival order within a batch.
    fn subscribe(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        handler: EventHandler,
    ) -> SubscriptionHandle;
}

impl<B> EventBus for Arc<B>
where
    B: EventBus + ?Sized,
{
    fn publish(&self, topic: &str, envelope: &EventEnvelope) -> Result<(), PublishError> {
        (**self).publish(topic, envelope)
    }

    fn subscribe(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        handler: EventHandler,
    ) -> SubscriptionHandle {
        (**self).subscribe(topic, group, consumer, handler)
    }
}
