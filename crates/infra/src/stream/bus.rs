//! Stream-backed event bus.
//!
//! Publish is `XADD` with approximate trimming; subscribe runs a long-lived
//! consumer-group loop on a worker thread. Entries are acknowledged only
//! after the handler succeeds, so failures stay in the pending-entries list
//! for redelivery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{error, warn};

use railview_events::{EventBus, EventEnvelope, EventHandler, PublishError, SubscriptionHandle};

use crate::stream::client::{ReadOptions, StreamBusClient, StreamBusConfig, StreamBusError};

/// Backoff applied when the read loop hits a transport error.
const READ_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Stream entries carry exactly one field with this key.
pub const ENTRY_FIELD: &str = "json";

/// Bus-level tunables.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Approximate stream length cap requested on publish.
    pub max_len: u64,
    /// Blocking-read timeout for subscription loops.
    pub block_ms: u64,
}

pub const MIN_MAX_LEN: u64 = 100;
pub const MIN_BLOCK_MS: u64 = 100;

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_len: 10_000,
            block_ms: 5_000,
        }
    }
}

impl BusConfig {
    /// Values below the documented minimums clamp up.
    pub fn new(max_len: u64, block_ms: u64) -> Self {
        Self {
            max_len: max_len.max(MIN_MAX_LEN),
            block_ms: block_ms.max(MIN_BLOCK_MS),
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self::new(
            std::env::var("EVENT_BUS_MAXLEN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_len),
            std::env::var("EVENT_BUS_BLOCK_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.block_ms),
        )
    }
}

/// Durable event bus on Redis/Valkey streams.
///
/// The publish side shares one client; every subscription gets a client of
/// its own so blocking reads never starve publishers.
pub struct StreamEventBus {
    publisher: StreamBusClient,
    stream_config: StreamBusConfig,
    config: BusConfig,
}

impl StreamEventBus {
    pub fn new(stream_config: StreamBusConfig, config: BusConfig) -> Result<Self, StreamBusError> {
        let publisher = StreamBusClient::new(stream_config.clone())?;
        Ok(Self {
            publisher,
            stream_config,
            config,
        })
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }
}

impl EventBus for StreamEventBus {
    fn publish(&self, topic: &str, envelope: &EventEnvelope) -> Result<(), PublishError> {
        self.publisher
            .xadd_json(topic, envelope, Some(self.config.max_len as i64))
            .map(|_| ())
            .map_err(|e| match e {
                StreamBusError::Serialization(msg) => PublishError::Serialization(msg),
                StreamBusError::Transport(msg) => PublishError::Transport(msg),
            })
    }

    fn subscribe(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        handler: EventHandler,
    ) -> SubscriptionHandle {
        let stop = Arc::new(AtomicBool::new(false));

        let loop_ctx = SubscriptionLoop {
            stream_config: self.stream_config.clone(),
            topic: topic.to_string(),
            group: group.to_string(),
            consumer: consumer.to_string(),
            block_ms: self.config.block_ms,
            handler,
            stop: stop.clone(),
        };

        let join = thread::Builder::new()
            .name(format!("stream-sub-{group}"))
            .spawn(move || loop_ctx.run())
            .expect("failed to spawn stream subscription thread");

        SubscriptionHandle::with_thread(stop, join)
    }
}

struct SubscriptionLoop {
    stream_config: StreamBusConfig,
    topic: String,
    group: String,
    consumer: String,
    block_ms: u64,
    handler: EventHandler,
    stop: Arc<AtomicBool>,
}

impl SubscriptionLoop {
    fn run(self) {
        let client = match StreamBusClient::new(self.stream_config.clone()) {
            Ok(client) => client,
            Err(e) => {
                error!(topic = %self.topic, error = %e, "subscription client setup failed");
                return;
            }
        };

        // The group must exist before the first read; keep trying until it
        // does or the subscription is cancelled.
        while !self.stopped() {
            match client.xgroup_create(&self.topic, &self.group, "0", true) {
                Ok(()) => break,
                Err(e) => {
                    error!(topic = %self.topic, group = %self.group, error = %e,
                        "consumer group creation failed, backing off");
                    thread::sleep(READ_ERROR_BACKOFF);
                }
            }
        }

        while !self.stopped() {
            let batches = match client.xread_group(
                &self.group,
                &self.consumer,
                &self.topic,
                ">",
                ReadOptions {
                    block_ms: Some(self.block_ms),
                    count: None,
                },
            ) {
                Ok(Some(batches)) => batches,
                Ok(None) => continue, // timeout tick; re-check the stop flag
                Err(e) => {
                    error!(topic = %self.topic, error = %e, "stream read failed, backing off");
                    thread::sleep(READ_ERROR_BACKOFF);
                    continue;
                }
            };

            for batch in batches {
                for message in batch.messages {
                    self.dispatch(&client, &message.id, message.fields.get(ENTRY_FIELD));
                    if self.stopped() {
                        return;
                    }
                }
            }
        }
    }

    fn dispatch(&self, client: &StreamBusClient, entry_id: &str, json: Option<&String>) {
        let Some(json) = json else {
            // An entry without the json field can never be processed; ack it
            // away instead of poisoning the PEL.
            warn!(topic = %self.topic, entry = entry_id, "entry missing json field, acking");
            self.ack(client, entry_id);
            return;
        };

        let value: serde_json::Value = match serde_json::from_str(json) {
            Ok(value) => value,
            Err(e) => {
                warn!(topic = %self.topic, entry = entry_id, error = %e,
                    "unparseable entry payload, acking");
                self.ack(client, entry_id);
                return;
            }
        };

        match (self.handler)(&value) {
            Ok(()) => self.ack(client, entry_id),
            Err(e) => {
                // Not acked: the entry stays in the PEL for redelivery.
                warn!(topic = %self.topic, entry = entry_id, error = %e,
                    "handler failed, leaving entry pending");
            }
        }
    }

    fn ack(&self, client: &StreamBusClient, entry_id: &str) {
        if let Err(e) = client.xack(&self.topic, &self.group, entry_id) {
            warn!(topic = %self.topic, entry = entry_id, error = %e, "ack failed");
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}
