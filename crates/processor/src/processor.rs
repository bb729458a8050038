//! Event processor: subscription → validation → state mutation →
//! scope-filtered frame recomputation.
//!
//! The circuit breaker is the outer guard around event processing; the retry
//! policy guards per-city frame computation. The two are never nested around
//! the same call site.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use railview_core::CityId;
use railview_events::{topics, EventBus, EventHandler, HandlerError, TransitEvent};
use railview_state::{
    CleanupResult, FrameComputation, FrameComputer, ScopeFrameStore, UpsertOutcome,
    VehicleStateManager, VehicleStateStats,
};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitError};
use crate::config::ProcessorConfig;
use crate::retry::RetryPolicy;

/// Consumer-group identity of the single live processor.
pub const CONSUMER_GROUP: &str = "processor";
pub const CONSUMER_NAME: &str = "processor-1";

/// Processing failure surfaced to the bus; the entry stays unacknowledged.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("frame computation failed: {0}")]
    FrameComputation(String),
}

/// Counters exposed for observability.
#[derive(Debug, Clone, Default)]
pub struct ProcessorStats {
    pub events_processed: u64,
    pub events_failed: u64,
    pub events_invalid: u64,
    pub last_cleanup: Option<CleanupResult>,
}

struct CleanupHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl CleanupHandle {
    fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// The stateful heart of the pipeline. One live instance per deployment.
pub struct Processor {
    config: ProcessorConfig,
    vehicle_state: Arc<VehicleStateManager>,
    frame_computer: Arc<FrameComputer>,
    retry: RetryPolicy,
    breaker: Mutex<CircuitBreaker>,
    is_shutting_down: Arc<AtomicBool>,
    stats: Mutex<ProcessorStats>,
    subscription: Mutex<Option<railview_events::SubscriptionHandle>>,
    cleanup: Mutex<Option<CleanupHandle>>,
}

impl Processor {
    pub fn new(config: ProcessorConfig, scope_store: Arc<ScopeFrameStore>) -> Arc<Self> {
        let vehicle_state = Arc::new(VehicleStateManager::new(config.max_vehicles_per_city));
        let frame_computer = Arc::new(FrameComputer::new(scope_store));

        let retry = RetryPolicy::new(
            config.max_retries,
            config.retry_base_delay(),
            config.retry_max_delay(),
            true,
        );
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            threshold: config.circuit_breaker_threshold,
            timeout: config.circuit_breaker_timeout(),
        });

        Arc::new(Self {
            config,
            vehicle_state,
            frame_computer,
            retry,
            breaker: Mutex::new(breaker),
            is_shutting_down: Arc::new(AtomicBool::new(false)),
            stats: Mutex::new(ProcessorStats::default()),
            subscription: Mutex::new(None),
            cleanup: Mutex::new(None),
        })
    }

    /// Subscribe to the normalized-events topic and start the cleanup timer.
    pub fn start<B: EventBus>(self: &Arc<Self>, bus: &B) {
        let handler: EventHandler = {
            let processor = Arc::clone(self);
            Arc::new(move |value: &serde_json::Value| {
                processor
                    .handle_entry(value)
                    .map_err(|e| HandlerError::new(e.to_string()))
            })
        };

        let subscription =
            bus.subscribe(topics::EVENTS_NORMALIZED, CONSUMER_GROUP, CONSUMER_NAME, handler);
        *self.subscription.lock().unwrap() = Some(subscription);

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let join = {
            let processor = Arc::clone(self);
            thread::Builder::new()
                .name("processor-cleanup".to_string())
                .spawn(move || cleanup_loop(processor, shutdown_rx))
                .expect("failed to spawn processor cleanup thread")
        };
        *self.cleanup.lock().unwrap() = Some(CleanupHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        });

        info!(
            topic = topics::EVENTS_NORMALIZED,
            group = CONSUMER_GROUP,
            consumer = CONSUMER_NAME,
            "processor started"
        );
    }

    /// Stop the cleanup timer and unsubscribe. In-flight handler invocations
    /// run to completion. Idempotent.
    pub fn stop(&self) {
        if self.is_shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(cleanup) = self.cleanup.lock().unwrap().take() {
            cleanup.shutdown();
        }
        if let Some(subscription) = self.subscription.lock().unwrap().take() {
            subscription.unsubscribe();
        }

        info!("processor stopped");
    }

    /// Per-entry pipeline: validate, then dispatch through the breaker.
    pub fn handle_entry(&self, value: &serde_json::Value) -> Result<(), ProcessError> {
        let started = Instant::now();

        let envelope = match railview_events::validate(value) {
            Ok(envelope) => envelope,
            Err(errors) => {
                // Validation is deterministic; redelivery would only fail
                // again, so the entry is treated as handled.
                warn!(errors = ?errors, "discarding invalid envelope");
                self.stats.lock().unwrap().events_invalid += 1;
                if self.config.enable_metrics {
                    metrics::increment_counter!("railview_events_invalid_total");
                }
                return Ok(());
            }
        };

        let city = envelope.city_id().clone();
        let kind = envelope.kind();

        let outcome = {
            let mut breaker = self.breaker.lock().unwrap();
            breaker.call(|| self.process_event(&envelope))
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(()) => {
                self.stats.lock().unwrap().events_processed += 1;
                if self.config.enable_metrics {
                    metrics::increment_counter!("railview_events_processed_total");
                    metrics::histogram!("railview_event_processing_ms", elapsed_ms as f64);
                }
                if self.config.enable_detailed_logging {
                    debug!(city = %city, kind, elapsed_ms, "event processed");
                }
                Ok(())
            }
            Err(CircuitError::Open) => {
                self.record_failure(elapsed_ms);
                warn!(city = %city, kind, "event rejected, circuit open");
                Err(ProcessError::CircuitOpen)
            }
            Err(CircuitError::Inner(e)) => {
                self.record_failure(elapsed_ms);
                error!(city = %city, kind, error = %e, "event processing failed");
                Err(e)
            }
        }
    }

    fn record_failure(&self, elapsed_ms: u64) {
        self.stats.lock().unwrap().events_failed += 1;
        if self.config.enable_metrics {
            metrics::increment_counter!("railview_events_failed_total");
            metrics::histogram!("railview_event_processing_ms", elapsed_ms as f64);
        }
    }

    /// State mutation + frame recomputation, run inside the breaker.
    fn process_event(&self, envelope: &railview_events::EventEnvelope) -> Result<(), ProcessError> {
        let city = envelope.city_id();

        match &envelope.data {
            TransitEvent::VehicleUpsert(event) => {
                let outcome = self
                    .vehicle_state
                    .upsert_vehicle(city, event.payload.clone());
                if outcome == UpsertOutcome::RejectedCityFull {
                    if self.config.enable_metrics {
                        metrics::increment_counter!("railview_events_rejected_total");
                    }
                    // Nothing changed; skip the recomputation.
                    return Ok(());
                }
            }
            TransitEvent::VehicleRemove(event) => {
                self.vehicle_state.remove_vehicle(city, &event.payload.id);
            }
        }

        self.compute_frames_for_city(city).map(|_| ())
    }

    /// Recompute every active scope in `city`, retry-guarded.
    pub fn compute_frames_for_city(&self, city: &CityId) -> Result<FrameComputation, ProcessError> {
        let vehicles = self.vehicle_state.vehicles_for_city(city);

        self.retry
            .execute("frame computation", || {
                self.frame_computer
                    .compute_frames(city, &vehicles, |scope| &scope.city_id == city)
            })
            .map_err(|e| ProcessError::FrameComputation(e.to_string()))
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats.lock().unwrap().clone()
    }

    pub fn vehicle_stats(&self) -> VehicleStateStats {
        self.vehicle_state.stats()
    }

    pub fn vehicle_state(&self) -> &Arc<VehicleStateManager> {
        &self.vehicle_state
    }
}

fn cleanup_loop(processor: Arc<Processor>, shutdown_rx: mpsc::Receiver<()>) {
    let interval = processor.config.cleanup_interval();

    loop {
        match shutdown_rx.recv_timeout(interval) {
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let result = processor
                    .vehicle_state
                    .cleanup(processor.config.max_vehicle_age_ms);
                let stats = processor.vehicle_state.stats();

                info!(
                    removed = result.vehicles_removed,
                    cities_dropped = result.cities_dropped,
                    tracked = stats.total_vehicles,
                    "vehicle cleanup pass"
                );
                if processor.config.enable_metrics {
                    metrics::counter!(
                        "railview_cleanup_removed_total",
                        result.vehicles_removed as u64
                    );
                    metrics::gauge!("railview_vehicles_tracked", stats.total_vehicles as f64);
                }

                processor.stats.lock().unwrap().last_cleanup = Some(result);
            }
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}
