//! Processor pipeline and resilience layer.

pub mod circuit_breaker;
pub mod config;
pub mod processor;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitError, CircuitState};
pub use config::ProcessorConfig;
pub use processor::{ProcessError, Processor, ProcessorStats, CONSUMER_GROUP, CONSUMER_NAME};
pub use retry::RetryPolicy;
