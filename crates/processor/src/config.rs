//! Processor configuration.

use std::time::Duration;

/// Tunables for the event processor.
///
/// All knobs come from the environment with the documented defaults; values
/// are read once at startup.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub max_vehicles_per_city: usize,
    pub max_vehicle_age_ms: u64,
    pub cleanup_interval_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_timeout_ms: u64,
    pub enable_metrics: bool,
    pub enable_detailed_logging: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_vehicles_per_city: 10_000,
            max_vehicle_age_ms: 5 * 60 * 1000,
            cleanup_interval_ms: 60_000,
            max_retries: 3,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 10_000,
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout_ms: 30_000,
            enable_metrics: true,
            enable_detailed_logging: false,
        }
    }
}

impl ProcessorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_vehicles_per_city: env_parse("PROCESSOR_MAX_VEHICLES_PER_CITY")
                .unwrap_or(defaults.max_vehicles_per_city),
            max_vehicle_age_ms: env_parse("PROCESSOR_MAX_VEHICLE_AGE_MS")
                .unwrap_or(defaults.max_vehicle_age_ms),
            cleanup_interval_ms: env_parse("PROCESSOR_CLEANUP_INTERVAL_MS")
                .unwrap_or(defaults.cleanup_interval_ms),
            max_retries: env_parse("PROCESSOR_MAX_RETRIES").unwrap_or(defaults.max_retries),
            retry_base_delay_ms: env_parse("PROCESSOR_RETRY_BASE_DELAY_MS")
                .unwrap_or(defaults.retry_base_delay_ms),
            retry_max_delay_ms: env_parse("PROCESSOR_RETRY_MAX_DELAY_MS")
                .unwrap_or(defaults.retry_max_delay_ms),
            circuit_breaker_threshold: env_parse("PROCESSOR_CIRCUIT_BREAKER_THRESHOLD")
                .unwrap_or(defaults.circuit_breaker_threshold),
            circuit_breaker_timeout_ms: env_parse("PROCESSOR_CIRCUIT_BREAKER_TIMEOUT_MS")
                .unwrap_or(defaults.circuit_breaker_timeout_ms),
            enable_metrics: env_parse("PROCESSOR_ENABLE_METRICS")
                .unwrap_or(defaults.enable_metrics),
            enable_detailed_logging: env_parse("PROCESSOR_ENABLE_DETAILED_LOGGING")
                .unwrap_or(defaults.enable_detailed_logging),
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    pub fn circuit_breaker_timeout(&self) -> Duration {
        Duration::from_millis(self.circuit_breaker_timeout_ms)
    }
}

fn env_parse<T: core::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
