//! Process observability: structured logging and metrics exposition.

pub mod metrics;
pub mod tracing;

pub use crate::tracing::init;
pub use metrics_exporter_prometheus::PrometheusHandle;
