//! Prometheus metrics recorder.
//!
//! Components record through the `metrics` macros; the handle installed here
//! renders the text exposition served on `GET /metrics`.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return its render handle.
///
/// Fails if a recorder is already installed; call once at startup.
pub fn install() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {e}"))?;
    Ok(handle)
}
