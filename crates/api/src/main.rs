use std::sync::Arc;

use railview_api::app::{build_app, AppState};
use railview_infra::{BusConfig, StreamBusConfig, StreamEventBus};
use railview_processor::{Processor, ProcessorConfig};
use railview_state::{ScopeFrameStore, ScopeStoreConfig};

#[tokio::main]
async fn main() {
    railview_observability::init();

    let metrics = match railview_observability::metrics::install() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder unavailable, /metrics will be empty");
            None
        }
    };

    let bus = match StreamEventBus::new(StreamBusConfig::from_env(), BusConfig::from_env()) {
        Ok(bus) => Arc::new(bus),
        Err(e) => {
            tracing::error!(error = %e, "stream bus setup failed");
            std::process::exit(1);
        }
    };

    let store = Arc::new(ScopeFrameStore::new(ScopeStoreConfig::from_env()));
    let processor = Processor::new(ProcessorConfig::from_env(), store.clone());
    processor.start(&bus);

    let app = build_app(AppState { store, metrics });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {bind_addr}: {e}"));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    processor.stop();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
