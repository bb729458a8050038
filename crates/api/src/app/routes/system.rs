//! Liveness, metrics exposition, and the OpenAPI contract.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::app::errors::json_error;
use crate::app::{AppState, SERVICE_NAME};

/// `GET /healthz`
pub async fn healthz() -> axum::response::Response {
    (
        StatusCode::OK,
        Json(json!({ "ok": true, "service": SERVICE_NAME, "time": Utc::now() })),
    )
        .into_response()
}

/// `GET /metrics` — Prometheus text exposition.
pub async fn metrics(Extension(state): Extension<Arc<AppState>>) -> axum::response::Response {
    let body = state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

/// `GET /openapi.json`
pub async fn openapi() -> axum::response::Response {
    match crate::openapi::document() {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "openapi rendering failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to render OpenAPI document",
            )
        }
    }
}
