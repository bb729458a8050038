//! HTTP error envelopes.
//!
//! Non-2xx JSON responses share one shape: `{ok:false, error, details?}`.
//! Only validation (400) and not-found (404) are distinguished; everything
//! else collapses to a generic 500.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::error;

pub fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(json!({
            "ok": false,
            "error": message.into(),
        })),
    )
        .into_response()
}

pub fn json_error_with_details(
    status: StatusCode,
    message: impl Into<String>,
    details: impl Serialize,
) -> axum::response::Response {
    (
        status,
        Json(json!({
            "ok": false,
            "error": message.into(),
            "details": details,
        })),
    )
        .into_response()
}

pub fn internal_error(err: impl core::fmt::Display) -> axum::response::Response {
    error!(error = %err, "request failed");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}
