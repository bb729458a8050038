//! Scope provisioning and frame retrieval.

use std::sync::Arc;

use axum::extract::{Extension, Query};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use railview_core::{ScopeDefinition, ScopeId, ScopedTrainsFrame};

use crate::app::errors::{internal_error, json_error, json_error_with_details};
use crate::app::AppState;
use crate::dto::parse_viewport;

/// `POST /api/v1/trains/scopes`
///
/// 201 when the scope gets a fresh empty frame, 200 when a frame already
/// exists (the definition TTL is refreshed either way).
pub async fn provision_scope(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let request = match parse_viewport(&body) {
        Ok(request) => request,
        Err(details) => {
            return json_error_with_details(
                StatusCode::BAD_REQUEST,
                "Invalid viewport request",
                details,
            )
        }
    };

    let scope_id = request.scope_id.clone();
    let now = Utc::now();

    let definition = ScopeDefinition {
        id: scope_id.clone(),
        city_id: request.city_id.clone(),
        bbox: request.bbox,
        created_at: now,
    };
    if let Err(e) = state.store.upsert_scope(definition, None) {
        return internal_error(e);
    }

    match state.store.get_frame(&scope_id) {
        Ok(Some(frame)) => (
            StatusCode::OK,
            Json(json!({ "ok": true, "scopeId": scope_id, "frame": frame })),
        )
            .into_response(),
        Ok(None) => {
            let frame =
                ScopedTrainsFrame::empty(scope_id.clone(), request.bbox, request.city_id, now);
            if let Err(e) = state.store.set_frame(frame.clone(), None) {
                return internal_error(e);
            }
            (
                StatusCode::CREATED,
                Json(json!({ "ok": true, "scopeId": scope_id, "frame": frame })),
            )
                .into_response()
        }
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct FrameQuery {
    scope: Option<String>,
}

/// `GET /api/v1/trains?scope=<id>`
pub async fn latest_frame(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<FrameQuery>,
) -> axum::response::Response {
    let scope_id = match query
        .scope
        .filter(|s| !s.is_empty())
        .and_then(|s| ScopeId::try_from(s).ok())
    {
        Some(id) => id,
        None => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "Missing or invalid scope parameter",
            )
        }
    };

    match state.store.get_frame(&scope_id) {
        Ok(Some(frame)) => {
            (StatusCode::OK, Json(json!({ "ok": true, "frame": frame }))).into_response()
        }
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Scope not found"),
        Err(e) => internal_error(e),
    }
}

/// `GET /api/v1/trains/scopes` — operator listing of active definitions.
pub async fn list_scopes(
    Extension(state): Extension<Arc<AppState>>,
) -> axum::response::Response {
    match state.store.active_scopes() {
        Ok(scopes) => (
            StatusCode::OK,
            Json(json!({ "ok": true, "count": scopes.len(), "scopes": scopes })),
        )
            .into_response(),
        Err(e) => internal_error(e),
    }
}
