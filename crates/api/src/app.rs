//! HTTP application wiring.

use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::extract::Extension;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{BoxError, Router};
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;

use railview_observability::PrometheusHandle;
use railview_state::ScopeFrameStore;

pub mod errors;
pub mod routes;

pub const SERVICE_NAME: &str = "railview-api";

/// Upper bound on request handling; store lookups are the only hot-path
/// work, so anything slower than this is stuck.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared handler state.
///
/// HTTP touches only the scope/frame store; vehicle state belongs to the
/// processor alone.
pub struct AppState {
    pub store: Arc<ScopeFrameStore>,
    pub metrics: Option<PrometheusHandle>,
}

/// Build the full router.
pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/trains", get(routes::trains::latest_frame))
        .route(
            "/trains/scopes",
            post(routes::trains::provision_scope).get(routes::trains::list_scopes),
        );

    Router::new()
        .nest("/api/v1", api)
        .route("/healthz", get(routes::system::healthz))
        .route("/metrics", get(routes::system::metrics))
        .route("/openapi.json", get(routes::system::openapi))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|_: BoxError| async {
                    errors::json_error(StatusCode::REQUEST_TIMEOUT, "Request timed out")
                }))
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )
        .layer(Extension(Arc::new(state)))
}
