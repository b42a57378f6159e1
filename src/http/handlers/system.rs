//! Health and metrics handlers.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use super::super::AppState;
use super::super::types::HealthResponse;
use crate::constants;
use crate::telemetry;

/// GET /health - Readiness and live counters.
///
/// Answers 503 once shutdown has begun so load balancers stop routing here.
pub(crate) async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let wall = &state.wall;
    let subscribers = wall.subscriber_count();
    telemetry::set_subscriber_count(subscribers);

    let (status, label) = if wall.is_shutting_down() {
        (StatusCode::SERVICE_UNAVAILABLE, constants::HEALTH_STATUS_DRAINING)
    } else {
        (StatusCode::OK, constants::HEALTH_STATUS_READY)
    };

    let body = HealthResponse {
        status: label.to_string(),
        photos: wall.len(),
        in_flight: wall.in_flight(),
        subscribers,
        persistence: wall.persistence_enabled(),
    };
    (status, Json(body))
}

/// GET /metrics - Prometheus text exposition.
pub(crate) async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
