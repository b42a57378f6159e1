//! HTTP surface of the photo wall.
//!
//! | Method | Path                | Purpose                          |
//! |--------|---------------------|----------------------------------|
//! | GET    | `/api/photos`       | Current photos, newest first     |
//! | POST   | `/api/photos`       | Submit a photo                   |
//! | GET    | `/api/photos/{id}`  | One photo                        |
//! | DELETE | `/api/photos/{id}`  | Delete a photo                   |
//! | GET    | `/events`           | Server-Sent Events stream        |
//! | GET    | `/uploads/{file}`   | Stored image files               |
//! | GET    | `/health`           | Readiness and counters           |
//! | GET    | `/metrics`          | Prometheus exposition            |

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::constants;
use crate::error::Error;
use crate::shutdown::Shutdown;
use crate::wall::PhotoWall;

mod handlers;
pub mod types;

use types::ErrorResponse;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub wall: PhotoWall,
    pub shutdown: Shutdown,
    /// `None` when no Prometheus recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(wall: PhotoWall, shutdown: Shutdown) -> Self {
        Self {
            wall,
            shutdown,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Error returned by handlers.
#[derive(Debug)]
pub(crate) enum AppError {
    /// Failure reported by the wall.
    Wall(Error),
    /// Request rejected before it reached the wall (bad JSON, body too large).
    Rejected { status: StatusCode, message: String },
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self::Wall(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Wall(err) => {
                let status = StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() && !err.is_transient() {
                    error!(error = %err, "Request failed");
                }

                let body = ErrorResponse {
                    error: err.public_message(),
                    kind: err.kind().to_string(),
                };
                let mut response = (status, Json(body)).into_response();
                if matches!(err, Error::Capacity { .. }) {
                    response
                        .headers_mut()
                        .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
                }
                response
            },
            Self::Rejected { status, message } => {
                let body = ErrorResponse {
                    error: message,
                    kind: "rejected".to_string(),
                };
                (status, Json(body)).into_response()
            },
        }
    }
}

/// Largest request body accepted on submit.
///
/// Base64 inflates the image by 4/3; the slack covers the data URL header,
/// caption and other fields.
pub fn body_limit(max_image_bytes: usize) -> usize {
    max_image_bytes
        .div_ceil(3)
        .saturating_mul(4)
        .saturating_add(constants::BODY_LIMIT_SLACK_BYTES)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(86400))
}

/// Builds the router for a wall.
pub fn router(state: AppState) -> Router {
    let config = state.wall.config();
    let limit = body_limit(config.max_image_bytes);
    let uploads = ServeDir::new(state.wall.images().base_dir());
    let uploads_prefix = config.uploads_url_prefix.clone();

    Router::new()
        .route(
            "/api/photos",
            get(handlers::list_photos)
                .post(handlers::submit_photo)
                .route_layer(DefaultBodyLimit::max(limit)),
        )
        .route(
            "/api/photos/{id}",
            get(handlers::get_photo).delete(handlers::delete_photo),
        )
        .route("/events", get(handlers::event_stream))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .nest_service(&uploads_prefix, uploads)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
