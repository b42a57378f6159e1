//! Request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};

/// Error body for every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Message safe to show to the submitter.
    pub error: String,
    /// Stable machine-readable category (`busy`, `rejected`, `not_found`, ...).
    pub kind: String,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ready`, or `draining` once shutdown has begun.
    pub status: String,
    pub photos: usize,
    pub in_flight: usize,
    pub subscribers: usize,
    pub persistence: bool,
}
