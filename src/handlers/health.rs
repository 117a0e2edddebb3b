//! Health check endpoint
//!
//! Provides a simple liveness check for monitoring and load balancers.

use axum::Json;
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check handler
///
/// Always 200 with `{"status":"OK"}`. Upstream providers are not probed.
pub async fn handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "OK" })
}
