//! Liveness check.

use axum::http::StatusCode;

/// Always answers 200 `OK` while the process is serving.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
