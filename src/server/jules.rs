//! `GET /jules/retry`, the cron entry point of the agent retry sweep.

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use super::AppState;
use crate::connector::TrackerConnector;
use crate::rewrite::Rewriter;
use crate::store::MappingStore;

/// Runs one sweep. Individual task failures are logged by the sweep and do
/// not fail the request; only failing to list flagged tasks does.
pub async fn retry_handler<S, C, R>(State(app_state): State<AppState<S, C, R>>) -> Response
where
    S: MappingStore,
    C: TrackerConnector,
    R: Rewriter,
{
    match app_state.engine().agent().sweep().await {
        Ok(retried) => Json(json!({ "success": true, "retried": retried })).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to list flagged Jules tasks");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "Failed to retry Jules tasks." })),
            )
                .into_response()
        }
    }
}

pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "GET")],
        Json(json!({ "error": "Only GET requests are accepted." })),
    )
        .into_response()
}
