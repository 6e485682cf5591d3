//! `POST /webhook`.
//!
//! The body is handed to the engine as the exact bytes received, since the
//! signature is computed over them. Every failure becomes a JSON
//! `{ "success": false, "error": ... }` with the status of the underlying
//! `SyncError`.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use super::AppState;
use crate::connector::TrackerConnector;
use crate::error::{Outcome, SyncError};
use crate::rewrite::Rewriter;
use crate::store::MappingStore;
use crate::webhooks::{EVENT_HEADER, SIGNATURE_HEADER};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl WebhookError {
    fn status(&self) -> StatusCode {
        match self {
            WebhookError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            WebhookError::Sync(e) => StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "Webhook failed");
        } else {
            debug!(error = %self, status = status.as_u16(), "Webhook rejected");
        }
        let body = json!({ "success": false, "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Body of a successful webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    /// True when the delivery was a deliberate no-op.
    pub skipped: bool,
}

impl From<Outcome> for WebhookResponse {
    fn from(outcome: Outcome) -> Self {
        WebhookResponse {
            success: true,
            skipped: outcome.is_skipped(),
            message: outcome.message().to_string(),
        }
    }
}

pub async fn webhook_handler<S, C, R>(
    State(app_state): State<AppState<S, C, R>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookError>
where
    S: MappingStore,
    C: TrackerConnector,
    R: Rewriter,
{
    let event_type = header(&headers, EVENT_HEADER).ok_or(WebhookError::MissingHeader(EVENT_HEADER))?;
    let signature = header(&headers, SIGNATURE_HEADER);

    let outcome = app_state
        .engine()
        .handle_webhook(event_type, signature, &body)
        .await?;
    Ok(Json(outcome.into()))
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
