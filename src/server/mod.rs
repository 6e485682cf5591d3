//! HTTP surface of the sync service.
//!
//! # Endpoints
//!
//! - `POST /webhook` - Runs one GitHub delivery through the sync engine
//! - `GET /jules/retry` - Retries flagged agent tasks (called by an external cron)
//! - `POST /linear/save` - Registers or updates a Linear team
//! - `GET /health` - Returns 200 if the server is running

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::connector::TrackerConnector;
use crate::rewrite::Rewriter;
use crate::store::MappingStore;
use crate::webhooks::SyncEngine;

pub mod health;
pub mod jules;
pub mod team;
pub mod webhook;

pub use health::health_handler;
pub use jules::{method_not_allowed, retry_handler};
pub use team::save_team_handler;
pub use webhook::webhook_handler;

/// Shared application state, handed to every handler through `State`.
pub struct AppState<S, C, R> {
    engine: Arc<SyncEngine<S, C, R>>,
}

impl<S, C, R> AppState<S, C, R> {
    pub fn new(engine: Arc<SyncEngine<S, C, R>>) -> Self {
        AppState { engine }
    }

    pub fn engine(&self) -> &SyncEngine<S, C, R> {
        &self.engine
    }
}

impl<S, C, R> Clone for AppState<S, C, R> {
    fn clone(&self) -> Self {
        AppState {
            engine: Arc::clone(&self.engine),
        }
    }
}

/// Builds the router with all endpoints.
pub fn build_router<S, C, R>(app_state: AppState<S, C, R>) -> Router
where
    S: MappingStore,
    C: TrackerConnector,
    R: Rewriter,
{
    Router::new()
        .route("/webhook", post(webhook_handler::<S, C, R>))
        .route(
            "/jules/retry",
            get(retry_handler::<S, C, R>).fallback(method_not_allowed),
        )
        .route("/linear/save", post(save_team_handler::<S, C, R>))
        .route("/health", get(health_handler))
        .with_state(app_state)
}

#[cfg(test)]
mod tests;
