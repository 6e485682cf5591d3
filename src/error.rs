//! Error taxonomy and the success-shaped result of a webhook.
//!
//! A webhook either fails (`SyncError`, mapped onto an HTTP status) or
//! succeeds with an `Outcome`. A deliberate no-op is an `Outcome::Skipped`,
//! never an error.

use thiserror::Error;

use crate::credentials::CredentialError;
use crate::store::StoreError;
use crate::transport::RemoteApiError;
use crate::types::{IssueNumber, RepoId};
use crate::webhooks::ParseError;

/// Errors that abort a transition.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The delivery's signature does not match the repository's secret.
    #[error("GH webhook secret doesn't match (repo: {repo_id})")]
    Authentication { repo_id: RepoId },

    /// No sync link (or other required record) exists.
    #[error("{0}")]
    NotFound(String),

    /// A remote mutation reported failure.
    #[error("{message}")]
    Api { message: String, status: u16 },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Remote(#[from] RemoteApiError),

    #[error("invalid payload: {0}")]
    Parse(#[from] ParseError),

    #[error("credential error: {0}")]
    Credentials(#[from] CredentialError),
}

impl SyncError {
    /// An `Api` error with the default 500 status.
    pub fn api(message: impl Into<String>) -> Self {
        SyncError::Api {
            message: message.into(),
            status: 500,
        }
    }

    /// The HTTP status this error is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            SyncError::Authentication { .. } => 403,
            SyncError::NotFound(_) => 404,
            SyncError::Api { status, .. } => *status,
            SyncError::Parse(_) => 400,
            SyncError::Store(_) | SyncError::Remote(_) | SyncError::Credentials(_) => 500,
        }
    }
}

/// The result of a transition that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Side effects were applied.
    Done(String),
    /// Nothing to do. The message says which stage was skipped and why.
    Skipped(String),
}

impl Outcome {
    pub fn done(message: impl Into<String>) -> Self {
        Outcome::Done(message.into())
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Outcome::Skipped(message.into())
    }

    /// `Skipping over <stage> for issue #<n> as it is not synced.`
    pub fn not_synced(stage: &str, number: IssueNumber) -> Self {
        Outcome::Skipped(format!(
            "Skipping over {stage} for issue {number} as it is not synced."
        ))
    }

    /// `Skipping over <stage> for issue #<n> as it is caused by sync.`
    pub fn caused_by_sync(stage: &str, number: IssueNumber) -> Self {
        Outcome::Skipped(format!(
            "Skipping over {stage} for issue {number} as it is caused by sync."
        ))
    }

    pub fn message(&self) -> &str {
        match self {
            Outcome::Done(m) | Outcome::Skipped(m) => m,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }
}
