//! Retry subsystem for issues handed to the Jules automation agent.
//!
//! Each `JulesTask` moves between two states:
//!
//! ```text
//! active ──(rate-limit comment found)──▶ flagged ──(sweep re-applies label)──▶ active
//! ```
//!
//! Two drivers move it:
//! - The delayed detector, scheduled when the agent label is applied. It runs
//!   on a `TaskTracker` after `check_delay` and is cancelled on shutdown.
//! - The sweep, run on an external schedule through `GET /jules/retry`.

mod detector;
mod sweep;

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::connector::TrackerConnector;
use crate::credentials::{CredentialError, CredentialResolver};
use crate::store::{MappingStore, StoreError};
use crate::transport::RemoteApiError;
use crate::types::{JulesTask, JulesTaskKey, RepoId, SyncLink};

pub use detector::is_rate_limited;

/// Where a task sits in the retry cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// The agent is (or should be) working on the issue.
    Active,
    /// The agent hit its concurrency limit; waiting for the next sweep.
    Flagged,
}

impl TaskState {
    pub fn of(task: &JulesTask) -> Self {
        if task.flagged_for_retry {
            TaskState::Flagged
        } else {
            TaskState::Active
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Remote(#[from] RemoteApiError),

    #[error("credential error: {0}")]
    Credentials(#[from] CredentialError),
}

/// Schedules rate-limit checks and retries flagged tasks.
pub struct JulesAgent<S, C> {
    store: Arc<S>,
    connector: Arc<C>,
    credentials: CredentialResolver,
    config: AgentConfig,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl<S, C> Clone for JulesAgent<S, C> {
    fn clone(&self) -> Self {
        JulesAgent {
            store: Arc::clone(&self.store),
            connector: Arc::clone(&self.connector),
            credentials: self.credentials.clone(),
            config: self.config.clone(),
            tracker: self.tracker.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<S: MappingStore, C: TrackerConnector> JulesAgent<S, C> {
    /// Detector checks are spawned on `tracker` and abandoned once `shutdown`
    /// is cancelled.
    pub fn new(
        store: Arc<S>,
        connector: Arc<C>,
        credentials: CredentialResolver,
        config: AgentConfig,
        tracker: TaskTracker,
        shutdown: CancellationToken,
    ) -> Self {
        JulesAgent {
            store,
            connector,
            credentials,
            config,
            tracker,
            shutdown,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Records an agent assignment and schedules the delayed check.
    ///
    /// The task is (re)set to active. The check runs in the background; this
    /// returns as soon as the task is stored.
    pub async fn assign(&self, key: JulesTaskKey) -> Result<JulesTask, StoreError> {
        let task = self.store.upsert_jules_task(key, false).await?;
        info!(
            issue = %key.github_issue_number,
            repo_id = %key.github_repo_id,
            delay_secs = self.config.check_delay.as_secs(),
            "Scheduled Jules rate-limit check"
        );
        self.schedule_check(key);
        Ok(task)
    }

    fn schedule_check(&self, key: JulesTaskKey) {
        let agent = self.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                _ = agent.shutdown.cancelled() => {
                    debug!(issue = %key.github_issue_number, "Rate-limit check cancelled");
                }
                _ = tokio::time::sleep(agent.config.check_delay) => {
                    if let Err(e) = agent.check_rate_limit(key).await {
                        warn!(
                            issue = %key.github_issue_number,
                            error = %e,
                            "Error checking for Jules task limit comment"
                        );
                    }
                }
            }
        });
    }

    /// Any link for the repository will do: the agent only needs a GitHub token.
    async fn repo_link(&self, repo_id: RepoId) -> Result<Option<SyncLink>, StoreError> {
        self.store.find_link(repo_id, None).await
    }
}

#[cfg(test)]
mod tests;
