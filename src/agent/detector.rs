//! The delayed rate-limit check.

use tracing::{debug, info};

use super::{AgentError, JulesAgent};
use crate::config::AgentConfig;
use crate::connector::TrackerConnector;
use crate::effects::{SourceApi, SourceComment};
use crate::store::MappingStore;
use crate::types::JulesTaskKey;

/// True if the agent's latest comment reports that it is at its concurrent
/// task limit. Older limit comments from earlier attempts do not count.
pub fn is_rate_limited(comments: &[SourceComment], config: &AgentConfig) -> bool {
    comments
        .iter()
        .rev()
        .find(|comment| comment.author_login.contains(&config.bot_login))
        .is_some_and(|latest| latest.body.starts_with(&config.rate_limit_phrase))
}

impl<S: MappingStore, C: TrackerConnector> JulesAgent<S, C> {
    /// Flags the task and moves the issue to the queue label if the agent
    /// declined it. Returns whether the task was flagged.
    pub(super) async fn check_rate_limit(&self, key: JulesTaskKey) -> Result<bool, AgentError> {
        let number = key.github_issue_number;
        info!(issue = %number, "Checking for Jules task limit comment");

        let Some(link) = self.repo_link(key.github_repo_id).await? else {
            debug!(repo_id = %key.github_repo_id, "No link for repository, skipping check");
            return Ok(false);
        };
        let token = self.credentials.github_token(&link)?;
        let source = self.connector.source(&link.repo.repo_name, &token)?;

        let comments = source.list_comments(number).await?;
        if !is_rate_limited(&comments, &self.config) {
            debug!(issue = %number, "No task limit comment found");
            return Ok(false);
        }

        info!(issue = %number, "Task limit detected, marking for retry");
        self.store.upsert_jules_task(key, true).await?;

        // The active label may already be gone.
        if let Err(e) = source
            .remove_label(number, self.config.active_label.clone())
            .await
        {
            debug!(issue = %number, error = %e, "Active label not removed");
        }
        source
            .add_labels(number, vec![self.config.queued_label.clone()])
            .await?;

        info!(issue = %number, "Issue marked for retry and moved to queue");
        Ok(true)
    }
}
