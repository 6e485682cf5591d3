//! The periodic sweep over flagged tasks.

use chrono::Utc;
use tracing::{debug, error, info, instrument};

use super::{AgentError, JulesAgent};
use crate::connector::TrackerConnector;
use crate::effects::SourceApi;
use crate::store::{MappingStore, StoreError};
use crate::types::JulesTask;

impl<S: MappingStore, C: TrackerConnector> JulesAgent<S, C> {
    /// Re-applies the agent label to every flagged task.
    ///
    /// Tasks are processed one after another. A failing task is logged and
    /// left flagged; it never aborts the sweep. Only listing the flagged tasks
    /// can fail. Returns the number of tasks retried.
    #[instrument(skip(self))]
    pub async fn sweep(&self) -> Result<usize, StoreError> {
        let flagged = self.store.flagged_jules_tasks().await?;
        if flagged.is_empty() {
            return Ok(0);
        }

        let mut retried = 0;
        for task in &flagged {
            match self.retry_task(task).await {
                Ok(true) => retried += 1,
                Ok(false) => {}
                Err(e) => error!(task_id = task.id, error = %e, "Failed retrying Jules task"),
            }
        }

        info!(flagged = flagged.len(), retried, "Jules retry sweep finished");
        Ok(retried)
    }

    /// Returns `false` if the task was skipped.
    async fn retry_task(&self, task: &JulesTask) -> Result<bool, AgentError> {
        let number = task.github_issue_number;

        let Some(link) = self.repo_link(task.github_repo_id).await? else {
            debug!(task_id = task.id, repo_id = %task.github_repo_id, "No link for repository");
            return Ok(false);
        };
        let token = self.credentials.github_token(&link)?;
        let source = self.connector.source(&link.repo.repo_name, &token)?;

        let issue = source.get_issue(number).await?;
        if issue.has_label(&self.config.human_label) {
            info!(issue = %number, "Human override label present, not retrying");
            return Ok(false);
        }

        // Queue label off first, then the active label on.
        if let Err(e) = source
            .remove_label(number, self.config.queued_label.clone())
            .await
        {
            debug!(issue = %number, error = %e, "Queue label not found, continuing");
        }
        source
            .add_labels(number, vec![self.config.active_label.clone()])
            .await?;

        self.store.record_jules_retry(task.id, Utc::now()).await?;
        info!(issue = %number, retry_count = task.retry_count + 1, "Retried Jules task");
        Ok(true)
    }
}
