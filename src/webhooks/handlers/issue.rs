//! `edited`, `closed` and `reopened`.

use tracing::warn;

use super::Context;
use crate::effects::{IssueUpdate, SourceApi, SourceInterpreter, TargetApi, TargetInterpreter};
use crate::error::{Outcome, SyncError};
use crate::markdown;
use crate::rewrite::Rewriter;
use crate::store::MappingStore;
use crate::types::TargetTeam;

/// The Linear state for a GitHub `state_reason`.
pub(crate) fn state_for_reason<'t>(team: &'t TargetTeam, state_reason: Option<&str>) -> &'t str {
    match state_reason {
        Some("not_planned") => &team.canceled_state_id,
        Some("completed") => &team.done_state_id,
        _ => &team.to_do_state_id,
    }
}

impl<S, Src, Tgt, R> Context<'_, S, Src, Tgt, R>
where
    S: MappingStore,
    Src: SourceInterpreter,
    Tgt: TargetInterpreter,
    R: Rewriter,
{
    pub(super) async fn edited(&self) -> Result<Outcome, SyncError> {
        let issue = self.issue;
        let Some(synced) = &self.synced else {
            return Ok(Outcome::not_synced("edit", issue.number));
        };

        let title = markdown::strip_title_prefix(&issue.title, synced.linear_issue_number);
        let (mut description, footer) = markdown::split_footer(&issue.body);

        if let Some(reworded) = self.maybe_reword(&description).await {
            let github_body = match &footer {
                Some(footer) => format!("{reworded}\n\n{footer}"),
                None => reworded.clone(),
            };
            if let Err(e) = self
                .source
                .update_issue(issue.number, None, Some(github_body))
                .await
            {
                warn!(issue = %issue.number, error = %e, "Failed to write reworded body to GitHub");
            }
            description = reworded;
        }

        let update = IssueUpdate {
            title: Some(title),
            description: Some(markdown::adapt(&description, None)),
            ..IssueUpdate::default()
        };
        let result = self
            .target
            .update_issue(synced.linear_issue_id.clone(), update)
            .await?;
        if !result.success {
            return Err(SyncError::api(format!(
                "Issue edit failed: {} for {} (repo: {}).",
                synced.linear_issue_id, issue.id, self.repo.id
            )));
        }
        Ok(Outcome::done(format!(
            "Edited Linear ticket for GitHub issue {}.",
            issue.number
        )))
    }

    pub(super) async fn state_changed(&self) -> Result<Outcome, SyncError> {
        let issue = self.issue;
        let Some(synced) = &self.synced else {
            return Ok(Outcome::not_synced("state change", issue.number));
        };

        let state_id = state_for_reason(&self.link.team, issue.state_reason.as_deref());
        let update = IssueUpdate {
            state_id: Some(state_id.to_string()),
            ..IssueUpdate::default()
        };
        let result = self
            .target
            .update_issue(synced.linear_issue_id.clone(), update)
            .await?;
        if !result.success {
            return Err(SyncError::api(format!(
                "State change failed: {} for {} (repo: {}).",
                synced.linear_issue_id, issue.id, self.repo.id
            )));
        }
        Ok(Outcome::done(format!(
            "Changed state of Linear ticket for GitHub issue {}.",
            issue.number
        )))
    }
}
