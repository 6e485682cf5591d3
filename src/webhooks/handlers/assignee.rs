//! `assigned` / `unassigned`.

use super::Context;
use crate::effects::{IssueUpdate, SourceInterpreter, TargetApi, TargetInterpreter};
use crate::error::{Outcome, SyncError};
use crate::rewrite::Rewriter;
use crate::store::MappingStore;
use crate::types::SyncedIssue;
use crate::webhooks::events::Actor;

impl<S, Src, Tgt, R> Context<'_, S, Src, Tgt, R>
where
    S: MappingStore,
    Src: SourceInterpreter,
    Tgt: TargetInterpreter,
    R: Rewriter,
{
    pub(super) async fn assignee_changed(
        &self,
        assigned: bool,
        assignee: Option<&Actor>,
    ) -> Result<Outcome, SyncError> {
        let issue = self.issue;
        let Some(synced) = &self.synced else {
            return Ok(Outcome::not_synced("assignee", issue.number));
        };

        let current = self
            .target
            .issue(synced.linear_issue_id.clone())
            .await?
            .and_then(|linear| linear.assignee_id);

        if assigned {
            self.assign(synced, current, assignee).await
        } else {
            self.unassign(synced, current).await
        }
    }

    /// Falls back to the issue's remaining assignee, if any.
    ///
    /// Multi-assignee issues send one `unassigned` per removed user, so the
    /// write only happens when the mirrored assignee actually changes.
    async fn unassign(
        &self,
        synced: &SyncedIssue,
        current: Option<String>,
    ) -> Result<Outcome, SyncError> {
        let issue = self.issue;
        let remaining = match &issue.assignee {
            Some(actor) => self
                .store
                .find_user(actor.id)
                .await?
                .map(|user| user.linear_user_id),
            None => None,
        };

        if remaining == current {
            return Ok(Outcome::skipped(format!(
                "Assignee of Linear ticket for GitHub issue {} is already up to date.",
                issue.number
            )));
        }

        let result = self
            .target
            .update_issue(
                synced.linear_issue_id.clone(),
                IssueUpdate {
                    assignee_id: Some(remaining),
                    ..IssueUpdate::default()
                },
            )
            .await?;
        if !result.success {
            return Err(SyncError::api(format!(
                "Failed to unassign on {} for {} (repo: {}).",
                synced.linear_issue_id, issue.id, self.repo.id
            )));
        }
        Ok(Outcome::done(format!(
            "Removed assignee from Linear ticket for GitHub issue {}.",
            issue.number
        )))
    }

    async fn assign(
        &self,
        synced: &SyncedIssue,
        current: Option<String>,
        assignee: Option<&Actor>,
    ) -> Result<Outcome, SyncError> {
        let issue = self.issue;
        let Some(assignee) = assignee.or(issue.assignee.as_ref()) else {
            return Ok(Outcome::skipped(format!(
                "Skipping assignee for {}: no assignee in payload.",
                issue.id
            )));
        };

        let Some(user) = self.store.find_user(assignee.id).await? else {
            return Ok(Outcome::skipped(format!(
                "Skipping assignee for {}: Linear user not found for GH user {}",
                issue.id, assignee.login
            )));
        };

        if current.as_deref() == Some(user.linear_user_id.as_str()) {
            return Ok(Outcome::skipped(format!(
                "Assignee of Linear ticket for GitHub issue {} is already up to date.",
                issue.number
            )));
        }

        let result = self
            .target
            .update_issue(
                synced.linear_issue_id.clone(),
                IssueUpdate {
                    assignee_id: Some(Some(user.linear_user_id)),
                    ..IssueUpdate::default()
                },
            )
            .await?;
        if !result.success {
            return Err(SyncError::api(format!(
                "Failed to assign on {} for {} (repo: {}).",
                synced.linear_issue_id, issue.id, self.repo.id
            )));
        }
        Ok(Outcome::done(format!(
            "Assigned {} for {} (repo: {}).",
            synced.linear_issue_id, issue.id, self.repo.id
        )))
    }
}
