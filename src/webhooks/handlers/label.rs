//! `labeled` / `unlabeled` for ordinary and priority labels.

use tracing::warn;

use super::Context;
use crate::effects::{
    IssueUpdate, LabelFilter, LabelMatch, SourceInterpreter, TargetApi, TargetInterpreter,
};
use crate::error::{Outcome, SyncError};
use crate::rewrite::Rewriter;
use crate::store::MappingStore;

/// The mirrored label set after `matched` is applied or removed.
///
/// Labels in `matched` are dropped from `current` and re-added (at the
/// front) only when `labeled`.
pub(crate) fn recompute_labels(current: &[String], matched: &[String], labeled: bool) -> Vec<String> {
    let mut ids: Vec<String> = if labeled { matched.to_vec() } else { Vec::new() };
    ids.extend(current.iter().filter(|id| !matched.contains(id)).cloned());
    ids
}

impl<S, Src, Tgt, R> Context<'_, S, Src, Tgt, R>
where
    S: MappingStore,
    Src: SourceInterpreter,
    Tgt: TargetInterpreter,
    R: Rewriter,
{
    pub(super) async fn label_changed(
        &self,
        labeled: bool,
        name: &str,
    ) -> Result<Outcome, SyncError> {
        let issue = self.issue;
        let Some(synced) = &self.synced else {
            return Ok(Outcome::not_synced("label", issue.number));
        };
        let repo_id = self.repo.id;

        // Priority only flows GitHub -> Linear; removal clears it.
        let mut priority_changed = false;
        if let Some(priority) = self.config.labels.priority_for(name) {
            let update = IssueUpdate {
                priority: Some(labeled.then_some(priority)),
                ..IssueUpdate::default()
            };
            let result = self
                .target
                .update_issue(synced.linear_issue_id.clone(), update)
                .await?;
            if result.success {
                priority_changed = true;
            } else {
                warn!(issue = %issue.number, label = name, "Failed to update Linear priority");
            }
        }

        let matched: Vec<String> = self
            .target
            .find_labels(LabelFilter {
                team_id: None,
                name: LabelMatch::Contains(name.to_string()),
                include_archived: false,
            })
            .await?
            .into_iter()
            .map(|label| label.id)
            .collect();

        if matched.is_empty() {
            if priority_changed {
                let verb = if labeled { "Set" } else { "Cleared" };
                return Ok(Outcome::done(format!(
                    "{verb} priority from label \"{name}\" on Linear ticket for {} (repo: {repo_id}).",
                    issue.id
                )));
            }
            return Ok(Outcome::skipped(format!(
                "Skipping label \"{name}\" for {} as no Linear label was found (repo: {repo_id}).",
                issue.id
            )));
        }

        let current = self
            .target
            .issue(synced.linear_issue_id.clone())
            .await?
            .map(|linear| linear.label_ids)
            .unwrap_or_default();

        let update = IssueUpdate {
            label_ids: Some(recompute_labels(&current, &matched, labeled)),
            ..IssueUpdate::default()
        };
        let result = self
            .target
            .update_issue(synced.linear_issue_id.clone(), update)
            .await?;

        let verb = if labeled { "add" } else { "remove" };
        if !result.success {
            return Err(SyncError::api(format!(
                "Failed to {verb} label \"{name}\" on {} for {} (repo: {repo_id}).",
                synced.linear_issue_id, issue.id
            )));
        }
        let done = if labeled { "Added" } else { "Removed" };
        Ok(Outcome::done(format!(
            "{done} label \"{name}\" on Linear ticket for {} (repo: {repo_id}).",
            issue.id
        )))
    }
}
