//! Mirroring an issue into Linear.
//!
//! Entered from `opened`, from `labeled` with the promote label, and from
//! `milestoned` on an issue that has no mirror yet.

use tracing::{info, warn};

use super::Context;
use crate::effects::{
    LabelFilter, LabelMatch, NewAttachment, NewComment, NewIssue, SourceApi, SourceInterpreter,
    TargetApi, TargetInterpreter,
};
use crate::error::{Outcome, SyncError};
use crate::markdown;
use crate::rewrite::Rewriter;
use crate::store::MappingStore;
use crate::types::SyncedIssue;

/// A freshly created mirror.
pub(super) struct Mirrored {
    pub synced: SyncedIssue,
    /// Ticket name, e.g. `TEAM-7`.
    pub ticket: String,
    /// Secondary calls that failed after the Linear issue was created.
    pub incomplete: Vec<&'static str>,
}

impl<S, Src, Tgt, R> Context<'_, S, Src, Tgt, R>
where
    S: MappingStore,
    Src: SourceInterpreter,
    Tgt: TargetInterpreter,
    R: Rewriter,
{
    pub(super) async fn create(&self, replay_comments: bool) -> Result<Outcome, SyncError> {
        let issue = self.issue;

        if let Some(synced) = self.existing_mirror().await? {
            return Ok(Outcome::skipped(format!(
                "Not creating: {} exists as {} (repo: {}).",
                issue.id, synced.linear_issue_id, self.repo.id
            )));
        }
        if markdown::looks_like_ticket_title(&issue.title) {
            return Ok(self.ticket_title_skip());
        }

        let mirrored = self.mirror_issue(replay_comments).await?;
        let mut message = format!(
            "Created Linear ticket {} ({}) for GitHub issue {} (repo: {}).",
            mirrored.ticket, mirrored.synced.linear_issue_id, issue.number, self.repo.id
        );
        if !mirrored.incomplete.is_empty() {
            message.push_str(&format!(" Failed: {}.", mirrored.incomplete.join(", ")));
        }
        Ok(Outcome::done(message))
    }

    /// The mirror of this issue, looked up by number and then by issue id.
    pub(super) async fn existing_mirror(&self) -> Result<Option<SyncedIssue>, SyncError> {
        match &self.synced {
            Some(synced) => Ok(Some(synced.clone())),
            None => Ok(self
                .store
                .find_synced_issue_by_id(self.repo.id, self.issue.id)
                .await?),
        }
    }

    /// Issues whose title already carries a ticket key were created from
    /// Linear and are never mirrored back.
    pub(super) fn ticket_title_skip(&self) -> Outcome {
        Outcome::skipped(format!(
            "Skipping creation as issue {}'s title seems to contain a Linear ticket ID.",
            self.issue.number
        ))
    }

    /// Creates the Linear issue and links both sides.
    ///
    /// After the Linear issue exists, the mapping row, the GitHub title/body
    /// patch and the attachment are issued concurrently. Only a failed mapping
    /// write fails the transition; the other two are logged and listed in
    /// [`Mirrored::incomplete`].
    pub(super) async fn mirror_issue(&self, replay_comments: bool) -> Result<Mirrored, SyncError> {
        let issue = self.issue;
        let repo = self.repo;
        let team = &self.link.team;

        let reworded = self.maybe_reword(&issue.body).await;
        let body = reworded.as_deref().unwrap_or(&issue.body);

        let label_ids = self.target_label_ids().await?;
        let assignee_id = match &issue.assignee {
            Some(assignee) => self
                .store
                .find_user(assignee.id)
                .await?
                .map(|user| user.linear_user_id),
            None => None,
        };

        let created = self
            .target
            .create_issue(NewIssue {
                team_id: team.team_id.clone(),
                title: issue.title.clone(),
                description: markdown::adapt(body, self.attribution().as_ref()),
                label_ids,
                assignee_id,
            })
            .await?;
        let failed = || {
            SyncError::api(format!(
                "Failed to create ticket for {} (repo: {}).",
                issue.number, repo.id
            ))
        };
        let linear_issue_id = match created.id {
            Some(id) if created.success => id,
            _ => return Err(failed()),
        };

        let Some(linear_issue) = self.target.issue(linear_issue_id.clone()).await? else {
            return Err(failed());
        };
        let Some(ticket) = linear_issue.ticket_name() else {
            return Err(failed());
        };
        info!(issue = %issue.number, ticket = %ticket, "Created Linear ticket");

        let synced = SyncedIssue {
            github_repo_id: repo.id,
            github_issue_number: issue.number,
            github_issue_id: issue.id,
            linear_issue_id: linear_issue.id.clone(),
            linear_issue_number: linear_issue.number,
            linear_team_id: team.team_id.clone(),
        };

        let (stored, patched, attached) = tokio::join!(
            self.store.create_synced_issue(synced),
            self.source.update_issue(
                issue.number,
                Some(markdown::ticket_title(&ticket, &issue.title)),
                Some(markdown::with_backlink(body, &ticket, &linear_issue.url)),
            ),
            self.target.create_attachment(NewAttachment {
                issue_id: linear_issue.id.clone(),
                title: format!("GitHub Issue {} - {}", issue.number, repo.name),
                subtitle: "Synchronized".to_string(),
                url: format!(
                    "https://github.com/{}/issues/{}",
                    repo.name, issue.number.0
                ),
            }),
        );

        let mut incomplete = Vec::new();
        if let Err(e) = patched {
            warn!(issue = %issue.number, ticket = %ticket, error = %e, "Failed to update GitHub issue title");
            incomplete.push("GitHub title update");
        }
        match attached {
            Ok(result) if result.success => {}
            Ok(_) => {
                warn!(ticket = %ticket, "Linear rejected the GitHub attachment");
                incomplete.push("GitHub attachment");
            }
            Err(e) => {
                warn!(ticket = %ticket, error = %e, "Failed to create GitHub attachment");
                incomplete.push("GitHub attachment");
            }
        }
        let synced = stored?;

        if replay_comments {
            self.replay_comments(&synced).await?;
        }

        Ok(Mirrored {
            synced,
            ticket,
            incomplete,
        })
    }

    /// The team's labels matching the issue's labels, plus the public label.
    async fn target_label_ids(&self) -> Result<Vec<String>, SyncError> {
        let team = &self.link.team;
        let promote = &self.config.labels.promote_label;
        let names: Vec<String> = self
            .issue
            .labels
            .iter()
            .filter(|name| !name.eq_ignore_ascii_case(promote))
            .cloned()
            .collect();

        let mut ids: Vec<String> = self
            .target
            .find_labels(LabelFilter {
                team_id: Some(team.team_id.clone()),
                name: LabelMatch::AnyOf(names),
                include_archived: true,
            })
            .await?
            .into_iter()
            .map(|label| label.id)
            .collect();

        if let Some(public) = &team.public_label_id {
            if !ids.contains(public) {
                ids.push(public.clone());
            }
        }
        Ok(ids)
    }

    /// Copies the issue's comments, oldest first.
    async fn replay_comments(&self, synced: &SyncedIssue) -> Result<(), SyncError> {
        let comments = self.source.list_comments(self.issue.number).await?;
        for comment in comments {
            let result = self
                .target
                .create_comment(NewComment {
                    issue_id: synced.linear_issue_id.clone(),
                    body: markdown::adapt(&comment.body, None),
                    display_name: None,
                    display_icon_url: None,
                })
                .await?;
            if !result.success {
                warn!(comment = comment.id, issue = %self.issue.number, "Failed to replay comment");
            }
        }
        Ok(())
    }
}
