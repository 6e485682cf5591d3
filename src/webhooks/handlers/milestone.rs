//! `milestoned` / `demilestoned`.
//!
//! Milestones map to cycles, or to projects when their description carries
//! the `(Project)` marker. The `MilestoneLink` row caches the mapping so each
//! milestone creates at most one Linear resource.

use chrono::Utc;

use super::Context;
use crate::effects::{
    IssueUpdate, NewCycle, NewProject, SourceInterpreter, TargetApi, TargetInterpreter,
};
use crate::error::{Outcome, SyncError};
use crate::markdown;
use crate::rewrite::Rewriter;
use crate::store::MappingStore;
use crate::types::{MilestoneKind, MilestoneLink};
use crate::webhooks::events::Milestone;

impl<S, Src, Tgt, R> Context<'_, S, Src, Tgt, R>
where
    S: MappingStore,
    Src: SourceInterpreter,
    Tgt: TargetInterpreter,
    R: Rewriter,
{
    pub(super) async fn milestone_changed(&self, milestoned: bool) -> Result<Outcome, SyncError> {
        let issue = self.issue;

        let synced = match &self.synced {
            Some(synced) => synced.clone(),
            None if !milestoned => {
                return Ok(Outcome::skipped(format!(
                    "Skipping milestone removal for {}: not synced (repo: {}).",
                    issue.id, self.repo.id
                )));
            }
            // A milestone can be the first sync trigger for an issue.
            None => match self.existing_mirror().await? {
                Some(synced) => synced,
                None if markdown::looks_like_ticket_title(&issue.title) => {
                    return Ok(self.ticket_title_skip());
                }
                None => self.mirror_issue(true).await?.synced,
            },
        };

        let Some(milestone) = &issue.milestone else {
            return Ok(Outcome::skipped(format!(
                "Skipping over removal of milestone for issue {}.",
                issue.number
            )));
        };

        let link = match self
            .store
            .find_milestone(self.repo.id, milestone.number)
            .await?
        {
            Some(link) => link,
            None => {
                if markdown::milestone_caused_by_sync(&milestone.description) {
                    return Ok(Outcome::skipped(format!(
                        "Skipping over milestone \"{}\" because it is caused by sync",
                        milestone.title
                    )));
                }
                self.create_milestone_resource(milestone).await?
            }
        };

        let kind = link.kind;
        let update = match kind {
            MilestoneKind::Cycle => IssueUpdate {
                cycle_id: Some(link.resource_id),
                ..IssueUpdate::default()
            },
            MilestoneKind::Project => IssueUpdate {
                project_id: Some(link.resource_id),
                ..IssueUpdate::default()
            },
        };
        let result = self
            .target
            .update_issue(synced.linear_issue_id.clone(), update)
            .await?;
        if !result.success {
            return Err(SyncError::api(format!(
                "Failed to add Linear ticket to {} for {}.",
                kind.noun(),
                issue.id
            )));
        }
        Ok(Outcome::done(format!(
            "Added Linear ticket to {} for {}.",
            kind.noun(),
            issue.id
        )))
    }

    async fn create_milestone_resource(
        &self,
        milestone: &Milestone,
    ) -> Result<MilestoneLink, SyncError> {
        let team_id = self.link.team.team_id.clone();
        let description = markdown::milestone_description(&milestone.description);
        let now = Utc::now();

        let (kind, result) = if markdown::is_project_milestone(&milestone.description) {
            let project = NewProject {
                team_ids: vec![team_id.clone()],
                name: milestone.title.clone(),
                description,
                start_date: now,
                target_date: milestone.due_on,
            };
            (MilestoneKind::Project, self.target.create_project(project).await?)
        } else {
            let cycle = NewCycle {
                team_id: team_id.clone(),
                name: milestone.title.clone(),
                description,
                starts_at: now,
                ends_at: milestone.due_on,
            };
            (MilestoneKind::Cycle, self.target.create_cycle(cycle).await?)
        };

        let resource_id = match result.id {
            Some(id) if result.success => id,
            _ => {
                return Err(SyncError::api(format!(
                    "Failed to create Linear {} for milestone {}.",
                    kind.noun(),
                    milestone.id
                )));
            }
        };

        let link = self
            .store
            .create_milestone(MilestoneLink {
                github_repo_id: self.repo.id,
                milestone_number: milestone.number,
                resource_id,
                kind,
                linear_team_id: team_id,
            })
            .await?;
        Ok(link)
    }
}
