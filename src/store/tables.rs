//! The record tables behind the local store implementations.
//!
//! `Tables` is plain data plus synchronous query/mutation methods. Backends
//! wrap it in a lock and decide whether mutations are persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StoreError;
use crate::types::{
    GithubUserId, IssueId, IssueNumber, JulesTask, JulesTaskKey, MilestoneLink, RepoId,
    SourceRepo, Sync, SyncLink, SyncedIssue, TargetTeam, UserLink,
};

/// Current on-disk schema version.
pub const SCHEMA_VERSION: u32 = 1;

fn schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tables {
    #[serde(default = "schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub repos: Vec<SourceRepo>,
    #[serde(default)]
    pub teams: Vec<TargetTeam>,
    #[serde(default)]
    pub syncs: Vec<Sync>,
    #[serde(default)]
    pub users: Vec<UserLink>,
    #[serde(default)]
    pub synced_issues: Vec<SyncedIssue>,
    #[serde(default)]
    pub milestones: Vec<MilestoneLink>,
    #[serde(default)]
    pub jules_tasks: Vec<JulesTask>,
    #[serde(default)]
    pub next_id: u64,
}

impl Tables {
    pub fn new() -> Self {
        Tables {
            schema_version: SCHEMA_VERSION,
            ..Tables::default()
        }
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Finds the link for a repository, optionally scoped to one sender.
    ///
    /// Without a user, the repository's user-less (anonymous) link is
    /// preferred, falling back to any link for the repository.
    pub fn find_link(&self, repo_id: RepoId, user: Option<GithubUserId>) -> Option<SyncLink> {
        let sync = match user {
            Some(user) => self
                .syncs
                .iter()
                .find(|s| s.github_repo_id == repo_id && s.github_user_id == Some(user)),
            None => self
                .syncs
                .iter()
                .find(|s| s.github_repo_id == repo_id && s.is_anonymous_fallback())
                .or_else(|| self.syncs.iter().find(|s| s.github_repo_id == repo_id)),
        }?;

        let repo = self.find_repo(repo_id)?;
        let team = self.find_team(&sync.linear_team_id)?;

        Some(SyncLink {
            sync: sync.clone(),
            repo,
            team,
        })
    }

    pub fn find_repo(&self, repo_id: RepoId) -> Option<SourceRepo> {
        self.repos.iter().find(|r| r.repo_id == repo_id).cloned()
    }

    pub fn find_team(&self, team_id: &str) -> Option<TargetTeam> {
        self.teams.iter().find(|t| t.team_id == team_id).cloned()
    }

    pub fn upsert_repo(&mut self, repo: SourceRepo) {
        match self.repos.iter_mut().find(|r| r.repo_id == repo.repo_id) {
            Some(existing) => *existing = repo,
            None => self.repos.push(repo),
        }
    }

    pub fn upsert_team(&mut self, team: TargetTeam) {
        match self.teams.iter_mut().find(|t| t.team_id == team.team_id) {
            Some(existing) => *existing = team,
            None => self.teams.push(team),
        }
    }

    /// Inserts a sync link, assigning its ID.
    ///
    /// At most one link may exist per (repository, user) pair, and at most one
    /// anonymous link per repository.
    pub fn create_sync(&mut self, mut sync: Sync) -> Result<Sync, StoreError> {
        let clash = self.syncs.iter().any(|s| {
            s.github_repo_id == sync.github_repo_id && s.github_user_id == sync.github_user_id
        });
        if clash {
            return Err(StoreError::Duplicate(format!(
                "sync for repo {} and user {:?}",
                sync.github_repo_id, sync.github_user_id
            )));
        }
        sync.id = self.allocate_id();
        self.syncs.push(sync.clone());
        Ok(sync)
    }

    pub fn find_user(&self, user: GithubUserId) -> Option<UserLink> {
        self.users.iter().find(|u| u.github_user_id == user).cloned()
    }

    pub fn upsert_user(&mut self, link: UserLink) {
        match self
            .users
            .iter_mut()
            .find(|u| u.github_user_id == link.github_user_id)
        {
            Some(existing) => *existing = link,
            None => self.users.push(link),
        }
    }

    pub fn find_synced_issue(&self, repo_id: RepoId, number: IssueNumber) -> Option<SyncedIssue> {
        self.synced_issues
            .iter()
            .find(|s| s.github_repo_id == repo_id && s.github_issue_number == number)
            .cloned()
    }

    pub fn find_synced_issue_by_id(&self, repo_id: RepoId, issue_id: IssueId) -> Option<SyncedIssue> {
        self.synced_issues
            .iter()
            .find(|s| s.github_repo_id == repo_id && s.github_issue_id == issue_id)
            .cloned()
    }

    /// Records a mirrored issue. Rejects a second mapping for the same source issue.
    pub fn create_synced_issue(&mut self, issue: SyncedIssue) -> Result<SyncedIssue, StoreError> {
        let clash = self.synced_issues.iter().any(|s| {
            s.github_repo_id == issue.github_repo_id
                && (s.github_issue_id == issue.github_issue_id
                    || s.github_issue_number == issue.github_issue_number)
        });
        if clash {
            return Err(StoreError::Duplicate(format!(
                "synced issue {} in repo {}",
                issue.github_issue_number, issue.github_repo_id
            )));
        }
        self.synced_issues.push(issue.clone());
        Ok(issue)
    }

    pub fn find_milestone(&self, repo_id: RepoId, milestone_number: u64) -> Option<MilestoneLink> {
        self.milestones
            .iter()
            .find(|m| m.github_repo_id == repo_id && m.milestone_number == milestone_number)
            .cloned()
    }

    pub fn create_milestone(&mut self, link: MilestoneLink) -> Result<MilestoneLink, StoreError> {
        if self
            .find_milestone(link.github_repo_id, link.milestone_number)
            .is_some()
        {
            return Err(StoreError::Duplicate(format!(
                "milestone {} in repo {}",
                link.milestone_number, link.github_repo_id
            )));
        }
        self.milestones.push(link.clone());
        Ok(link)
    }

    /// Creates or updates the task for an issue, setting its retry flag.
    pub fn upsert_jules_task(&mut self, key: JulesTaskKey, flagged: bool) -> JulesTask {
        if let Some(task) = self
            .jules_tasks
            .iter_mut()
            .find(|t| t.github_issue_id == key.github_issue_id)
        {
            task.flagged_for_retry = flagged;
            return task.clone();
        }

        let task = JulesTask {
            id: self.allocate_id(),
            github_repo_id: key.github_repo_id,
            github_issue_id: key.github_issue_id,
            github_issue_number: key.github_issue_number,
            flagged_for_retry: flagged,
            retry_count: 0,
            last_retry_at: None,
        };
        self.jules_tasks.push(task.clone());
        task
    }

    pub fn find_jules_task(&self, issue_id: IssueId) -> Option<JulesTask> {
        self.jules_tasks
            .iter()
            .find(|t| t.github_issue_id == issue_id)
            .cloned()
    }

    pub fn flagged_jules_tasks(&self) -> Vec<JulesTask> {
        self.jules_tasks
            .iter()
            .filter(|t| t.flagged_for_retry)
            .cloned()
            .collect()
    }

    /// Clears the retry flag after a successful re-activation.
    pub fn record_jules_retry(
        &mut self,
        task_id: u64,
        at: DateTime<Utc>,
    ) -> Result<JulesTask, StoreError> {
        let task = self
            .jules_tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| StoreError::NotFound(format!("jules task {task_id}")))?;
        task.flagged_for_retry = false;
        task.retry_count += 1;
        task.last_retry_at = Some(at);
        Ok(task.clone())
    }
}
