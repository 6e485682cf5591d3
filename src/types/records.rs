//! Persisted records linking the two trackers.
//!
//! All of these are owned by the mapping store. The engine reads them on every
//! webhook and writes them only at well-defined points (link setup, first
//! mirror of an issue, first sight of a milestone, agent assignment).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{GithubUserId, IssueId, IssueNumber, RepoId, RepoName};

/// A GitHub repository registered for syncing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRepo {
    pub repo_id: RepoId,
    /// `owner/name`.
    pub repo_name: RepoName,
    /// Shared secret GitHub signs deliveries with. `None` means the empty string.
    pub webhook_secret: Option<String>,
}

/// A Linear team and the well-known state/label IDs the engine needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetTeam {
    pub team_id: String,
    pub team_name: String,
    /// Label applied to every mirrored issue.
    pub public_label_id: Option<String>,
    pub to_do_state_id: String,
    pub done_state_id: String,
    pub canceled_state_id: String,
}

/// A credential encrypted by the credential cipher, stored as hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecret {
    pub ciphertext: String,
    pub iv: String,
}

/// One GitHub repository + user linked to one Linear team + user.
///
/// `github_user_id == None` marks the repository's anonymous fallback link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sync {
    pub id: u64,
    pub github_repo_id: RepoId,
    pub github_user_id: Option<GithubUserId>,
    pub linear_user_id: Option<String>,
    pub linear_team_id: String,
    pub github_api_key: EncryptedSecret,
    pub linear_api_key: EncryptedSecret,
}

impl Sync {
    pub fn is_anonymous_fallback(&self) -> bool {
        self.github_user_id.is_none()
    }
}

/// A `Sync` joined with its repository and team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncLink {
    pub sync: Sync,
    pub repo: SourceRepo,
    pub team: TargetTeam,
}

/// The idempotency key for issue mirroring. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncedIssue {
    pub github_repo_id: RepoId,
    pub github_issue_number: IssueNumber,
    pub github_issue_id: IssueId,
    pub linear_issue_id: String,
    pub linear_issue_number: u64,
    pub linear_team_id: String,
}

/// Whether a milestone is mirrored as a Linear cycle or project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
    Cycle,
    Project,
}

impl MilestoneKind {
    /// `cycle` / `project`, for messages.
    pub fn noun(self) -> &'static str {
        match self {
            MilestoneKind::Cycle => "cycle",
            MilestoneKind::Project => "project",
        }
    }
}

/// Maps a GitHub milestone to the Linear cycle or project created for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneLink {
    pub github_repo_id: RepoId,
    pub milestone_number: u64,
    /// ID of the Linear cycle or project.
    pub resource_id: String,
    pub kind: MilestoneKind,
    pub linear_team_id: String,
}

/// Maps a GitHub user to a Linear user for assignee translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLink {
    pub github_user_id: GithubUserId,
    pub linear_user_id: String,
}

/// Identity of the issue a `JulesTask` tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JulesTaskKey {
    pub github_repo_id: RepoId,
    pub github_issue_id: IssueId,
    pub github_issue_number: IssueNumber,
}

/// Retry bookkeeping for an issue handed to the automation agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JulesTask {
    pub id: u64,
    pub github_repo_id: RepoId,
    /// Unique per task.
    pub github_issue_id: IssueId,
    pub github_issue_number: IssueNumber,
    pub flagged_for_retry: bool,
    /// Only ever increments.
    pub retry_count: u32,
    pub last_retry_at: Option<DateTime<Utc>>,
}

impl JulesTask {
    pub fn key(&self) -> JulesTaskKey {
        JulesTaskKey {
            github_repo_id: self.github_repo_id,
            github_issue_id: self.github_issue_id,
            github_issue_number: self.github_issue_number,
        }
    }
}
