//! Core domain types for the sync engine.

pub mod ids;
pub mod records;

pub use ids::{GithubUserId, IssueId, IssueNumber, RepoId, RepoName};
pub use records::{
    EncryptedSecret, JulesTask, JulesTaskKey, MilestoneKind, MilestoneLink, SourceRepo, Sync,
    SyncLink, SyncedIssue, TargetTeam, UserLink,
};
