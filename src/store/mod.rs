//! The mapping store: persisted links between the two trackers.
//!
//! Every idempotency decision the engine makes is a read against this store
//! followed by a write once the remote side effect succeeded. There are no
//! transactions; a narrow window exists in which two concurrent deliveries for
//! the same issue both observe "unmirrored". The unique constraints enforced
//! here turn the second write into a `StoreError::Duplicate`.

use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod file;
pub mod memory;
pub mod tables;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use tables::Tables;

use crate::types::{
    GithubUserId, IssueId, IssueNumber, JulesTask, JulesTaskKey, MilestoneLink, RepoId,
    SourceRepo, Sync, SyncLink, SyncedIssue, TargetTeam, UserLink,
};

/// Errors from the mapping store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint was violated.
    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store schema version mismatch: expected {expected}, got {got}")]
    SchemaMismatch { expected: u32, got: u32 },

    /// A previous writer panicked while holding the lock.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Async access to the persisted records.
///
/// Methods mirror the find/create/upsert/update operations the engine needs
/// and nothing more.
pub trait MappingStore: Send + std::marker::Sync + 'static {
    /// Finds a link with its repository and team. `user = None` is the
    /// repository-only (anonymous) lookup.
    fn find_link(
        &self,
        repo_id: RepoId,
        user: Option<GithubUserId>,
    ) -> impl Future<Output = Result<Option<SyncLink>, StoreError>> + Send;

    fn find_repo(
        &self,
        repo_id: RepoId,
    ) -> impl Future<Output = Result<Option<SourceRepo>, StoreError>> + Send;

    fn upsert_repo(&self, repo: SourceRepo)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    fn upsert_team(&self, team: TargetTeam)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    fn create_sync(&self, sync: Sync) -> impl Future<Output = Result<Sync, StoreError>> + Send;

    fn find_user(
        &self,
        user: GithubUserId,
    ) -> impl Future<Output = Result<Option<UserLink>, StoreError>> + Send;

    fn upsert_user(&self, link: UserLink) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn find_synced_issue(
        &self,
        repo_id: RepoId,
        number: IssueNumber,
    ) -> impl Future<Output = Result<Option<SyncedIssue>, StoreError>> + Send;

    fn find_synced_issue_by_id(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
    ) -> impl Future<Output = Result<Option<SyncedIssue>, StoreError>> + Send;

    fn create_synced_issue(
        &self,
        issue: SyncedIssue,
    ) -> impl Future<Output = Result<SyncedIssue, StoreError>> + Send;

    fn find_milestone(
        &self,
        repo_id: RepoId,
        milestone_number: u64,
    ) -> impl Future<Output = Result<Option<MilestoneLink>, StoreError>> + Send;

    fn create_milestone(
        &self,
        link: MilestoneLink,
    ) -> impl Future<Output = Result<MilestoneLink, StoreError>> + Send;

    fn upsert_jules_task(
        &self,
        key: JulesTaskKey,
        flagged: bool,
    ) -> impl Future<Output = Result<JulesTask, StoreError>> + Send;

    fn find_jules_task(
        &self,
        issue_id: IssueId,
    ) -> impl Future<Output = Result<Option<JulesTask>, StoreError>> + Send;

    fn flagged_jules_tasks(&self) -> impl Future<Output = Result<Vec<JulesTask>, StoreError>> + Send;

    /// Clears the retry flag, increments the retry count and stamps `at`.
    fn record_jules_retry(
        &self,
        task_id: u64,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<JulesTask, StoreError>> + Send;
}

/// A locked `Tables` with an optional persistence step.
///
/// Implementing this is enough to get a `MappingStore`.
pub trait TableBackend: Send + std::marker::Sync + 'static {
    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError>;

    /// Applies `f` to a copy of the tables and commits it only if both `f`
    /// and persistence succeed.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<T, StoreError>,
    ) -> Result<T, StoreError>;
}

impl<B: TableBackend> MappingStore for B {
    async fn find_link(
        &self,
        repo_id: RepoId,
        user: Option<GithubUserId>,
    ) -> Result<Option<SyncLink>, StoreError> {
        self.read(|t| t.find_link(repo_id, user))
    }

    async fn find_repo(&self, repo_id: RepoId) -> Result<Option<SourceRepo>, StoreError> {
        self.read(|t| t.find_repo(repo_id))
    }

    async fn upsert_repo(&self, repo: SourceRepo) -> Result<(), StoreError> {
        self.write(|t| {
            t.upsert_repo(repo);
            Ok(())
        })
    }

    async fn upsert_team(&self, team: TargetTeam) -> Result<(), StoreError> {
        self.write(|t| {
            t.upsert_team(team);
            Ok(())
        })
    }

    async fn create_sync(&self, sync: Sync) -> Result<Sync, StoreError> {
        self.write(|t| t.create_sync(sync))
    }

    async fn find_user(&self, user: GithubUserId) -> Result<Option<UserLink>, StoreError> {
        self.read(|t| t.find_user(user))
    }

    async fn upsert_user(&self, link: UserLink) -> Result<(), StoreError> {
        self.write(|t| {
            t.upsert_user(link);
            Ok(())
        })
    }

    async fn find_synced_issue(
        &self,
        repo_id: RepoId,
        number: IssueNumber,
    ) -> Result<Option<SyncedIssue>, StoreError> {
        self.read(|t| t.find_synced_issue(repo_id, number))
    }

    async fn find_synced_issue_by_id(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
    ) -> Result<Option<SyncedIssue>, StoreError> {
        self.read(|t| t.find_synced_issue_by_id(repo_id, issue_id))
    }

    async fn create_synced_issue(&self, issue: SyncedIssue) -> Result<SyncedIssue, StoreError> {
        self.write(|t| t.create_synced_issue(issue))
    }

    async fn find_milestone(
        &self,
        repo_id: RepoId,
        milestone_number: u64,
    ) -> Result<Option<MilestoneLink>, StoreError> {
        self.read(|t| t.find_milestone(repo_id, milestone_number))
    }

    async fn create_milestone(&self, link: MilestoneLink) -> Result<MilestoneLink, StoreError> {
        self.write(|t| t.create_milestone(link))
    }

    async fn upsert_jules_task(
        &self,
        key: JulesTaskKey,
        flagged: bool,
    ) -> Result<JulesTask, StoreError> {
        self.write(|t| Ok(t.upsert_jules_task(key, flagged)))
    }

    async fn find_jules_task(&self, issue_id: IssueId) -> Result<Option<JulesTask>, StoreError> {
        self.read(|t| t.find_jules_task(issue_id))
    }

    async fn flagged_jules_tasks(&self) -> Result<Vec<JulesTask>, StoreError> {
        self.read(|t| t.flagged_jules_tasks())
    }

    async fn record_jules_retry(
        &self,
        task_id: u64,
        at: DateTime<Utc>,
    ) -> Result<JulesTask, StoreError> {
        self.write(|t| t.record_jules_retry(task_id, at))
    }
}
