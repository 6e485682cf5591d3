use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::*;
use crate::config::CredentialOverrides;
use crate::effects::{SourceComment, SourceEffect, SourceIssue};
use crate::store::MemoryStore;
use crate::test_utils::{MockConnector, MockSource, MockTarget, fixtures};
use crate::types::{IssueNumber, RepoId};

fn key(number: u64) -> JulesTaskKey {
    JulesTaskKey {
        github_repo_id: fixtures::REPO,
        github_issue_id: fixtures::issue_id(number),
        github_issue_number: IssueNumber(number),
    }
}

fn source_issue(number: u64, labels: &[&str]) -> SourceIssue {
    SourceIssue {
        id: fixtures::issue_id(number),
        number: IssueNumber(number),
        title: "Fix bug".into(),
        body: String::new(),
        labels: labels.iter().map(|l| l.to_string()).collect(),
        assignee_id: None,
    }
}

fn limit_comment() -> SourceComment {
    SourceComment {
        id: 1,
        node_id: "IC_1".into(),
        body: "You are currently at your concurrent task limit".into(),
        author_login: "google-labs-jules[bot]".into(),
        author_avatar_url: None,
    }
}

struct Harness {
    agent: JulesAgent<MemoryStore, MockConnector>,
    store: Arc<MemoryStore>,
    source: MockSource,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

fn harness(source: MockSource) -> Harness {
    let store = Arc::new(MemoryStore::from_tables(fixtures::tables_with_link()));
    let connector = Arc::new(MockConnector::new(source.clone(), MockTarget::default()));
    let credentials = CredentialResolver::new(
        CredentialOverrides {
            github_api_key: Some("ghp_test".into()),
            ..CredentialOverrides::default()
        },
        None,
    );
    let tracker = TaskTracker::new();
    let shutdown = CancellationToken::new();
    let agent = JulesAgent::new(
        Arc::clone(&store),
        connector,
        credentials,
        AgentConfig::default(),
        tracker.clone(),
        shutdown.clone(),
    );
    Harness {
        agent,
        store,
        source,
        tracker,
        shutdown,
    }
}

impl Harness {
    async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    async fn task(&self, number: u64) -> JulesTask {
        self.store
            .find_jules_task(fixtures::issue_id(number))
            .await
            .unwrap()
            .unwrap()
    }
}

#[tokio::test(start_paused = true)]
async fn assignment_starts_active_and_detector_flags_rate_limited_task() {
    let h = harness(MockSource::default().with_comments(vec![limit_comment()]));

    let task = h.agent.assign(key(5)).await.unwrap();
    assert_eq!(TaskState::of(&task), TaskState::Active);
    // The check has not run yet.
    assert!(h.source.calls().is_empty());

    h.drain().await;

    assert_eq!(TaskState::of(&h.task(5).await), TaskState::Flagged);
    assert_eq!(
        h.source.calls(),
        vec![
            SourceEffect::ListComments {
                number: IssueNumber(5)
            },
            SourceEffect::RemoveLabel {
                number: IssueNumber(5),
                label: "jules".into()
            },
            SourceEffect::AddLabels {
                number: IssueNumber(5),
                labels: vec!["jules-queue".into()]
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn detector_waits_for_the_configured_delay() {
    let h = harness(MockSource::default());
    h.agent.assign(key(5)).await.unwrap();

    tokio::time::sleep(Duration::from_secs(59)).await;
    assert!(h.source.calls().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    tokio::task::yield_now().await;
    h.drain().await;
    assert_eq!(h.source.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn detector_without_limit_comment_leaves_task_active() {
    let h = harness(MockSource::default());
    h.agent.assign(key(5)).await.unwrap();
    h.drain().await;

    assert_eq!(TaskState::of(&h.task(5).await), TaskState::Active);
    assert_eq!(h.source.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_pending_checks() {
    let h = harness(MockSource::default().with_comments(vec![limit_comment()]));
    h.agent.assign(key(5)).await.unwrap();

    h.shutdown.cancel();
    h.drain().await;

    assert!(h.source.calls().is_empty());
    assert_eq!(TaskState::of(&h.task(5).await), TaskState::Active);
}

#[tokio::test(start_paused = true)]
async fn reassignment_clears_the_flag() {
    let h = harness(MockSource::default());
    h.store.upsert_jules_task(key(5), true).await.unwrap();

    let task = h.agent.assign(key(5)).await.unwrap();
    assert_eq!(TaskState::of(&task), TaskState::Active);
    h.drain().await;
}

#[tokio::test]
async fn sweep_retries_flagged_task() {
    let h = harness(MockSource::default().with_issue(source_issue(5, &["jules-queue"])));
    h.store.upsert_jules_task(key(5), true).await.unwrap();

    assert_eq!(h.agent.sweep().await.unwrap(), 1);

    let task = h.task(5).await;
    assert_eq!(TaskState::of(&task), TaskState::Active);
    assert_eq!(task.retry_count, 1);
    assert!(task.last_retry_at.is_some());
    assert_eq!(
        h.source.calls(),
        vec![
            SourceEffect::GetIssue {
                number: IssueNumber(5)
            },
            SourceEffect::RemoveLabel {
                number: IssueNumber(5),
                label: "jules-queue".into()
            },
            SourceEffect::AddLabels {
                number: IssueNumber(5),
                labels: vec!["jules".into()]
            },
        ]
    );
}

#[tokio::test]
async fn sweep_skips_human_override() {
    let h = harness(MockSource::default().with_issue(source_issue(5, &["Human", "jules-queue"])));
    h.store.upsert_jules_task(key(5), true).await.unwrap();

    assert_eq!(h.agent.sweep().await.unwrap(), 0);

    let task = h.task(5).await;
    assert!(task.flagged_for_retry);
    assert_eq!(task.retry_count, 0);
    assert_eq!(h.source.calls().len(), 1);
}

#[tokio::test]
async fn failing_task_does_not_abort_sweep() {
    // Only #5 exists; fetching #6 fails with 404.
    let h = harness(MockSource::default().with_issue(source_issue(5, &[])));
    h.store.upsert_jules_task(key(6), true).await.unwrap();
    h.store.upsert_jules_task(key(5), true).await.unwrap();

    assert_eq!(h.agent.sweep().await.unwrap(), 1);
    assert!(h.task(6).await.flagged_for_retry);
    assert!(!h.task(5).await.flagged_for_retry);
}

#[tokio::test]
async fn failed_label_apply_leaves_task_flagged() {
    let h = harness(
        MockSource::default()
            .with_issue(source_issue(5, &[]))
            .failing_updates(),
    );
    h.store.upsert_jules_task(key(5), true).await.unwrap();

    assert_eq!(h.agent.sweep().await.unwrap(), 0);
    let task = h.task(5).await;
    assert!(task.flagged_for_retry);
    assert_eq!(task.retry_count, 0);
}

#[tokio::test]
async fn task_without_link_is_skipped() {
    let h = harness(MockSource::default());
    h.store
        .upsert_jules_task(
            JulesTaskKey {
                github_repo_id: RepoId(404),
                ..key(5)
            },
            true,
        )
        .await
        .unwrap();

    assert_eq!(h.agent.sweep().await.unwrap(), 0);
    assert!(h.source.calls().is_empty());
}

#[tokio::test]
async fn empty_sweep_is_idempotent() {
    let h = harness(MockSource::default());
    assert_eq!(h.agent.sweep().await.unwrap(), 0);
    assert_eq!(h.agent.sweep().await.unwrap(), 0);
}
