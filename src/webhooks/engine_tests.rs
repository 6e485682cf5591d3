use std::sync::Arc;

use serde_json::{Value, json};

use super::*;
use crate::config::CredentialOverrides;
use crate::credentials::CredentialResolver;
use crate::effects::TargetEffect;
use crate::store::MemoryStore;
use crate::test_utils::{FixedRewriter, MockConnector, MockSource, MockTarget, fixtures};
use crate::types::{GithubUserId, IssueNumber};
use crate::webhooks::signature::sign_payload;

type Engine = SyncEngine<MemoryStore, MockConnector, FixedRewriter>;

fn engine_with(config: Config) -> (Engine, MockConnector) {
    let store = Arc::new(MemoryStore::from_tables(fixtures::tables_with_link()));
    let connector = MockConnector::new(MockSource::default(), MockTarget::default());
    let credentials = CredentialResolver::new(config.overrides.clone(), None);
    let engine = SyncEngine::new(
        store,
        Arc::new(connector.clone()),
        FixedRewriter(None),
        credentials,
        Arc::new(config),
    );
    (engine, connector)
}

fn engine() -> (Engine, MockConnector) {
    let mut config = Config::default();
    config.overrides = CredentialOverrides {
        linear_api_key: Some("lin_test".into()),
        github_api_key: Some("ghp_test".into()),
        linear_admin_key: None,
    };
    engine_with(config)
}

fn engine_with_admin_key() -> (Engine, MockConnector) {
    let mut config = Config::default();
    config.overrides = CredentialOverrides {
        linear_api_key: Some("lin_test".into()),
        github_api_key: Some("ghp_test".into()),
        linear_admin_key: Some("lin_admin".into()),
    };
    engine_with(config)
}

fn payload(repo_id: u64, sender_id: u64, extra: Value) -> Vec<u8> {
    let mut payload = json!({
        "repository": { "id": repo_id, "full_name": "acme/widgets" },
        "sender": { "id": sender_id, "login": "octocat", "avatar_url": "https://a/7", "type": "User" }
    });
    for (k, v) in extra.as_object().unwrap() {
        payload[k] = v.clone();
    }
    serde_json::to_vec(&payload).unwrap()
}

fn issue_json(number: u64) -> Value {
    json!({
        "id": fixtures::issue_id(number).0,
        "number": number,
        "title": "Fix bug",
        "body": "Steps",
        "labels": []
    })
}

fn signed(payload: &[u8]) -> String {
    sign_payload(payload, fixtures::SECRET.as_bytes())
}

async fn deliver(engine: &Engine, event: &str, body: &[u8]) -> Result<Outcome, SyncError> {
    engine
        .handle_webhook(event, Some(&signed(body)), body)
        .await
}

#[tokio::test]
async fn wrong_signature_is_rejected_before_any_side_effect() {
    let (engine, connector) = engine();
    let body = payload(100, 7, json!({ "action": "opened", "issue": issue_json(42) }));
    let forged = sign_payload(&body, b"wrong");

    let err = engine
        .handle_webhook("issues", Some(&forged), &body)
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 403);
    assert_eq!(err.to_string(), "GH webhook secret doesn't match (repo: 100)");
    assert!(connector.tokens().is_empty());
    assert!(engine.store().find_user(fixtures::USER).await.unwrap().is_none());
}

#[tokio::test]
async fn missing_signature_is_rejected() {
    let (engine, _) = engine();
    let body = payload(100, 7, json!({ "action": "opened", "issue": issue_json(42) }));

    let err = engine.handle_webhook("issues", None, &body).await.unwrap_err();
    assert!(matches!(err, SyncError::Authentication { .. }));
}

#[tokio::test]
async fn tampered_body_is_rejected() {
    let (engine, _) = engine();
    let body = payload(100, 7, json!({ "action": "opened", "issue": issue_json(42) }));
    let signature = signed(&body);
    let tampered = payload(100, 7, json!({ "action": "opened", "issue": issue_json(43) }));

    let err = engine
        .handle_webhook("issues", Some(&signature), &tampered)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn unknown_repository_is_not_found() {
    let (engine, _) = engine();
    let body = payload(555, 7, json!({ "action": "opened", "issue": issue_json(42) }));
    let err = deliver(&engine, "issues", &body).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.to_string(), "Team not found (repo: 555)");

    let (engine, _) = engine_with_admin_key();
    let err = deliver(&engine, "issues", &body).await.unwrap_err();
    assert_eq!(err.to_string(), "Sync not found (repo: 555)");
}

#[tokio::test]
async fn unlinked_sender_without_admin_key_is_not_found() {
    let (engine, connector) = engine();
    let body = payload(100, 77, json!({ "action": "opened", "issue": issue_json(42) }));

    let err = deliver(&engine, "issues", &body).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert!(connector.tokens().is_empty());
}

#[tokio::test]
async fn pull_request_events_are_skipped_before_verification() {
    let (engine, connector) = engine();
    let mut issue = issue_json(42);
    issue["pull_request"] = json!({ "url": "https://api.github.com/pulls/42" });
    let body = payload(100, 7, json!({ "action": "opened", "issue": issue }));

    let outcome = engine.handle_webhook("issues", None, &body).await.unwrap();
    assert_eq!(outcome, Outcome::skipped("Pull request event."));
    assert!(connector.tokens().is_empty());
}

#[tokio::test]
async fn non_issue_event_records_user_and_is_skipped() {
    let (engine, connector) = engine();
    let body = payload(100, 7, json!({ "zen": "Design for failure." }));

    let outcome = deliver(&engine, "ping", &body).await.unwrap();

    assert_eq!(outcome, Outcome::skipped("Not an issue event."));
    let user = engine.store().find_user(fixtures::USER).await.unwrap().unwrap();
    assert_eq!(user.linear_user_id, fixtures::LINEAR_USER);
    assert!(connector.tokens().is_empty());
}

#[tokio::test]
async fn opened_issue_is_mirrored_exactly_once() {
    let (engine, connector) = engine();
    let body = payload(100, 7, json!({ "action": "opened", "issue": issue_json(42) }));

    let first = deliver(&engine, "issues", &body).await.unwrap();
    assert_eq!(
        first,
        Outcome::done("Created Linear ticket TEAM-7 (lin-issue-7) for GitHub issue #42 (repo: 100).")
    );

    let replayed = deliver(&engine, "issues", &body).await.unwrap();
    assert!(replayed.is_skipped());

    let creates = connector
        .target
        .calls()
        .into_iter()
        .filter(|effect| matches!(effect, TargetEffect::CreateIssue(_)))
        .count();
    assert_eq!(creates, 1);

    let synced = engine
        .store()
        .find_synced_issue(fixtures::REPO, IssueNumber(42))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(synced.linear_issue_number, 7);
    assert_eq!(synced.github_issue_id, fixtures::issue_id(42));
    assert_eq!(connector.tokens(), vec!["ghp_test", "lin_test", "ghp_test", "lin_test"]);
}

#[tokio::test]
async fn comment_on_unmirrored_issue_makes_no_remote_calls() {
    let (engine, connector) = engine();
    let body = payload(
        100,
        7,
        json!({
            "action": "created",
            "issue": issue_json(42),
            "comment": {
                "id": 55, "node_id": "IC_55", "body": "Looks good",
                "user": { "id": 7, "login": "octocat", "type": "User" }
            }
        }),
    );

    let outcome = deliver(&engine, "issue_comment", &body).await.unwrap();

    assert_eq!(
        outcome,
        Outcome::skipped("Skipping over comment for issue #42 as it is not synced.")
    );
    assert!(connector.source.calls().is_empty());
    assert!(connector.target.calls().is_empty());
}

#[tokio::test]
async fn agent_label_starts_tracking_task() {
    let (engine, _) = engine();
    let body = payload(
        100,
        7,
        json!({ "action": "labeled", "issue": issue_json(42), "label": { "name": "jules" } }),
    );

    deliver(&engine, "issues", &body).await.unwrap();

    let task = engine
        .store()
        .find_jules_task(fixtures::issue_id(42))
        .await
        .unwrap()
        .unwrap();
    assert!(!task.flagged_for_retry);
    assert_eq!(task.github_issue_number, IssueNumber(42));
}

#[tokio::test]
async fn other_labels_do_not_track_tasks() {
    let (engine, _) = engine();
    let body = payload(
        100,
        7,
        json!({ "action": "labeled", "issue": issue_json(42), "label": { "name": "bug" } }),
    );

    deliver(&engine, "issues", &body).await.unwrap();

    assert!(
        engine
            .store()
            .find_jules_task(fixtures::issue_id(42))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn promote_label_mirrors_issue() {
    let (engine, connector) = engine();
    let body = payload(
        100,
        7,
        json!({ "action": "labeled", "issue": issue_json(42), "label": { "name": "Linear" } }),
    );

    let outcome = deliver(&engine, "issues", &body).await.unwrap();

    assert!(!outcome.is_skipped());
    assert!(
        connector
            .target
            .calls()
            .iter()
            .any(|effect| matches!(effect, TargetEffect::CreateIssue(_)))
    );
}

#[tokio::test]
async fn anonymous_sender_uses_admin_key_and_is_not_recorded() {
    let (engine, connector) = engine_with_admin_key();
    let body = payload(100, 77, json!({ "action": "opened", "issue": issue_json(42) }));

    deliver(&engine, "issues", &body).await.unwrap();

    assert_eq!(connector.tokens(), vec!["ghp_test", "lin_admin"]);
    assert!(engine.store().find_user(GithubUserId(77)).await.unwrap().is_none());
    assert!(engine.store().find_user(fixtures::USER).await.unwrap().is_none());

    let TargetEffect::CreateIssue(created) = &connector.target.calls()[1] else {
        panic!("expected issue creation");
    };
    assert!(created.description.starts_with(">[octocat](https://github.com/octocat) on GitHub:"));
}

#[tokio::test]
async fn malformed_payload_is_a_bad_request() {
    let (engine, _) = engine();
    let body = br#"{"action":"opened"}"#;
    let err = deliver(&engine, "issues", body).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
}
