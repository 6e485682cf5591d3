use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use super::*;
use crate::config::{Config, CredentialOverrides};
use crate::credentials::CredentialResolver;
use crate::effects::SourceIssue;
use crate::store::MemoryStore;
use crate::test_utils::{FixedRewriter, MockConnector, MockSource, MockTarget, fixtures};
use crate::types::{IssueNumber, JulesTaskKey};
use crate::webhooks::sign_payload;

type TestState = AppState<MemoryStore, MockConnector, FixedRewriter>;

fn app_state(source: MockSource) -> TestState {
    let store = Arc::new(MemoryStore::from_tables(fixtures::tables_with_link()));
    let connector = Arc::new(MockConnector::new(source, MockTarget::default()));
    let credentials = CredentialResolver::new(
        CredentialOverrides {
            linear_api_key: Some("lin_test".into()),
            github_api_key: Some("ghp_test".into()),
            linear_admin_key: None,
        },
        None,
    );
    let engine = SyncEngine::new(
        store,
        connector,
        FixedRewriter(None),
        credentials,
        Arc::new(Config::default()),
    );
    AppState::new(Arc::new(engine))
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn webhook_request(event: &str, body: &Value, secret: &[u8]) -> Request<Body> {
    let bytes = serde_json::to_vec(body).unwrap();
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header("x-github-event", event)
        .header("x-hub-signature-256", sign_payload(&bytes, secret))
        .body(Body::from(bytes))
        .unwrap()
}

fn ping() -> Value {
    json!({
        "zen": "Half measures are as bad as nothing at all.",
        "repository": { "id": 100, "full_name": "acme/widgets" },
        "sender": { "id": 7, "login": "octocat", "type": "User" }
    })
}

#[tokio::test]
async fn health_returns_200() {
    let app = build_router(app_state(MockSource::default()));

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn webhook_skip_is_reported_as_success() {
    let app = build_router(app_state(MockSource::default()));

    let request = webhook_request("ping", &ping(), fixtures::SECRET.as_bytes());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "success": true, "message": "Not an issue event.", "skipped": true })
    );
}

#[tokio::test]
async fn webhook_with_wrong_secret_is_forbidden() {
    let app = build_router(app_state(MockSource::default()));

    let request = webhook_request("ping", &ping(), b"wrong-secret");
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        json_body(response).await,
        json!({ "success": false, "error": "GH webhook secret doesn't match (repo: 100)" })
    );
}

#[tokio::test]
async fn webhook_without_event_header_is_bad_request() {
    let app = build_router(app_state(MockSource::default()));

    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .body(Body::from(serde_json::to_vec(&ping()).unwrap()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_for_unknown_repo_is_not_found() {
    let app = build_router(app_state(MockSource::default()));
    let mut body = ping();
    body["repository"]["id"] = json!(404);

    let response = app
        .oneshot(webhook_request("ping", &body, fixtures::SECRET.as_bytes()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn retry_with_nothing_flagged_retries_nothing() {
    let app = build_router(app_state(MockSource::default()));

    let request = Request::builder()
        .uri("/jules/retry")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "success": true, "retried": 0 })
    );
}

#[tokio::test]
async fn retry_counts_retried_tasks() {
    let source = MockSource::default().with_issue(SourceIssue {
        id: fixtures::issue_id(42),
        number: IssueNumber(42),
        title: "Fix bug".into(),
        body: String::new(),
        labels: vec!["jules-queue".into()],
        assignee_id: None,
    });
    let state = app_state(source);
    state
        .engine()
        .store()
        .upsert_jules_task(
            JulesTaskKey {
                github_repo_id: fixtures::REPO,
                github_issue_id: fixtures::issue_id(42),
                github_issue_number: IssueNumber(42),
            },
            true,
        )
        .await
        .unwrap();
    let app = build_router(state);

    let request = Request::builder()
        .uri("/jules/retry")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        json_body(response).await,
        json!({ "success": true, "retried": 1 })
    );
}

#[tokio::test]
async fn retry_rejects_other_methods() {
    let app = build_router(app_state(MockSource::default()));

    let request = Request::builder()
        .method("POST")
        .uri("/jules/retry")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ALLOW], "GET");
}

#[tokio::test]
async fn save_team_upserts_team() {
    let state = app_state(MockSource::default());
    let app = build_router(state.clone());

    let body = json!({
        "teamId": "team-2",
        "teamName": "Platform",
        "canceledStateId": "c2",
        "doneStateId": "d2",
        "toDoStateId": "t2"
    });
    let request = Request::builder()
        .method("POST")
        .uri("/linear/save")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let teams = state.engine().store().snapshot().unwrap().teams;
    let saved = teams.iter().find(|t| t.team_id == "team-2").unwrap();
    assert_eq!(saved.team_name, "Platform");
    assert_eq!(saved.to_do_state_id, "t2");
}

#[tokio::test]
async fn save_team_without_name_is_bad_request() {
    let app = build_router(app_state(MockSource::default()));

    let request = Request::builder()
        .method("POST")
        .uri("/linear/save")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"teamId":"team-2"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Failed to save team: missing team name" })
    );
}
