//! GitHub effect interpreter using octocrab.
//!
//! Requests go through octocrab's raw route helpers with small local response
//! models, so only the fields the engine reads need to be present. Rendered
//! HTML is fetched through GraphQL (REST doesn't expose `bodyHTML` for a node).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::effects::{SourceComment, SourceEffect, SourceInterpreter, SourceIssue, SourceResponse};
use crate::transport::{RemoteApiError, RetryConfig, RetryPolicy, retry_with_backoff};
use crate::types::{IssueId, IssueNumber};

use super::client::GitHubClient;
use super::error::from_octocrab;

/// GraphQL query for the rendered body of an issue or comment.
const BODY_HTML_QUERY: &str = r#"
query($id: ID!) {
    node(id: $id) {
        ... on IssueComment { bodyHTML }
        ... on Issue { bodyHTML }
    }
}
"#;

const COMMENTS_PER_PAGE: usize = 100;

// ─── Wire Models ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: u64,
    login: String,
    #[serde(default)]
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    id: u64,
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    labels: Vec<RawLabel>,
    #[serde(default)]
    assignee: Option<RawUser>,
}

impl From<RawIssue> for SourceIssue {
    fn from(raw: RawIssue) -> Self {
        SourceIssue {
            id: IssueId(raw.id),
            number: IssueNumber(raw.number),
            title: raw.title,
            body: raw.body.unwrap_or_default(),
            labels: raw.labels.into_iter().map(|l| l.name).collect(),
            assignee_id: raw.assignee.map(|a| a.id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: u64,
    #[serde(default)]
    node_id: String,
    #[serde(default)]
    body: Option<String>,
    user: Option<RawUser>,
}

impl From<RawComment> for SourceComment {
    fn from(raw: RawComment) -> Self {
        let (author_login, author_avatar_url) = match raw.user {
            Some(user) => (user.login, user.avatar_url),
            None => (String::new(), None),
        };
        SourceComment {
            id: raw.id,
            node_id: raw.node_id,
            body: raw.body.unwrap_or_default(),
            author_login,
            author_avatar_url,
        }
    }
}

#[derive(Debug, Serialize)]
struct IssuePatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct LabelsRequest<'a> {
    labels: &'a [String],
}

#[derive(Debug, Serialize)]
struct PageParams {
    per_page: usize,
    page: u32,
}

#[derive(Debug, Deserialize)]
struct BodyHtmlResponse {
    data: Option<BodyHtmlData>,
}

#[derive(Debug, Deserialize)]
struct BodyHtmlData {
    node: Option<BodyHtmlNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BodyHtmlNode {
    body_html: Option<String>,
}

// ─── Interpreter Implementation ───────────────────────────────────────────────

impl SourceInterpreter for GitHubClient {
    async fn interpret(&self, effect: SourceEffect) -> Result<SourceResponse, RemoteApiError> {
        interpret_source_effect(self, effect, RetryConfig::DEFAULT, RetryPolicy::RetryTransient)
            .await
    }
}

/// Interprets a GitHub effect with transport-level retry.
pub async fn interpret_source_effect(
    client: &GitHubClient,
    effect: SourceEffect,
    retry_config: RetryConfig,
    retry_policy: RetryPolicy,
) -> Result<SourceResponse, RemoteApiError> {
    debug!(repo = %client.repo(), ?effect, "Executing GitHub effect");
    retry_with_backoff(retry_config, retry_policy, || {
        execute_effect(client, effect.clone())
    })
    .await
}

async fn execute_effect(
    client: &GitHubClient,
    effect: SourceEffect,
) -> Result<SourceResponse, RemoteApiError> {
    match effect {
        SourceEffect::GetIssue { number } => get_issue(client, number).await,
        SourceEffect::UpdateIssue {
            number,
            title,
            body,
        } => update_issue(client, number, title.as_deref(), body.as_deref()).await,
        SourceEffect::ListComments { number } => list_comments(client, number).await,
        SourceEffect::GetBodyHtml { node_id } => get_body_html(client, &node_id).await,
        SourceEffect::AddLabels { number, labels } => add_labels(client, number, &labels).await,
        SourceEffect::RemoveLabel { number, label } => remove_label(client, number, &label).await,
    }
}

// ─── Issues ───────────────────────────────────────────────────────────────────

async fn get_issue(
    client: &GitHubClient,
    number: IssueNumber,
) -> Result<SourceResponse, RemoteApiError> {
    let route = client.issue_route(number.0, "");
    let raw: RawIssue = client
        .inner()
        .get(route, None::<&()>)
        .await
        .map_err(from_octocrab)?;
    Ok(SourceResponse::Issue(raw.into()))
}

async fn update_issue(
    client: &GitHubClient,
    number: IssueNumber,
    title: Option<&str>,
    body: Option<&str>,
) -> Result<SourceResponse, RemoteApiError> {
    let route = client.issue_route(number.0, "");
    let _: serde_json::Value = client
        .inner()
        .patch(route, Some(&IssuePatch { title, body }))
        .await
        .map_err(from_octocrab)?;
    Ok(SourceResponse::IssueUpdated)
}

// ─── Comments ─────────────────────────────────────────────────────────────────

async fn list_comments(
    client: &GitHubClient,
    number: IssueNumber,
) -> Result<SourceResponse, RemoteApiError> {
    let route = client.issue_route(number.0, "/comments");
    let mut page = 1u32;
    let mut all_comments = Vec::new();

    loop {
        let params = PageParams {
            per_page: COMMENTS_PER_PAGE,
            page,
        };
        let items: Vec<RawComment> = client
            .inner()
            .get(&route, Some(&params))
            .await
            .map_err(from_octocrab)?;

        let is_last_page = items.len() < COMMENTS_PER_PAGE;
        all_comments.extend(items.into_iter().map(SourceComment::from));

        if is_last_page {
            break;
        }
        page += 1;
    }

    Ok(SourceResponse::Comments(all_comments))
}

async fn get_body_html(
    client: &GitHubClient,
    node_id: &str,
) -> Result<SourceResponse, RemoteApiError> {
    let response: BodyHtmlResponse = client
        .inner()
        .graphql(&serde_json::json!({
            "query": BODY_HTML_QUERY,
            "variables": { "id": node_id },
        }))
        .await
        .map_err(from_octocrab)?;

    let html = response
        .data
        .and_then(|d| d.node)
        .and_then(|n| n.body_html);
    Ok(SourceResponse::BodyHtml(html))
}

// ─── Labels ───────────────────────────────────────────────────────────────────

async fn add_labels(
    client: &GitHubClient,
    number: IssueNumber,
    labels: &[String],
) -> Result<SourceResponse, RemoteApiError> {
    let route = client.issue_route(number.0, "/labels");
    let _: serde_json::Value = client
        .inner()
        .post(route, Some(&LabelsRequest { labels }))
        .await
        .map_err(from_octocrab)?;
    Ok(SourceResponse::LabelsAdded)
}

async fn remove_label(
    client: &GitHubClient,
    number: IssueNumber,
    label: &str,
) -> Result<SourceResponse, RemoteApiError> {
    let suffix = format!("/labels/{}", urlencoding::encode(label));
    let route = client.issue_route(number.0, &suffix);
    let _: serde_json::Value = client
        .inner()
        .delete(route, None::<&()>)
        .await
        .map_err(from_octocrab)?;
    Ok(SourceResponse::LabelRemoved)
}
