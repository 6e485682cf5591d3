//! GitHub webhook payload parser.
//!
//! Raw payloads are deserialized into private structs that mirror GitHub's
//! JSON (with `Option` wherever GitHub may omit or null a field), then
//! converted into the typed [`Delivery`].
//!
//! # Headers
//!
//! - `X-GitHub-Event` selects the event type
//! - `X-Hub-Signature-256` is verified separately, against the raw bytes

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::types::{GithubUserId, IssueId, IssueNumber, RepoId, RepoName};

use super::events::{
    Actor, Comment, CommentAction, Delivery, GitHubEvent, Issue, IssueAction, IssueCommentEvent,
    IssuesEvent, Milestone, RepoRef,
};

/// Header naming the event type.
pub const EVENT_HEADER: &str = "x-github-event";

#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid field value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    action: Option<String>,
    repository: RawRepository,
    sender: RawUser,
    #[serde(default)]
    issue: Option<RawIssue>,
    #[serde(default)]
    comment: Option<RawComment>,
    #[serde(default)]
    label: Option<RawLabel>,
    #[serde(default)]
    assignee: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    id: u64,
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: u64,
    login: String,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl From<RawUser> for Actor {
    fn from(raw: RawUser) -> Self {
        Actor {
            id: GithubUserId(raw.id),
            login: raw.login,
            avatar_url: raw.avatar_url,
            is_bot: raw.kind.as_deref() == Some("Bot"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    id: u64,
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    state_reason: Option<String>,
    #[serde(default)]
    labels: Vec<RawLabel>,
    #[serde(default)]
    assignee: Option<RawUser>,
    #[serde(default)]
    milestone: Option<RawMilestone>,
    // Present (even if null-valued inside) only for pull requests.
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

impl From<RawIssue> for Issue {
    fn from(raw: RawIssue) -> Self {
        Issue {
            id: IssueId(raw.id),
            number: IssueNumber(raw.number),
            title: raw.title,
            body: raw.body.unwrap_or_default(),
            state_reason: raw.state_reason,
            labels: raw.labels.into_iter().map(|l| l.name).collect(),
            assignee: raw.assignee.map(Actor::from),
            milestone: raw.milestone.map(Milestone::from),
            is_pull_request: raw.pull_request.is_some(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawMilestone {
    id: u64,
    number: u64,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    due_on: Option<DateTime<Utc>>,
}

impl From<RawMilestone> for Milestone {
    fn from(raw: RawMilestone) -> Self {
        Milestone {
            id: raw.id,
            number: raw.number,
            title: raw.title,
            description: raw.description.unwrap_or_default(),
            due_on: raw.due_on,
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
    user: RawUser,
}

/// Parses a delivery.
///
/// `repository` and `sender` are required for every event type. `issues`
/// deliveries additionally need `issue`; `issue_comment` deliveries need both
/// `issue` and `comment`.
///
/// ```
/// use tracker_sync::webhooks::{GitHubEvent, parse_webhook};
///
/// let payload = br#"{
///     "action": "opened",
///     "repository": { "id": 1, "full_name": "acme/widgets" },
///     "sender": { "id": 2, "login": "octocat", "type": "User" },
///     "issue": { "id": 3, "number": 42, "title": "Fix bug", "body": null, "labels": [] }
/// }"#;
///
/// let delivery = parse_webhook("issues", payload).unwrap();
/// assert!(matches!(delivery.event, GitHubEvent::Issues(_)));
/// ```
pub fn parse_webhook(event_type: &str, payload: &[u8]) -> Result<Delivery, ParseError> {
    let raw: RawEnvelope = serde_json::from_slice(payload)?;

    let name = RepoName::parse(&raw.repository.full_name).ok_or_else(|| {
        ParseError::InvalidField {
            field: "repository.full_name",
            value: raw.repository.full_name.clone(),
        }
    })?;
    let repository = RepoRef {
        id: RepoId(raw.repository.id),
        name,
    };
    let sender = Actor::from(raw.sender);

    let event = match event_type {
        "issues" => GitHubEvent::Issues(IssuesEvent {
            action: IssueAction::parse(&required_action(raw.action)?),
            issue: required_issue(raw.issue)?,
            label: raw.label.map(|l| l.name),
            assignee: raw.assignee.map(Actor::from),
        }),
        "issue_comment" => {
            let comment = raw.comment.ok_or(ParseError::InvalidField {
                field: "comment",
                value: "missing".to_string(),
            })?;
            GitHubEvent::IssueComment(IssueCommentEvent {
                action: CommentAction::parse(&required_action(raw.action)?),
                issue: required_issue(raw.issue)?,
                comment: Comment {
                    id: comment.id,
                    node_id: comment.node_id,
                    body: comment.body.unwrap_or_default(),
                    author: Actor::from(comment.user),
                },
            })
        }
        other => GitHubEvent::Other {
            event_type: other.to_string(),
        },
    };

    Ok(Delivery {
        repository,
        sender,
        event,
    })
}

fn required_action(action: Option<String>) -> Result<String, ParseError> {
    action.ok_or(ParseError::InvalidField {
        field: "action",
        value: "missing".to_string(),
    })
}

fn required_issue(issue: Option<RawIssue>) -> Result<Issue, ParseError> {
    issue.map(Issue::from).ok_or(ParseError::InvalidField {
        field: "issue",
        value: "missing".to_string(),
    })
}
