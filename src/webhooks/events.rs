//! Typed GitHub webhook deliveries.
//!
//! Only the `issues` and `issue_comment` events drive the sync. Every other
//! event type is still authenticated, then answered with a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{GithubUserId, IssueId, IssueNumber, RepoId, RepoName};

/// A parsed delivery: who sent it, where, and what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub repository: RepoRef,
    pub sender: Actor,
    pub event: GitHubEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub id: RepoId,
    pub name: RepoName,
}

/// A GitHub account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: GithubUserId,
    pub login: String,
    pub avatar_url: Option<String>,
    /// `type == "Bot"`.
    pub is_bot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitHubEvent {
    Issues(IssuesEvent),
    IssueComment(IssueCommentEvent),
    /// Any other event type (`ping`, `milestone`, `pull_request`, ...).
    Other { event_type: String },
}

impl GitHubEvent {
    /// The issue the event is about, if any.
    pub fn issue(&self) -> Option<&Issue> {
        match self {
            GitHubEvent::Issues(e) => Some(&e.issue),
            GitHubEvent::IssueComment(e) => Some(&e.issue),
            GitHubEvent::Other { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IssueAction {
    Opened,
    Edited,
    Closed,
    Reopened,
    Labeled,
    Unlabeled,
    Assigned,
    Unassigned,
    Milestoned,
    Demilestoned,
    /// Actions the sync ignores (`deleted`, `pinned`, `transferred`, ...).
    Other(String),
}

impl IssueAction {
    pub fn parse(action: &str) -> Self {
        match action {
            "opened" => IssueAction::Opened,
            "edited" => IssueAction::Edited,
            "closed" => IssueAction::Closed,
            "reopened" => IssueAction::Reopened,
            "labeled" => IssueAction::Labeled,
            "unlabeled" => IssueAction::Unlabeled,
            "assigned" => IssueAction::Assigned,
            "unassigned" => IssueAction::Unassigned,
            "milestoned" => IssueAction::Milestoned,
            "demilestoned" => IssueAction::Demilestoned,
            other => IssueAction::Other(other.to_string()),
        }
    }
}

/// An `issues` delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuesEvent {
    pub action: IssueAction,
    pub issue: Issue,
    /// The label added or removed (`labeled` / `unlabeled`).
    pub label: Option<String>,
    /// The account added or removed (`assigned` / `unassigned`).
    pub assignee: Option<Actor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommentAction {
    Created,
    Edited,
    Other(String),
}

impl CommentAction {
    pub fn parse(action: &str) -> Self {
        match action {
            "created" => CommentAction::Created,
            "edited" => CommentAction::Edited,
            other => CommentAction::Other(other.to_string()),
        }
    }
}

/// An `issue_comment` delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueCommentEvent {
    pub action: CommentAction,
    pub issue: Issue,
    pub comment: Comment,
}

/// The issue as embedded in a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub id: IssueId,
    pub number: IssueNumber,
    pub title: String,
    pub body: String,
    /// `completed`, `not_planned`, `reopened`, or absent.
    pub state_reason: Option<String>,
    pub labels: Vec<String>,
    /// The first assignee; GitHub mirrors it into `assignee` for multi-assignee issues.
    pub assignee: Option<Actor>,
    pub milestone: Option<Milestone>,
    /// Pull requests arrive as issues with a `pull_request` key.
    pub is_pull_request: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub description: String,
    pub due_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: u64,
    pub node_id: String,
    pub body: String,
    pub author: Actor,
}
