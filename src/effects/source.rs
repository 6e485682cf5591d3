//! GitHub (source tracker) effect types.
//!
//! Effects are repo-scoped: the interpreter is constructed for one repository,
//! so effects don't carry it.

use serde::{Deserialize, Serialize};

use crate::types::{IssueId, IssueNumber};

/// A GitHub API effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceEffect {
    // ─── Issues ───────────────────────────────────────────────────────────────
    /// Fetch an issue by number.
    GetIssue { number: IssueNumber },

    /// Patch an issue's title and/or body. `None` leaves a field unchanged.
    UpdateIssue {
        number: IssueNumber,
        title: Option<String>,
        body: Option<String>,
    },

    // ─── Comments ─────────────────────────────────────────────────────────────
    /// List all comments on an issue, oldest first.
    ListComments { number: IssueNumber },

    /// Fetch the rendered HTML of a comment or issue (via GraphQL).
    ///
    /// Rendered HTML carries signed image URLs that raw markdown lacks.
    GetBodyHtml { node_id: String },

    // ─── Labels ───────────────────────────────────────────────────────────────
    /// Add labels to an issue.
    AddLabels {
        number: IssueNumber,
        labels: Vec<String>,
    },

    /// Remove one label from an issue. Fails with 404 if it is absent.
    RemoveLabel { number: IssueNumber, label: String },
}

/// An issue as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIssue {
    pub id: IssueId,
    pub number: IssueNumber,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignee_id: Option<u64>,
}

impl SourceIssue {
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l == name)
    }
}

/// A comment as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceComment {
    pub id: u64,
    pub node_id: String,
    pub body: String,
    pub author_login: String,
    pub author_avatar_url: Option<String>,
}

/// Response from a GitHub effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SourceResponse {
    /// Response to `GetIssue`.
    Issue(SourceIssue),

    /// Response to `UpdateIssue`.
    IssueUpdated,

    /// Response to `ListComments`.
    Comments(Vec<SourceComment>),

    /// Response to `GetBodyHtml`. `None` if the node has no rendered body.
    BodyHtml(Option<String>),

    /// Response to `AddLabels`.
    LabelsAdded,

    /// Response to `RemoveLabel`.
    LabelRemoved,
}
