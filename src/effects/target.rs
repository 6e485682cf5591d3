//! Linear (target tracker) effect types.
//!
//! Linear is a GraphQL API where every mutation answers `{ success, <entity> }`.
//! `TargetResponse::Mutation` keeps that shape so callers decide what an
//! unsuccessful mutation means for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Input for `issueCreate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
    pub team_id: String,
    pub title: String,
    pub description: String,
    pub label_ids: Vec<String>,
    pub assignee_id: Option<String>,
}

/// Input for `issueUpdate`. `None` leaves a field unchanged.
///
/// `assignee_id` and `priority` are doubly optional: `Some(None)` clears them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub state_id: Option<String>,
    pub assignee_id: Option<Option<String>>,
    pub priority: Option<Option<u8>>,
    pub label_ids: Option<Vec<String>>,
    pub cycle_id: Option<String>,
    pub project_id: Option<String>,
}

/// Input for `commentCreate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub issue_id: String,
    pub body: String,
    /// Shown as the comment's author (`createAsUser`).
    pub display_name: Option<String>,
    pub display_icon_url: Option<String>,
}

/// Input for `cycleCreate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCycle {
    pub team_id: String,
    pub name: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// Input for `projectCreate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    pub team_ids: Vec<String>,
    pub name: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub target_date: Option<DateTime<Utc>>,
}

/// Input for `attachmentCreate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAttachment {
    pub issue_id: String,
    pub title: String,
    pub subtitle: String,
    pub url: String,
}

/// How label names are matched (always case-insensitively).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMatch {
    /// Name equals any of these.
    AnyOf(Vec<String>),
    /// Name contains this.
    Contains(String),
}

/// Filter for the `issueLabels` query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelFilter {
    /// Restrict to one team's labels.
    pub team_id: Option<String>,
    pub name: LabelMatch,
    pub include_archived: bool,
}

/// A Linear effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetEffect {
    // ─── Issues ───────────────────────────────────────────────────────────────
    CreateIssue(NewIssue),

    GetIssue {
        issue_id: String,
    },

    UpdateIssue {
        issue_id: String,
        update: IssueUpdate,
    },

    CreateAttachment(NewAttachment),

    // ─── Comments ─────────────────────────────────────────────────────────────
    CreateComment(NewComment),

    UpdateComment {
        comment_id: String,
        body: String,
    },

    // ─── Milestones ───────────────────────────────────────────────────────────
    CreateCycle(NewCycle),

    CreateProject(NewProject),

    // ─── Labels ───────────────────────────────────────────────────────────────
    FindLabels(LabelFilter),
}

/// The team an issue belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: String,
    /// Short key used in ticket names (`TEAM` in `TEAM-7`).
    pub key: String,
}

/// An issue as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetIssue {
    pub id: String,
    pub number: u64,
    pub url: String,
    pub team: Option<TeamRef>,
    pub assignee_id: Option<String>,
    pub label_ids: Vec<String>,
}

impl TargetIssue {
    /// `TEAM-7`, if the team is known.
    pub fn ticket_name(&self) -> Option<String> {
        self.team
            .as_ref()
            .map(|team| format!("{}-{}", team.key, self.number))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetLabel {
    pub id: String,
    pub name: String,
}

/// The `{ success, <entity>.id }` answer to a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationResult {
    pub success: bool,
    pub id: Option<String>,
}

/// Response from a Linear effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TargetResponse {
    /// Response to every create/update.
    Mutation(MutationResult),

    /// Response to `GetIssue`.
    Issue(Option<TargetIssue>),

    /// Response to `FindLabels`.
    Labels(Vec<TargetLabel>),
}
