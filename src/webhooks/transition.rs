//! Classifies a delivery into the transition it triggers.
//!
//! Classification is pure: it only looks at the event and the configured
//! promote label. Store lookups and remote calls happen in the handlers.

use super::events::{Actor, Comment, CommentAction, GitHubEvent, IssueAction};

/// What a delivery asks the engine to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition<'a> {
    /// An `issues`/`issue_comment` event about a pull request.
    PullRequest,

    CommentCreated(&'a Comment),
    /// Only comments carrying a Linear comment marker are propagated.
    CommentEdited(&'a Comment),

    /// Mirror the issue. Comments are replayed when it was promoted by label.
    Create { replay_comments: bool },
    Edited,
    /// `closed` / `reopened`.
    StateChanged,
    Assignee {
        assigned: bool,
        assignee: Option<&'a Actor>,
    },
    Milestone { milestoned: bool },
    Label { labeled: bool, name: &'a str },

    /// An issue or comment action the sync ignores.
    Ignored(String),
    /// Any event type other than `issues` / `issue_comment`.
    NotAnIssueEvent,
}

/// Picks the transition for `event`.
///
/// A `labeled` event for the promote label (case-insensitive) creates the
/// mirror instead of being treated as an ordinary label change.
pub fn classify<'a>(event: &'a GitHubEvent, promote_label: &str) -> Transition<'a> {
    if event.issue().is_some_and(|issue| issue.is_pull_request) {
        return Transition::PullRequest;
    }

    match event {
        GitHubEvent::IssueComment(e) => match &e.action {
            CommentAction::Created => Transition::CommentCreated(&e.comment),
            CommentAction::Edited => Transition::CommentEdited(&e.comment),
            CommentAction::Other(action) => {
                Transition::Ignored(format!("Ignoring comment action \"{action}\"."))
            }
        },
        GitHubEvent::Issues(e) => match &e.action {
            IssueAction::Opened => Transition::Create {
                replay_comments: false,
            },
            IssueAction::Edited => Transition::Edited,
            IssueAction::Closed | IssueAction::Reopened => Transition::StateChanged,
            IssueAction::Assigned | IssueAction::Unassigned => Transition::Assignee {
                assigned: e.action == IssueAction::Assigned,
                assignee: e.assignee.as_ref(),
            },
            IssueAction::Milestoned | IssueAction::Demilestoned => Transition::Milestone {
                milestoned: e.action == IssueAction::Milestoned,
            },
            IssueAction::Labeled | IssueAction::Unlabeled => match e.label.as_deref() {
                Some(name)
                    if e.action == IssueAction::Labeled
                        && name.eq_ignore_ascii_case(promote_label) =>
                {
                    Transition::Create {
                        replay_comments: true,
                    }
                }
                Some(name) => Transition::Label {
                    labeled: e.action == IssueAction::Labeled,
                    name,
                },
                None => Transition::Ignored("Label event without a label.".to_string()),
            },
            IssueAction::Other(action) => {
                Transition::Ignored(format!("Ignoring issue action \"{action}\"."))
            }
        },
        GitHubEvent::Other { .. } => Transition::NotAnIssueEvent,
    }
}
