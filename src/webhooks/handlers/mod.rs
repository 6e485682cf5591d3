//! Per-transition handlers.
//!
//! Every handler that mutates Linear starts from the `SyncedIssue` looked up
//! by the engine. An unmirrored issue turns the transition into a skip that
//! names the stage; only the create paths proceed without a mirror.

mod assignee;
mod comment;
mod create;
mod issue;
mod label;
mod milestone;

use super::events::{Actor, Issue, RepoRef};
use super::transition::Transition;
use crate::config::Config;
use crate::effects::{SourceInterpreter, TargetInterpreter};
use crate::error::{Outcome, SyncError};
use crate::markdown::Attribution;
use crate::rewrite::{Rewriter, is_ai_processed};
use crate::store::MappingStore;
use crate::types::{SyncLink, SyncedIssue};

/// Everything a handler may touch while processing one delivery.
pub(crate) struct Context<'a, S, Src, Tgt, R> {
    pub store: &'a S,
    pub source: Src,
    pub target: Tgt,
    pub rewriter: &'a R,
    pub config: &'a Config,
    pub repo: &'a RepoRef,
    pub sender: &'a Actor,
    pub issue: &'a Issue,
    pub link: &'a SyncLink,
    pub anonymous: bool,
    /// The mirror of `issue`, if it has one.
    pub synced: Option<SyncedIssue>,
}

impl<S, Src, Tgt, R> Context<'_, S, Src, Tgt, R>
where
    S: MappingStore,
    Src: SourceInterpreter,
    Tgt: TargetInterpreter,
    R: Rewriter,
{
    pub async fn dispatch(self, transition: Transition<'_>) -> Result<Outcome, SyncError> {
        match transition {
            Transition::PullRequest => Ok(Outcome::skipped("Pull request event.")),
            Transition::CommentCreated(comment) => self.comment_created(comment).await,
            Transition::CommentEdited(comment) => self.comment_edited(comment).await,
            Transition::Create { replay_comments } => self.create(replay_comments).await,
            Transition::Edited => self.edited().await,
            Transition::StateChanged => self.state_changed().await,
            Transition::Assignee { assigned, assignee } => {
                self.assignee_changed(assigned, assignee).await
            }
            Transition::Milestone { milestoned } => self.milestone_changed(milestoned).await,
            Transition::Label { labeled, name } => self.label_changed(labeled, name).await,
            Transition::Ignored(reason) => Ok(Outcome::skipped(reason)),
            Transition::NotAnIssueEvent => Ok(Outcome::skipped("Not an issue event.")),
        }
    }

    /// Credits the sender in mirrored text when they have no personal link.
    fn attribution(&self) -> Option<Attribution> {
        self.anonymous
            .then(|| Attribution::github_user(&self.sender.login))
    }

    /// Rewords `text` unless the sender is a bot or it was already reworded.
    async fn maybe_reword(&self, text: &str) -> Option<String> {
        if self.sender.is_bot || is_ai_processed(text) {
            return None;
        }
        self.rewriter.reword(text).await
    }
}
