//! Effect interpreter traits and typed call helpers.
//!
//! Handlers never talk to HTTP clients directly. They describe a call as an
//! effect and hand it to an interpreter, which enables:
//! - Recording mock interpreters for testing
//! - One place to apply transport retry and logging
//!
//! `SourceApi` / `TargetApi` are blanket extensions that unwrap the expected
//! response variant so call sites stay readable.

use std::future::Future;

use super::source::{SourceComment, SourceEffect, SourceIssue, SourceResponse};
use super::target::{
    IssueUpdate, LabelFilter, MutationResult, NewAttachment, NewComment, NewCycle, NewIssue,
    NewProject, TargetEffect, TargetIssue, TargetLabel, TargetResponse,
};
use crate::transport::{Remote, RemoteApiError};
use crate::types::IssueNumber;

/// Interprets GitHub effects against one repository.
pub trait SourceInterpreter: Send + Sync {
    fn interpret(
        &self,
        effect: SourceEffect,
    ) -> impl Future<Output = Result<SourceResponse, RemoteApiError>> + Send;
}

/// Interprets Linear effects with one API key.
pub trait TargetInterpreter: Send + Sync {
    fn interpret(
        &self,
        effect: TargetEffect,
    ) -> impl Future<Output = Result<TargetResponse, RemoteApiError>> + Send;
}

fn unexpected<T: std::fmt::Debug>(remote: Remote, expected: &str, got: T) -> RemoteApiError {
    RemoteApiError::permanent(remote, format!("expected {expected} response, got {got:?}"))
}

/// Typed GitHub calls.
pub trait SourceApi: SourceInterpreter {
    fn get_issue(
        &self,
        number: IssueNumber,
    ) -> impl Future<Output = Result<SourceIssue, RemoteApiError>> + Send {
        async move {
            match self.interpret(SourceEffect::GetIssue { number }).await? {
                SourceResponse::Issue(issue) => Ok(issue),
                other => Err(unexpected(Remote::GitHub, "issue", other)),
            }
        }
    }

    fn update_issue(
        &self,
        number: IssueNumber,
        title: Option<String>,
        body: Option<String>,
    ) -> impl Future<Output = Result<(), RemoteApiError>> + Send {
        async move {
            let effect = SourceEffect::UpdateIssue {
                number,
                title,
                body,
            };
            match self.interpret(effect).await? {
                SourceResponse::IssueUpdated => Ok(()),
                other => Err(unexpected(Remote::GitHub, "issue updated", other)),
            }
        }
    }

    fn list_comments(
        &self,
        number: IssueNumber,
    ) -> impl Future<Output = Result<Vec<SourceComment>, RemoteApiError>> + Send {
        async move {
            match self.interpret(SourceEffect::ListComments { number }).await? {
                SourceResponse::Comments(comments) => Ok(comments),
                other => Err(unexpected(Remote::GitHub, "comments", other)),
            }
        }
    }

    fn body_html(
        &self,
        node_id: String,
    ) -> impl Future<Output = Result<Option<String>, RemoteApiError>> + Send {
        async move {
            match self.interpret(SourceEffect::GetBodyHtml { node_id }).await? {
                SourceResponse::BodyHtml(html) => Ok(html),
                other => Err(unexpected(Remote::GitHub, "body HTML", other)),
            }
        }
    }

    fn add_labels(
        &self,
        number: IssueNumber,
        labels: Vec<String>,
    ) -> impl Future<Output = Result<(), RemoteApiError>> + Send {
        async move {
            match self.interpret(SourceEffect::AddLabels { number, labels }).await? {
                SourceResponse::LabelsAdded => Ok(()),
                other => Err(unexpected(Remote::GitHub, "labels added", other)),
            }
        }
    }

    fn remove_label(
        &self,
        number: IssueNumber,
        label: String,
    ) -> impl Future<Output = Result<(), RemoteApiError>> + Send {
        async move {
            match self.interpret(SourceEffect::RemoveLabel { number, label }).await? {
                SourceResponse::LabelRemoved => Ok(()),
                other => Err(unexpected(Remote::GitHub, "label removed", other)),
            }
        }
    }
}

impl<I: SourceInterpreter> SourceApi for I {}

/// Typed Linear calls.
pub trait TargetApi: TargetInterpreter {
    fn mutate(
        &self,
        effect: TargetEffect,
    ) -> impl Future<Output = Result<MutationResult, RemoteApiError>> + Send {
        async move {
            match self.interpret(effect).await? {
                TargetResponse::Mutation(result) => Ok(result),
                other => Err(unexpected(Remote::Linear, "mutation", other)),
            }
        }
    }

    fn create_issue(
        &self,
        issue: NewIssue,
    ) -> impl Future<Output = Result<MutationResult, RemoteApiError>> + Send {
        self.mutate(TargetEffect::CreateIssue(issue))
    }

    fn issue(
        &self,
        issue_id: String,
    ) -> impl Future<Output = Result<Option<TargetIssue>, RemoteApiError>> + Send {
        async move {
            match self.interpret(TargetEffect::GetIssue { issue_id }).await? {
                TargetResponse::Issue(issue) => Ok(issue),
                other => Err(unexpected(Remote::Linear, "issue", other)),
            }
        }
    }

    fn update_issue(
        &self,
        issue_id: String,
        update: IssueUpdate,
    ) -> impl Future<Output = Result<MutationResult, RemoteApiError>> + Send {
        self.mutate(TargetEffect::UpdateIssue { issue_id, update })
    }

    fn create_attachment(
        &self,
        attachment: NewAttachment,
    ) -> impl Future<Output = Result<MutationResult, RemoteApiError>> + Send {
        self.mutate(TargetEffect::CreateAttachment(attachment))
    }

    fn create_comment(
        &self,
        comment: NewComment,
    ) -> impl Future<Output = Result<MutationResult, RemoteApiError>> + Send {
        self.mutate(TargetEffect::CreateComment(comment))
    }

    fn update_comment(
        &self,
        comment_id: String,
        body: String,
    ) -> impl Future<Output = Result<MutationResult, RemoteApiError>> + Send {
        self.mutate(TargetEffect::UpdateComment { comment_id, body })
    }

    fn create_cycle(
        &self,
        cycle: NewCycle,
    ) -> impl Future<Output = Result<MutationResult, RemoteApiError>> + Send {
        self.mutate(TargetEffect::CreateCycle(cycle))
    }

    fn create_project(
        &self,
        project: NewProject,
    ) -> impl Future<Output = Result<MutationResult, RemoteApiError>> + Send {
        self.mutate(TargetEffect::CreateProject(project))
    }

    fn find_labels(
        &self,
        filter: LabelFilter,
    ) -> impl Future<Output = Result<Vec<TargetLabel>, RemoteApiError>> + Send {
        async move {
            match self.interpret(TargetEffect::FindLabels(filter)).await? {
                TargetResponse::Labels(labels) => Ok(labels),
                other => Err(unexpected(Remote::Linear, "labels", other)),
            }
        }
    }
}

impl<I: TargetInterpreter> TargetApi for I {}
