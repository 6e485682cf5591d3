//! Effects-as-data for both trackers.
//!
//! Handlers describe remote operations as `SourceEffect` / `TargetEffect`
//! values; interpreters execute them. Tests substitute recording interpreters
//! and assert on the effects issued.

pub mod interpreter;
pub mod source;
pub mod target;

pub use interpreter::{SourceApi, SourceInterpreter, TargetApi, TargetInterpreter};
pub use source::{SourceComment, SourceEffect, SourceIssue, SourceResponse};
pub use target::{
    IssueUpdate, LabelFilter, LabelMatch, MutationResult, NewAttachment, NewComment, NewCycle,
    NewIssue, NewProject, TargetEffect, TargetIssue, TargetLabel, TargetResponse, TeamRef,
};
