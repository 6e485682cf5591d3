//! Webhook handling for GitHub events.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA256)
//! - Parsing into typed deliveries
//! - Classification into transitions and the per-transition handlers
//! - `SyncEngine`, which runs a delivery through all of the above

mod engine;
pub mod events;
mod handlers;
pub mod parser;
pub mod signature;
pub mod transition;

pub use engine::SyncEngine;
pub use events::{
    Actor, Comment, CommentAction, Delivery, GitHubEvent, Issue, IssueAction, IssueCommentEvent,
    IssuesEvent, Milestone, RepoRef,
};
pub use parser::{EVENT_HEADER, ParseError, parse_webhook};
pub use signature::{SIGNATURE_HEADER, parse_signature_header, sign_payload, verify_signature};
pub use transition::{Transition, classify};
