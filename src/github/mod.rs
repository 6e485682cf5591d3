//! GitHub API client and effect interpreter.
//!
//! Executes `SourceEffect`s via octocrab, scoped to one repository, with
//! exponential backoff for transient failures.

mod client;
mod error;
mod interpreter;

pub use client::GitHubClient;
pub use error::from_octocrab;
pub use interpreter::interpret_source_effect;
