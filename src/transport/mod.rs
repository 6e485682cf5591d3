//! Shared plumbing for talking to remote trackers.

pub mod error;
pub mod retry;

pub use error::{Remote, RemoteApiError, RemoteErrorKind};
pub use retry::{RetryConfig, RetryPolicy, retry_with_backoff};
