//! Remote API error types.
//!
//! Both trackers are reached over HTTP, and both fail in the same two ways
//! that matter for retry decisions:
//!
//! - **Transient** errors are retriable (5xx, rate limits, network failures)
//! - **Permanent** errors will fail the same way again (most 4xx, bad payloads)

use std::fmt;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The kind of remote error, categorized for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Safe to retry with backoff.
    Transient,
    /// Retrying will not help.
    Permanent,
}

impl RemoteErrorKind {
    pub fn is_retriable(&self) -> bool {
        matches!(self, RemoteErrorKind::Transient)
    }
}

/// Which tracker an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remote {
    GitHub,
    Linear,
    Rewriter,
}

impl fmt::Display for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remote::GitHub => write!(f, "GitHub"),
            Remote::Linear => write!(f, "Linear"),
            Remote::Rewriter => write!(f, "rewriter"),
        }
    }
}

/// A remote API error with categorization for retry decisions.
#[derive(Debug, Error)]
pub struct RemoteApiError {
    pub remote: Remote,
    pub kind: RemoteErrorKind,
    /// The HTTP status code, if available.
    pub status_code: Option<u16>,
    pub message: String,
    #[source]
    pub source: Option<BoxError>,
}

impl fmt::Display for RemoteApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} API error (HTTP {}): {}", self.remote, code, self.message),
            None => write!(f, "{} API error: {}", self.remote, self.message),
        }
    }
}

impl RemoteApiError {
    pub fn transient(remote: Remote, message: impl Into<String>) -> Self {
        Self {
            remote,
            kind: RemoteErrorKind::Transient,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn permanent(remote: Remote, message: impl Into<String>) -> Self {
        Self {
            remote,
            kind: RemoteErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Categorizes an error by HTTP status, falling back to the message text.
    pub fn categorize(
        remote: Remote,
        status_code: Option<u16>,
        message: impl Into<String>,
        source: Option<BoxError>,
    ) -> Self {
        let message = message.into();
        let kind = match status_code {
            Some(429) => RemoteErrorKind::Transient,
            Some(403) if is_rate_limit_error(&message) => RemoteErrorKind::Transient,
            Some(code) if (500..600).contains(&code) => RemoteErrorKind::Transient,
            Some(_) => RemoteErrorKind::Permanent,
            None if is_network_error(&message) || is_rate_limit_error(&message) => {
                RemoteErrorKind::Transient
            }
            None => RemoteErrorKind::Permanent,
        };

        Self {
            remote,
            kind,
            status_code,
            message,
            source,
        }
    }

    /// Attaches an HTTP status code.
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Categorizes a reqwest failure. Timeouts and connect failures are transient.
    pub fn from_reqwest(remote: Remote, err: reqwest::Error) -> Self {
        let status_code = err.status().map(|s| s.as_u16());
        let message = err.to_string();
        let mut categorized = Self::categorize(remote, status_code, message, None);
        if err.is_timeout() || err.is_connect() {
            categorized.kind = RemoteErrorKind::Transient;
        }
        categorized.source = Some(Box::new(err));
        categorized
    }

    /// Returns true if the remote answered 404.
    pub fn is_not_found(&self) -> bool {
        self.status_code == Some(404)
    }
}

/// Checks if an error message indicates a rate limit.
fn is_rate_limit_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("rate limit")
        || message_lower.contains("api rate")
        || message_lower.contains("secondary rate")
        || message_lower.contains("ratelimited")
}

/// Checks if an error message indicates a network-level error.
fn is_network_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("timeout")
        || message_lower.contains("connection")
        || message_lower.contains("network")
        || message_lower.contains("dns")
        || message_lower.contains("timed out")
}
