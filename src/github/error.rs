//! Mapping octocrab failures onto `RemoteApiError`.

use crate::transport::{Remote, RemoteApiError};

/// Categorizes an octocrab error.
///
/// GitHub-reported errors carry their HTTP status. Everything else (network,
/// TLS, deserialization) is categorized from the message text.
pub fn from_octocrab(err: octocrab::Error) -> RemoteApiError {
    let status_code = match &err {
        octocrab::Error::GitHub { source, .. } => Some(source.status_code.as_u16()),
        _ => None,
    };
    let message = err.to_string();
    RemoteApiError::categorize(Remote::GitHub, status_code, message, Some(Box::new(err)))
}
