//! Identity mapping: which link does a delivery act through?
//!
//! A delivery is first matched against a link for its (repository, sender)
//! pair. Senders without a personal link fall back to the repository's
//! anonymous link, but only when an application admin key is configured,
//! since anonymous events act through that key rather than any user's.

use tracing::debug;

use crate::error::SyncError;
use crate::store::MappingStore;
use crate::types::{GithubUserId, RepoId, SyncLink};

/// The link a delivery acts through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub link: SyncLink,
    /// True when the sender has no personal link. Attributions are rendered
    /// generically and the admin key is used for Linear.
    pub anonymous: bool,
}

/// Resolves the link for a delivery from `sender` in `repo_id`.
///
/// `repo_name` is only used in error messages.
pub async fn resolve_identity<S: MappingStore>(
    store: &S,
    admin_key_configured: bool,
    repo_id: RepoId,
    repo_name: &str,
    sender: GithubUserId,
) -> Result<Identity, SyncError> {
    if let Some(link) = store.find_link(repo_id, Some(sender)).await? {
        return Ok(Identity {
            link,
            anonymous: false,
        });
    }

    if !admin_key_configured {
        return Err(SyncError::NotFound(format!(
            "Team not found (repo: {repo_name})"
        )));
    }

    match store.find_link(repo_id, None).await? {
        Some(link) => {
            debug!(repo_id = %repo_id, sender = %sender, "Using anonymous link");
            Ok(Identity {
                link,
                anonymous: true,
            })
        }
        None => Err(SyncError::NotFound(format!(
            "Sync not found (repo: {repo_name})"
        ))),
    }
}
