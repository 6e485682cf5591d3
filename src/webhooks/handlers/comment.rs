//! `issue_comment` transitions.

use tracing::warn;

use super::Context;
use crate::effects::{NewComment, SourceApi, SourceInterpreter, TargetApi, TargetInterpreter};
use crate::error::{Outcome, SyncError};
use crate::markdown;
use crate::rewrite::Rewriter;
use crate::store::MappingStore;
use crate::webhooks::events::Comment;

impl<S, Src, Tgt, R> Context<'_, S, Src, Tgt, R>
where
    S: MappingStore,
    Src: SourceInterpreter,
    Tgt: TargetInterpreter,
    R: Rewriter,
{
    pub(super) async fn comment_created(&self, comment: &Comment) -> Result<Outcome, SyncError> {
        let number = self.issue.number;

        if markdown::is_sync_echo(&comment.body) {
            return Ok(Outcome::caused_by_sync("comment", number));
        }
        let Some(synced) = &self.synced else {
            return Ok(Outcome::not_synced("comment", number));
        };

        let body = self.resolve_images(comment).await;

        // Anonymous comments are posted under the GitHub user's name and avatar.
        let new_comment = if self.anonymous {
            NewComment {
                issue_id: synced.linear_issue_id.clone(),
                body: markdown::adapt(&body, self.attribution().as_ref()),
                display_name: Some(self.sender.login.clone()),
                display_icon_url: self.sender.avatar_url.clone(),
            }
        } else {
            NewComment {
                issue_id: synced.linear_issue_id.clone(),
                body: markdown::adapt(&body, None),
                display_name: None,
                display_icon_url: None,
            }
        };

        let result = self.target.create_comment(new_comment).await?;
        if !result.success {
            return Err(SyncError::api(format!(
                "Failed to create comment on Linear ticket for GitHub issue {number} (repo: {}).",
                self.repo.id
            )));
        }
        Ok(Outcome::done(format!(
            "Created comment on Linear ticket for GitHub issue {number}."
        )))
    }

    pub(super) async fn comment_edited(&self, comment: &Comment) -> Result<Outcome, SyncError> {
        let number = self.issue.number;

        let Some(synced) = &self.synced else {
            return Ok(Outcome::not_synced("comment edit", number));
        };
        let Some(comment_id) = markdown::comment_marker(&comment.body) else {
            return Ok(Outcome::skipped(format!(
                "Skipping over comment edit for issue {number} as it has no Linear comment ID."
            )));
        };

        let result = self
            .target
            .update_comment(comment_id.to_string(), markdown::adapt(&comment.body, None))
            .await?;
        if !result.success {
            return Err(SyncError::api(format!(
                "Failed to update Linear comment {comment_id} on {} (repo: {}).",
                synced.linear_issue_id, self.repo.id
            )));
        }
        Ok(Outcome::done(format!(
            "Updated Linear comment {comment_id} for GitHub issue {number}."
        )))
    }

    /// Swaps image references for the signed URLs in the rendered comment.
    ///
    /// Falls back to the raw body if the rendered HTML cannot be fetched.
    async fn resolve_images(&self, comment: &Comment) -> String {
        if !markdown::has_inline_images(&comment.body) {
            return comment.body.clone();
        }
        match self.source.body_html(comment.node_id.clone()).await {
            Ok(Some(html)) => {
                let urls = markdown::extract_image_urls(&html);
                markdown::substitute_images(&comment.body, &urls)
            }
            Ok(None) => comment.body.clone(),
            Err(e) => {
                warn!(comment = comment.id, error = %e, "Failed to fetch comment HTML");
                comment.body.clone()
            }
        }
    }
}
