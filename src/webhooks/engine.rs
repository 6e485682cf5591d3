//! Runs one delivery from raw bytes to an `Outcome`.
//!
//! The order of the steps matters:
//! 1. Parse, and answer pull-request events with a no-op.
//! 2. Verify the signature against the registered repository's secret.
//!    Nothing else is read or written before this succeeds.
//! 3. Resolve the identity and the credentials it acts with.
//! 4. Record the sender's user mapping, look up the mirror, and trigger the
//!    agent if the agent label was applied.
//! 5. Classify and dispatch to a handler.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use super::events::{Delivery, GitHubEvent, IssueAction};
use super::handlers::Context;
use super::parser::parse_webhook;
use super::signature::verify_signature;
use super::transition::classify;
use crate::agent::JulesAgent;
use crate::config::Config;
use crate::connector::TrackerConnector;
use crate::credentials::CredentialResolver;
use crate::error::{Outcome, SyncError};
use crate::identity::{Identity, resolve_identity};
use crate::rewrite::Rewriter;
use crate::store::MappingStore;
use crate::types::{JulesTaskKey, UserLink};

/// The synchronization engine.
///
/// Holds no per-delivery state; every call to [`SyncEngine::handle_webhook`]
/// is an independent unit of work against the store and the trackers.
pub struct SyncEngine<S, C, R> {
    store: Arc<S>,
    connector: Arc<C>,
    rewriter: R,
    credentials: CredentialResolver,
    config: Arc<Config>,
    agent: JulesAgent<S, C>,
}

impl<S: MappingStore, C: TrackerConnector, R: Rewriter> SyncEngine<S, C, R> {
    pub fn new(
        store: Arc<S>,
        connector: Arc<C>,
        rewriter: R,
        credentials: CredentialResolver,
        config: Arc<Config>,
    ) -> Self {
        let agent = JulesAgent::new(
            Arc::clone(&store),
            Arc::clone(&connector),
            credentials.clone(),
            config.agent.clone(),
            TaskTracker::new(),
            CancellationToken::new(),
        );
        SyncEngine {
            store,
            connector,
            rewriter,
            credentials,
            config,
            agent,
        }
    }

    /// Runs delayed agent checks on `tracker`, cancelling them with `shutdown`.
    pub fn with_background(mut self, tracker: TaskTracker, shutdown: CancellationToken) -> Self {
        self.agent = JulesAgent::new(
            Arc::clone(&self.store),
            Arc::clone(&self.connector),
            self.credentials.clone(),
            self.config.agent.clone(),
            tracker,
            shutdown,
        );
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn agent(&self) -> &JulesAgent<S, C> {
        &self.agent
    }

    /// Handles one delivery.
    ///
    /// `signature` is the raw `X-Hub-Signature-256` header and `payload` the
    /// exact bytes received; the digest is computed over those bytes.
    #[instrument(skip(self, signature, payload))]
    pub async fn handle_webhook(
        &self,
        event_type: &str,
        signature: Option<&str>,
        payload: &[u8],
    ) -> Result<Outcome, SyncError> {
        let delivery = parse_webhook(event_type, payload)?;
        let repo_id = delivery.repository.id;

        if delivery
            .event
            .issue()
            .is_some_and(|issue| issue.is_pull_request)
        {
            return Ok(Outcome::skipped("Pull request event."));
        }

        let repo = self.store.find_repo(repo_id).await?.ok_or_else(|| {
            let message = if self.config.admin_key_configured() {
                format!("Sync not found (repo: {repo_id})")
            } else {
                format!("Team not found (repo: {repo_id})")
            };
            SyncError::NotFound(message)
        })?;

        let secret = repo.webhook_secret.as_deref().unwrap_or_default();
        let verified = signature
            .is_some_and(|header| verify_signature(payload, header, secret.as_bytes()));
        if !verified {
            warn!(repo_id = %repo_id, "Webhook signature mismatch");
            return Err(SyncError::Authentication { repo_id });
        }

        let identity = resolve_identity(
            self.store.as_ref(),
            self.config.admin_key_configured(),
            repo_id,
            &repo_id.to_string(),
            delivery.sender.id,
        )
        .await?;

        if !identity.anonymous {
            self.record_user(&identity).await?;
        }

        let Some(issue) = delivery.event.issue() else {
            debug!(event_type, "Not an issue event");
            return Ok(Outcome::skipped("Not an issue event."));
        };

        let credentials = self.credentials.resolve(&identity.link, identity.anonymous)?;
        let source = self
            .connector
            .source(&identity.link.repo.repo_name, &credentials.github_token)?;
        let target = self.connector.target(&credentials.linear_token)?;

        let synced = self.store.find_synced_issue(repo_id, issue.number).await?;

        self.trigger_agent(&delivery).await?;

        let transition = classify(&delivery.event, &self.config.labels.promote_label);
        let ctx = Context {
            store: self.store.as_ref(),
            source,
            target,
            rewriter: &self.rewriter,
            config: self.config.as_ref(),
            repo: &delivery.repository,
            sender: &delivery.sender,
            issue,
            link: &identity.link,
            anonymous: identity.anonymous,
            synced,
        };

        let outcome = ctx.dispatch(transition).await?;
        match &outcome {
            Outcome::Done(message) => info!(repo_id = %repo_id, issue = %issue.number, "{message}"),
            Outcome::Skipped(message) => {
                debug!(repo_id = %repo_id, issue = %issue.number, "{message}")
            }
        }
        Ok(outcome)
    }

    async fn record_user(&self, identity: &Identity) -> Result<(), SyncError> {
        let sync = &identity.link.sync;
        if let (Some(github_user_id), Some(linear_user_id)) =
            (sync.github_user_id, sync.linear_user_id.clone())
        {
            self.store
                .upsert_user(UserLink {
                    github_user_id,
                    linear_user_id,
                })
                .await?;
        }
        Ok(())
    }

    /// Applying the agent label (re)starts the agent's retry bookkeeping.
    async fn trigger_agent(&self, delivery: &Delivery) -> Result<(), SyncError> {
        let GitHubEvent::Issues(event) = &delivery.event else {
            return Ok(());
        };
        let is_agent_label = event
            .label
            .as_deref()
            .is_some_and(|label| label == self.agent.config().active_label);
        if event.action != IssueAction::Labeled || !is_agent_label {
            return Ok(());
        }

        self.agent
            .assign(JulesTaskKey {
                github_repo_id: delivery.repository.id,
                github_issue_id: event.issue.id,
                github_issue_number: event.issue.number,
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
