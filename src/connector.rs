//! Builds per-delivery tracker clients from resolved credentials.
//!
//! Credentials differ per link, so interpreters are constructed for each
//! webhook (and each sweep task) rather than shared. Tests swap in a connector
//! that hands out recording interpreters.

use crate::effects::{SourceInterpreter, TargetInterpreter};
use crate::github::{GitHubClient, from_octocrab};
use crate::linear::{self, LinearClient};
use crate::transport::RemoteApiError;
use crate::types::RepoName;

pub trait TrackerConnector: Send + Sync + 'static {
    type Source: SourceInterpreter;
    type Target: TargetInterpreter;

    /// A GitHub interpreter scoped to `repo`.
    fn source(&self, repo: &RepoName, token: &str) -> Result<Self::Source, RemoteApiError>;

    /// A Linear interpreter acting with `token`.
    fn target(&self, token: &str) -> Result<Self::Target, RemoteApiError>;
}

/// Connects to the real APIs.
#[derive(Debug, Clone)]
pub struct LiveConnector {
    github_base_uri: Option<String>,
    linear_endpoint: String,
}

impl Default for LiveConnector {
    fn default() -> Self {
        LiveConnector {
            github_base_uri: None,
            linear_endpoint: linear::DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl LiveConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points both clients somewhere else (GitHub Enterprise, test servers).
    pub fn with_endpoints(github_base_uri: &str, linear_endpoint: &str) -> Self {
        LiveConnector {
            github_base_uri: Some(github_base_uri.to_string()),
            linear_endpoint: linear_endpoint.to_string(),
        }
    }
}

impl TrackerConnector for LiveConnector {
    type Source = GitHubClient;
    type Target = LinearClient;

    fn source(&self, repo: &RepoName, token: &str) -> Result<GitHubClient, RemoteApiError> {
        let client = match &self.github_base_uri {
            Some(base) => GitHubClient::with_base_uri(token, repo.clone(), base),
            None => GitHubClient::from_token(token, repo.clone()),
        };
        client.map_err(from_octocrab)
    }

    fn target(&self, token: &str) -> Result<LinearClient, RemoteApiError> {
        LinearClient::with_endpoint(token, &self.linear_endpoint)
    }
}
