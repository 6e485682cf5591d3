//! Octocrab client wrapper scoped to a specific repository.
//!
//! `SourceEffect` variants don't carry repository information; the client
//! supplies it.

use octocrab::Octocrab;

use crate::types::RepoName;

/// A GitHub API client scoped to a specific repository.
#[derive(Clone)]
pub struct GitHubClient {
    client: Octocrab,
    repo: RepoName,
}

impl GitHubClient {
    pub fn new(client: Octocrab, repo: RepoName) -> Self {
        Self { client, repo }
    }

    /// Creates a client authenticated with a personal or installation token.
    pub fn from_token(token: impl Into<String>, repo: RepoName) -> Result<Self, octocrab::Error> {
        let client = Octocrab::builder().personal_token(token.into()).build()?;
        Ok(Self::new(client, repo))
    }

    /// Creates a client against a non-default API root (GitHub Enterprise, tests).
    pub fn with_base_uri(
        token: impl Into<String>,
        repo: RepoName,
        base_uri: &str,
    ) -> Result<Self, octocrab::Error> {
        let client = Octocrab::builder()
            .personal_token(token.into())
            .base_uri(base_uri)?
            .build()?;
        Ok(Self::new(client, repo))
    }

    pub fn inner(&self) -> &Octocrab {
        &self.client
    }

    pub fn repo(&self) -> &RepoName {
        &self.repo
    }

    /// `/repos/{owner}/{repo}/issues/{number}` plus `suffix`.
    pub fn issue_route(&self, number: u64, suffix: &str) -> String {
        format!(
            "/repos/{}/{}/issues/{}{}",
            self.repo.owner, self.repo.repo, number, suffix
        )
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}
