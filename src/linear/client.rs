//! Minimal Linear GraphQL client.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use crate::transport::{Remote, RemoteApiError};

pub const DEFAULT_ENDPOINT: &str = "https://api.linear.app/graphql";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// A Linear API client authenticated with one API key.
#[derive(Clone)]
pub struct LinearClient {
    http: reqwest::Client,
    endpoint: String,
}

impl LinearClient {
    pub fn new(api_key: &str) -> Result<Self, RemoteApiError> {
        Self::with_endpoint(api_key, DEFAULT_ENDPOINT)
    }

    /// Client for a non-default endpoint (tests, proxies).
    pub fn with_endpoint(api_key: &str, endpoint: &str) -> Result<Self, RemoteApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        // Personal API keys are sent bare, without a `Bearer` prefix.
        let mut auth = HeaderValue::from_str(api_key.trim()).map_err(|e| {
            RemoteApiError::permanent(Remote::Linear, format!("invalid API key header: {e}"))
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                RemoteApiError::permanent(Remote::Linear, format!("failed to build client: {e}"))
            })?;

        Ok(LinearClient {
            http,
            endpoint: endpoint.to_string(),
        })
    }

    /// Runs a query or mutation and returns its `data` object.
    ///
    /// GraphQL-level errors are reported as failures even on HTTP 200.
    pub async fn graphql(&self, query: &str, variables: Value) -> Result<Value, RemoteApiError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| RemoteApiError::from_reqwest(Remote::Linear, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RemoteApiError::categorize(
                Remote::Linear,
                Some(status.as_u16()),
                text,
                None,
            ));
        }

        let body: GraphQlResponse = response.json().await.map_err(|e| {
            RemoteApiError::permanent(Remote::Linear, format!("invalid GraphQL response: {e}"))
        })?;

        if !body.errors.is_empty() {
            let message = body
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RemoteApiError::categorize(Remote::Linear, None, message, None));
        }

        body.data
            .ok_or_else(|| RemoteApiError::permanent(Remote::Linear, "response has no data"))
    }
}

impl std::fmt::Debug for LinearClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
