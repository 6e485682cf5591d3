//! AI rewording of issue descriptions.
//!
//! Reworded text always ends with [`AI_PROCESSED_MARKER`]; text that already
//! carries it is never sent again. Failures are logged and treated as "no
//! rewording", so the sync never depends on the model being reachable.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::RewriteConfig;
use crate::transport::{Remote, RemoteApiError, RetryConfig, RetryPolicy, retry_with_backoff};

/// Appended to every reworded description.
pub const AI_PROCESSED_MARKER: &str = "\n\n---\n*Reworded by AI for clarity.*";

const PROMPT_PREFIX: &str = "Rephrase the following issue description to be more AI prompt friendly. Make it clear, concise, and actionable for an AI agent. Return only the rephrased description, without any of your own conversational text or preamble:";

const TEMPERATURE: f64 = 0.5;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// True if `text` has already been reworded.
pub fn is_ai_processed(text: &str) -> bool {
    text.contains(AI_PROCESSED_MARKER)
}

/// Rewrites issue descriptions.
pub trait Rewriter: Send + Sync + 'static {
    /// Returns the reworded text with the marker appended, or `None` when the
    /// text is empty, already processed, or rewording failed.
    fn reword(&self, text: &str) -> impl Future<Output = Option<String>> + Send;
}

/// Leaves every description untouched. Used when no model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRewrite;

impl Rewriter for NoRewrite {
    async fn reword(&self, _text: &str) -> Option<String> {
        None
    }
}

/// Either a configured model or nothing.
#[derive(Debug, Clone)]
pub enum ConfiguredRewriter {
    OpenAi(OpenAiRewriter),
    Disabled,
}

impl ConfiguredRewriter {
    pub fn from_config(config: Option<&RewriteConfig>) -> Result<Self, RemoteApiError> {
        match config {
            Some(config) => Ok(ConfiguredRewriter::OpenAi(OpenAiRewriter::new(config)?)),
            None => Ok(ConfiguredRewriter::Disabled),
        }
    }
}

impl Rewriter for ConfiguredRewriter {
    async fn reword(&self, text: &str) -> Option<String> {
        match self {
            ConfiguredRewriter::OpenAi(rewriter) => rewriter.reword(text).await,
            ConfiguredRewriter::Disabled => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for any OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiRewriter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OpenAiRewriter {
    pub fn new(config: &RewriteConfig) -> Result<Self, RemoteApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).map_err(|e| {
                RemoteApiError::permanent(Remote::Rewriter, format!("invalid API key header: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                RemoteApiError::permanent(Remote::Rewriter, format!("failed to build client: {e}"))
            })?;

        Ok(OpenAiRewriter {
            client,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }

    async fn complete(&self, prompt: &str) -> Result<Option<String>, RemoteApiError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": TEMPERATURE,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| RemoteApiError::from_reqwest(Remote::Rewriter, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RemoteApiError::categorize(
                Remote::Rewriter,
                Some(status.as_u16()),
                text,
                None,
            ));
        }

        let completion: ChatCompletion = response.json().await.map_err(|e| {
            RemoteApiError::permanent(Remote::Rewriter, format!("invalid completion: {e}"))
        })?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty()))
    }
}

impl Rewriter for OpenAiRewriter {
    async fn reword(&self, text: &str) -> Option<String> {
        if text.is_empty() || is_ai_processed(text) {
            debug!("Description is empty or already processed; not rewording");
            return None;
        }

        let prompt = format!("{PROMPT_PREFIX}\n\n{text}");
        let result = retry_with_backoff(RetryConfig::DEFAULT, RetryPolicy::RetryTransient, || {
            self.complete(&prompt)
        })
        .await;

        match result {
            Ok(Some(reworded)) => Some(format!("{reworded}\n\n{AI_PROCESSED_MARKER}")),
            Ok(None) => {
                debug!("Model returned no text");
                None
            }
            Err(e) => {
                warn!(error = %e, "Rewording failed");
                None
            }
        }
    }
}
