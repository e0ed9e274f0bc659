//! Chat-completion collaborator for an OpenAI-compatible endpoint.
//!
//! The hosted deployment talks to CometAPI, but any service exposing
//! `POST {base}/chat/completions` with the usual request/response shape
//! works — the base URL and model are configurable.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use formfox_core::backend::{BoxFuture, ChatMessage, CompletionBackend, CompletionError};

pub const DEFAULT_BASE_URL: &str = "https://api.cometapi.com/v1";
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro-all";

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct CometCompletion {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl CometCompletion {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(DEFAULT_BASE_URL, api_key, DEFAULT_MODEL)
    }

    pub fn with_endpoint(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn reply_text(data: CompletionResponse) -> Option<String> {
    data.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
}

impl CompletionBackend for CometCompletion {
    fn name(&self) -> &str {
        "cometapi"
    }

    fn complete<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, CompletionError>> {
        Box::pin(async move {
            let url = format!("{}/chat/completions", self.base_url);
            let body = CompletionRequest {
                model: &self.model,
                messages,
                stream: false,
            };

            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .timeout(timeout)
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        CompletionError::Timeout
                    } else {
                        CompletionError::Unavailable(e.to_string())
                    }
                })?;

            let status = resp.status();
            if !status.is_success() {
                tracing::warn!(%status, model = %self.model, "completion request rejected");
                return Err(CompletionError::Unavailable(format!("HTTP {status}")));
            }

            let data: CompletionResponse = resp
                .json()
                .await
                .map_err(|e| CompletionError::Unavailable(e.to_string()))?;

            reply_text(data)
                .ok_or_else(|| CompletionError::Unavailable("empty completion reply".to_string()))
        })
    }
}
