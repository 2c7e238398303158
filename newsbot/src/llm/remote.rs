use anyhow::{Context, Result};
use common::{CompletionSettings, Secret};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

use super::{ChatMessage, CompletionClient, CompletionRequest};

/// Remote completion client using an OpenAI-compatible HTTP API
pub struct RemoteCompletionClient {
    api_url: String,
    api_key: Secret,
    timeout: Duration,
    client: reqwest::Client,
}

impl RemoteCompletionClient {
    pub fn new(api_url: impl Into<String>, api_key: Secret, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("newsbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            api_url: api_url.into(),
            api_key,
            timeout,
            client,
        })
    }

    pub fn from_settings(settings: &CompletionSettings) -> Result<Self> {
        Self::new(
            settings.api_url.clone(),
            settings.api_key.clone(),
            settings.timeout,
        )
    }

    /// Single attempt; any non-200 status or unreadable body is an error.
    pub async fn try_complete(&self, request: &CompletionRequest) -> Result<String> {
        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .post(&self.api_url)
                .header("Authorization", format!("Bearer {}", self.api_key.expose()))
                .header("Content-Type", "application/json")
                .json(request)
                .send(),
        )
        .await
        .context("completion request timed out")?
        .context("completion HTTP request failed")?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, body = %excerpt(&body, 300), "completion API error body");
            anyhow::bail!("completion API error: {}", status);
        }

        let body: CompletionResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .context("completion response has no choices")?;

        Ok(choice.message.content)
    }
}

#[async_trait::async_trait]
impl CompletionClient for RemoteCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Option<String> {
        match self.try_complete(&request).await {
            Ok(content) => {
                debug!(chars = content.chars().count(), "completion received");
                Some(content)
            }
            Err(e) => {
                error!(error = %format!("{:#}", e), model = %request.model, "completion call failed");
                None
            }
        }
    }
}

fn excerpt(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}
