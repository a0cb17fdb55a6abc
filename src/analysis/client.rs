use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, instrument};

use super::{dto::ChatCompletionRequest, errors::AnalysisError};
use crate::config::GroqConfig;

/// Remote chat-completion endpoint. Returns the raw body of a 2xx response.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<String, AnalysisError>;
}

/// OpenAI-compatible Groq endpoint over HTTPS.
#[derive(Clone)]
pub struct GroqClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GroqClient {
    /// Timeouts belong to the transport; nothing above this layer adds its own.
    pub fn new(cfg: &GroqConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_key: cfg.api_key.clone(),
        })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl InferenceClient for GroqClient {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<String, AnalysisError> {
        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "inference request failed");
                AnalysisError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!(error = %e, "reading inference response failed");
            AnalysisError::Transport(e.to_string())
        })?;

        if !status.is_success() {
            error!(%status, "inference endpoint returned an error");
            let snippet: String = body.chars().take(200).collect();
            return Err(AnalysisError::Transport(format!("HTTP {}: {}", status, snippet)));
        }

        debug!(%status, bytes = body.len(), "inference response received");
        Ok(body)
    }
}
