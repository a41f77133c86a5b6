use std::time::Duration;

use async_trait::async_trait;
use loadgen_common::config::EndpointConfig;
use loadgen_common::{LoadgenError, Result};

use crate::{CompletionClient, CompletionRequest, CompletionResponse};

/// Client for OpenAI-compatible `chat/completions` endpoints. Clones of the
/// inner `reqwest::Client` share one connection pool.
#[derive(Clone)]
pub struct HttpCompletionClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpCompletionClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let http = builder.build().map_err(|e| LoadgenError::Transport(e.to_string()))?;
        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        Ok(Self { http, url, api_key })
    }

    pub fn from_config(cfg: &EndpointConfig) -> Result<Self> {
        if cfg.api_key().is_none() {
            tracing::debug!(target: "client", "{} is not set; sending unauthenticated requests", cfg.api_key_env);
        }
        Self::new(&cfg.base_url, cfg.api_key(), cfg.timeout_secs.map(Duration::from_secs))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let mut req = self.http.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await.map_err(|e| LoadgenError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(target: "client", "failed to read error body: {}", e);
                    format!("<unreadable body: {e}>")
                }
            };
            return Err(LoadgenError::Api { status: status.as_u16(), body });
        }
        let bytes = resp.bytes().await.map_err(|e| LoadgenError::Transport(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| LoadgenError::Decode(e.to_string()))
    }
}
