//! Completion-service client: request/response wire types, the client trait,
//! an HTTP implementation for OpenAI-compatible endpoints, and a stub.

use async_trait::async_trait;
use loadgen_common::chat::{Conversation, Role};
use loadgen_common::config::CompletionParams;
use loadgen_common::{LoadgenError, Result};
use serde::{Deserialize, Serialize};

pub mod http;

pub use http::HttpCompletionClient;

/// Body of a non-streaming `chat/completions` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Conversation,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub stream: bool,
    pub stop: Option<Vec<String>>,
}

impl CompletionRequest {
    pub fn new(messages: Conversation, params: &CompletionParams) -> Self {
        Self {
            messages,
            model: params.model.clone(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_p: params.top_p,
            stream: false,
            stop: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    /// Service-side processing time in seconds (Groq extension).
    pub total_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionResponse {
    pub id: Option<String>,
    pub model: Option<String>,
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

impl CompletionResponse {
    /// Text of the first choice. Null content reads as empty; no choices is an error.
    pub fn text(&self) -> Result<&str> {
        let choice = self.choices.first().ok_or(LoadgenError::EmptyResponse)?;
        Ok(choice.message.content.as_deref().unwrap_or(""))
    }

    // Missing usage fields read as zero.
    pub fn total_tokens(&self) -> u64 {
        self.usage.as_ref().and_then(|u| u.total_tokens).unwrap_or(0)
    }

    pub fn total_time(&self) -> f64 {
        self.usage.as_ref().and_then(|u| u.total_time).unwrap_or(0.0)
    }
}

/// A single async RPC to the completion service. Implementations must be safe
/// to call concurrently from many outstanding futures.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

#[cfg(feature = "mock")]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    enum Failure {
        Never,
        Always(String),
        OnCalls(Vec<usize>),
    }

    /// Canned completion service. Latencies are taken by call number (the last
    /// one repeats), and every request is kept for later inspection.
    pub struct StubClient {
        text: String,
        usage: Option<Usage>,
        latencies: Vec<Duration>,
        failure: Failure,
        calls: AtomicUsize,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl Default for StubClient {
        fn default() -> Self {
            Self::new("stub completion text", 0)
        }
    }

    impl StubClient {
        pub fn new(text: impl Into<String>, total_tokens: u64) -> Self {
            Self {
                text: text.into(),
                usage: Some(Usage { total_tokens: Some(total_tokens), ..Usage::default() }),
                latencies: Vec::new(),
                failure: Failure::Never,
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn with_latency(self, latency: Duration) -> Self {
            self.with_latencies(vec![latency])
        }

        pub fn with_latencies(mut self, latencies: Vec<Duration>) -> Self {
            self.latencies = latencies;
            self
        }

        pub fn with_usage(mut self, usage: Option<Usage>) -> Self {
            self.usage = usage;
            self
        }

        pub fn failing(mut self, reason: impl Into<String>) -> Self {
            self.failure = Failure::Always(reason.into());
            self
        }

        /// Fail only the given zero-based call numbers.
        pub fn failing_on(mut self, calls: Vec<usize>) -> Self {
            self.failure = Failure::OnCalls(calls);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }

        fn latency_for(&self, call: usize) -> Duration {
            self.latencies
                .get(call)
                .or_else(|| self.latencies.last())
                .copied()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl CompletionClient for StubClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap_or_else(|e| e.into_inner()).push(request.clone());
            let latency = self.latency_for(call);
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            match &self.failure {
                Failure::Always(reason) => {
                    return Err(LoadgenError::Api { status: 500, body: reason.clone() })
                }
                Failure::OnCalls(calls) if calls.contains(&call) => {
                    return Err(LoadgenError::Api { status: 500, body: format!("stub failure on call {call}") })
                }
                _ => {}
            }
            Ok(CompletionResponse {
                id: Some(format!("stub-{call}")),
                model: Some(request.model.clone()),
                choices: vec![Choice {
                    index: 0,
                    message: ResponseMessage { role: Role::Assistant, content: Some(self.text.clone()) },
                    finish_reason: Some("stop".into()),
                }],
                usage: self.usage.clone(),
            })
        }
    }
}
