pub mod chat;

pub type Result<T> = core::result::Result<T, LoadgenError>;

#[derive(thiserror::Error, Debug)]
pub enum LoadgenError {
    #[error("config: {0}")]
    Config(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("api returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("decode: {0}")]
    Decode(String),
    #[error("response contained no choices")]
    EmptyResponse,
    #[error("{0}")]
    Message(String),
}

pub mod config {
    use crate::chat::{default_conversation, ChatMessage, Conversation};
    use crate::{LoadgenError, Result};
    use serde::Deserialize;
    use std::env;
    use std::path::Path;

    #[derive(Debug, Clone, Deserialize)]
    #[serde(default)]
    pub struct EndpointConfig {
        pub base_url: String,
        /// Name of the environment variable holding the API key.
        pub api_key_env: String,
        pub timeout_secs: Option<u64>,
    }

    impl Default for EndpointConfig {
        fn default() -> Self {
            Self {
                base_url: "https://api.groq.com/openai/v1".into(),
                api_key_env: "GROQ_API_KEY".into(),
                timeout_secs: None,
            }
        }
    }

    impl EndpointConfig {
        /// Reads the key named by `api_key_env`. Absence is not an error here;
        /// the service rejects the unauthenticated call instead.
        pub fn api_key(&self) -> Option<String> {
            env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
        }
    }

    /// Sampling parameters sent with every request.
    #[derive(Debug, Clone, PartialEq, Deserialize)]
    #[serde(default)]
    pub struct CompletionParams {
        pub model: String,
        pub temperature: f32,
        pub top_p: f32,
        pub max_tokens: u32,
    }

    impl Default for CompletionParams {
        fn default() -> Self {
            Self {
                model: "llama3-70b-8192".into(),
                temperature: 0.0,
                top_p: 1.0,
                max_tokens: 512,
            }
        }
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(default)]
    pub struct LoadgenConfig {
        pub endpoint: EndpointConfig,
        pub params: CompletionParams,
        pub concurrency: usize,
        pub preview_chars: usize,
        pub conversation: Vec<ChatMessage>,
    }

    impl Default for LoadgenConfig {
        fn default() -> Self {
            Self {
                endpoint: EndpointConfig::default(),
                params: CompletionParams::default(),
                concurrency: 50,
                preview_chars: 15,
                conversation: default_conversation(),
            }
        }
    }

    impl LoadgenConfig {
        /// `LOADGEN_CONFIG` names a YAML file; otherwise defaults plus env overrides.
        pub fn load() -> Result<Self> {
            if let Ok(path) = env::var("LOADGEN_CONFIG") {
                return Self::from_path(path);
            }
            let mut cfg = Self::default();
            if let Ok(url) = env::var("LOADGEN_BASE_URL") {
                cfg.endpoint.base_url = url;
            }
            if let Ok(model) = env::var("LOADGEN_MODEL") {
                cfg.params.model = model;
            }
            if let Ok(v) = env::var("LOADGEN_CONCURRENCY") {
                match v.parse() {
                    Ok(n) => cfg.concurrency = n,
                    Err(_) => tracing::warn!(
                        target: "config",
                        "ignoring LOADGEN_CONCURRENCY={:?}; using {}",
                        v,
                        cfg.concurrency
                    ),
                }
            }
            Ok(cfg)
        }

        pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path)
                .map_err(|e| LoadgenError::Config(format!("{}: {e}", path.display())))?;
            Self::from_yaml_str(&text)
        }

        pub fn from_yaml_str(text: &str) -> Result<Self> {
            serde_yaml::from_str(text).map_err(|e| LoadgenError::Config(e.to_string()))
        }

        pub fn conversation(&self) -> Conversation {
            Conversation::new(self.conversation.clone())
        }
    }
}
