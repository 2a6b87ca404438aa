pub mod claude;
pub mod images;
pub mod openai;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
}

/// Incremental text deltas from a completion, in arrival order.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Streaming language-model completion.
///
/// The returned stream ends when the provider signals the end of the
/// completion. Errors returned from `chat_stream` itself happen before any
/// text is produced.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat_stream(&self, request: &ChatRequest) -> Result<DeltaStream, LlmError>;
}

/// Text-to-image generation: one prompt in, one image URL out.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// LLM provider, dispatching to the OpenAI-compatible or Claude backend.
#[derive(Debug, Clone)]
pub enum Provider {
    OpenAi(openai::OpenAiConfig),
    Claude(claude::ClaudeConfig),
    Ollama(openai::OpenAiConfig),
}

impl Provider {
    pub fn openai(api_key: String) -> Self {
        Provider::OpenAi(openai::OpenAiConfig {
            api_key,
            base_url: openai::DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn claude(api_key: String) -> Self {
        Provider::Claude(claude::ClaudeConfig {
            api_key,
            base_url: claude::DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn ollama(host: String) -> Self {
        Provider::Ollama(openai::OpenAiConfig {
            api_key: String::new(),
            base_url: format!("{}/v1", host.trim_end_matches('/')),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi(_) => "openai",
            Provider::Claude(_) => "claude",
            Provider::Ollama(_) => "ollama",
        }
    }
}

#[async_trait]
impl ChatModel for Provider {
    async fn chat_stream(&self, request: &ChatRequest) -> Result<DeltaStream, LlmError> {
        match self {
            Provider::OpenAi(config) | Provider::Ollama(config) => {
                openai::chat_stream(config, request).await
            }
            Provider::Claude(config) => claude::chat_stream(config, request).await,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Fail with [`LlmError::Api`] unless the provider answered 2xx.
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    Err(LlmError::Api {
        status,
        message: text,
    })
}

/// Payloads of the `data:` lines of a server-sent-event response body.
///
/// Lines are split on raw bytes so multi-byte characters that straddle
/// network chunks survive intact.
pub(crate) fn sse_data(
    resp: reqwest::Response,
) -> impl Stream<Item = Result<String, LlmError>> + Send {
    try_stream! {
        let mut stream = resp.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(LlmError::from)?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                if let Some(data) = line.trim().strip_prefix("data:") {
                    yield data.trim_start().to_string();
                }
            }
        }
    }
}
