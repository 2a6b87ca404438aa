use super::{check_status, sse_data, ChatRequest, DeltaStream, LlmError};
use async_stream::try_stream;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ClaudeMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Serialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ClaudeStreamEvent {
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: ClaudeDelta },
    #[serde(rename = "message_stop")]
    MessageStop {},
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ClaudeDelta {
    text: Option<String>,
}

// The messages API takes the system prompt out of band.
fn build_request(request: &ChatRequest) -> ClaudeRequest {
    let system_msg = request
        .messages
        .iter()
        .find(|m| m.role == "system")
        .map(|m| m.content.clone());

    let messages: Vec<ClaudeMessage> = request
        .messages
        .iter()
        .filter(|m| m.role != "system")
        .map(|m| ClaudeMessage {
            role: m.role.clone(),
            content: m.content.clone(),
        })
        .collect();

    ClaudeRequest {
        model: request.model.clone(),
        max_tokens: 4096,
        messages,
        stream: true,
        system: system_msg,
    }
}

pub async fn chat_stream(
    config: &ClaudeConfig,
    request: &ChatRequest,
) -> Result<DeltaStream, LlmError> {
    let client = Client::new();
    let body = build_request(request);

    let resp = client
        .post(format!("{}/v1/messages", config.base_url.trim_end_matches('/')))
        .header("Content-Type", "application/json")
        .header("x-api-key", &config.api_key)
        .header("anthropic-version", "2023-06-01")
        .json(&body)
        .send()
        .await?;
    let resp = check_status(resp).await?;

    let mut events = Box::pin(sse_data(resp));
    let deltas = try_stream! {
        while let Some(data) = events.next().await {
            let data = data?;
            match serde_json::from_str::<ClaudeStreamEvent>(&data) {
                Ok(ClaudeStreamEvent::ContentBlockDelta { delta }) => {
                    if let Some(text) = delta.text.filter(|t| !t.is_empty()) {
                        yield text;
                    }
                }
                Ok(ClaudeStreamEvent::MessageStop {}) => break,
                Ok(ClaudeStreamEvent::Other) | Err(_) => {}
            }
        }
    };

    Ok(Box::pin(deltas))
}
