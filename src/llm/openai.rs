use super::{check_status, sse_data, ChatRequest, DeltaStream, LlmError};
use async_stream::try_stream;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
}

impl OpenAiConfig {
    /// POST `path` under the base URL, with bearer auth when a key is set.
    pub(crate) fn post(&self, client: &Client, path: &str) -> reqwest::RequestBuilder {
        let mut req = client
            .post(format!("{}{}", self.base_url.trim_end_matches('/'), path))
            .header("Content-Type", "application/json");

        if !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }
        req
    }
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiStreamResponse {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
}

/// Start a streaming chat completion.
///
/// Fails before yielding anything when the request is rejected; afterwards
/// yields each `delta.content` until `[DONE]` or a `finish_reason`.
pub async fn chat_stream(
    config: &OpenAiConfig,
    request: &ChatRequest,
) -> Result<DeltaStream, LlmError> {
    let client = Client::new();
    let messages: Vec<OpenAiMessage> = request
        .messages
        .iter()
        .map(|m| OpenAiMessage {
            role: m.role.clone(),
            content: m.content.clone(),
        })
        .collect();

    let body = OpenAiRequest {
        model: request.model.clone(),
        messages,
        stream: true,
    };

    let resp = config
        .post(&client, "/chat/completions")
        .json(&body)
        .send()
        .await?;
    let resp = check_status(resp).await?;

    let mut events = Box::pin(sse_data(resp));
    let deltas = try_stream! {
        while let Some(data) = events.next().await {
            let data = data?;
            if data == "[DONE]" {
                break;
            }

            let parsed = match serde_json::from_str::<OpenAiStreamResponse>(&data) {
                Ok(parsed) => parsed,
                Err(e) => {
                    debug!("Skipping unparseable stream event: {}", e);
                    continue;
                }
            };

            if let Some(choice) = parsed.choices.into_iter().next() {
                if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                    yield content;
                }
                if choice.finish_reason.is_some() {
                    break;
                }
            }
        }
    };

    Ok(Box::pin(deltas))
}
