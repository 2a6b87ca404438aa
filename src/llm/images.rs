use super::openai::OpenAiConfig;
use super::{check_status, ImageGenerator, LlmError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}

/// Image generation against an OpenAI-compatible `/images/generations` API.
#[derive(Debug, Clone)]
pub struct OpenAiImages {
    pub config: OpenAiConfig,
    pub model: String,
    pub size: String,
}

impl OpenAiImages {
    pub fn new(config: OpenAiConfig, model: impl Into<String>) -> Self {
        Self {
            config,
            model: model.into(),
            size: DEFAULT_IMAGE_SIZE.to_string(),
        }
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImages {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let client = Client::new();
        let body = ImageRequest {
            model: &self.model,
            prompt,
            n: 1,
            size: &self.size,
        };

        let resp = self
            .config
            .post(&client, "/images/generations")
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let data: ImageResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        data.data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .ok_or_else(|| LlmError::Parse("image response contained no url".into()))
    }
}
