//! Provider and endpoint configuration.
//!
//! Values come from the command line or environment first, then from the
//! settings table, then from built-in defaults.

use crate::db::{Database, StoreError};
use crate::encoder::StreamEncoder;
use crate::llm::claude::{self, ClaudeConfig};
use crate::llm::images::{OpenAiImages, DEFAULT_IMAGE_MODEL};
use crate::llm::openai::{self, OpenAiConfig};
use crate::llm::Provider;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

pub const SETTING_KEYS: &[&str] = &[
    "openai_api_key",
    "openai_base_url",
    "claude_api_key",
    "claude_base_url",
    "ollama_host",
    "default_model",
    "image_model",
    "server_url",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} API key not configured")]
    MissingApiKey(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub claude_api_key: Option<String>,
    pub claude_base_url: Option<String>,
    pub ollama_host: Option<String>,
    pub model: Option<String>,
    pub image_model: Option<String>,
    pub server_url: Option<String>,
}

impl Overrides {
    fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "openai_api_key" => self.openai_api_key.as_deref(),
            "openai_base_url" => self.openai_base_url.as_deref(),
            "claude_api_key" => self.claude_api_key.as_deref(),
            "claude_base_url" => self.claude_base_url.as_deref(),
            "ollama_host" => self.ollama_host.as_deref(),
            "default_model" => self.model.as_deref(),
            "image_model" => self.image_model.as_deref(),
            "server_url" => self.server_url.as_deref(),
            _ => None,
        };
        value.filter(|v| !v.is_empty())
    }
}

/// Layered lookup over overrides and the settings table.
pub struct Config<'a> {
    overrides: &'a Overrides,
    db: &'a Database,
}

impl<'a> Config<'a> {
    pub fn new(overrides: &'a Overrides, db: &'a Database) -> Self {
        Self { overrides, db }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        if let Some(value) = self.overrides.get(key) {
            return Ok(Some(value.to_string()));
        }
        Ok(self.db.get_setting(key)?.filter(|v| !v.is_empty()))
    }

    fn get_or(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        Ok(self.get(key)?.unwrap_or_else(|| default.to_string()))
    }

    pub fn model(&self) -> Result<String, ConfigError> {
        self.get_or("default_model", DEFAULT_MODEL)
    }

    pub fn server_url(&self) -> Result<String, ConfigError> {
        self.get_or("server_url", DEFAULT_SERVER_URL)
    }

    fn openai_config(&self) -> Result<Option<OpenAiConfig>, ConfigError> {
        let Some(api_key) = self.get("openai_api_key")? else {
            return Ok(None);
        };
        let base_url = self.get_or("openai_base_url", openai::DEFAULT_BASE_URL)?;
        Ok(Some(OpenAiConfig { api_key, base_url }))
    }

    /// Resolve a provider from a model string like "openai/gpt-4o",
    /// "claude/..." or "ollama/...". Bare names go to OpenAI.
    pub fn resolve_provider(&self, model: &str) -> Result<(Provider, String), ConfigError> {
        if let Some(model_id) = model.strip_prefix("ollama/") {
            let host = self.get_or("ollama_host", DEFAULT_OLLAMA_HOST)?;
            Ok((Provider::ollama(host), model_id.to_string()))
        } else if let Some(model_id) = model.strip_prefix("claude/") {
            let api_key = self
                .get("claude_api_key")?
                .ok_or(ConfigError::MissingApiKey("Claude"))?;
            let base_url = self.get_or("claude_base_url", claude::DEFAULT_BASE_URL)?;
            Ok((
                Provider::Claude(ClaudeConfig { api_key, base_url }),
                model_id.to_string(),
            ))
        } else {
            let model_id = model.strip_prefix("openai/").unwrap_or(model);
            let config = self
                .openai_config()?
                .ok_or(ConfigError::MissingApiKey("OpenAI"))?;
            Ok((Provider::OpenAi(config), model_id.to_string()))
        }
    }

    /// Image generation always goes through the OpenAI-compatible API.
    /// Without a key every image request fails and is reported per image.
    pub fn image_generator(&self) -> Result<OpenAiImages, ConfigError> {
        let config = match self.openai_config()? {
            Some(config) => config,
            None => {
                warn!("OpenAI API key not configured; image generation will fail");
                OpenAiConfig {
                    api_key: String::new(),
                    base_url: self.get_or("openai_base_url", openai::DEFAULT_BASE_URL)?,
                }
            }
        };
        let model = self.get_or("image_model", DEFAULT_IMAGE_MODEL)?;
        Ok(OpenAiImages::new(config, model))
    }

    pub fn build_encoder(&self) -> Result<StreamEncoder, ConfigError> {
        let model = self.model()?;
        let (provider, model_id) = self.resolve_provider(&model)?;
        let images = self.image_generator()?;
        info!(
            provider = provider.name(),
            model = %model_id,
            image_model = %images.model,
            "Resolved tutor providers"
        );
        Ok(StreamEncoder::new(Arc::new(provider), Arc::new(images), model_id))
    }
}
