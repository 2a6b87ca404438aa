#![allow(dead_code)]

use ai_tutor::llm::{ChatModel, ChatRequest, DeltaStream, ImageGenerator, LlmError};
use ai_tutor::profile::{LearnerProfile, LearningStyle};
use ai_tutor::{AppState, StreamEncoder};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Replays fixed deltas, or refuses the request outright.
pub struct FakeChat {
    pub deltas: Vec<String>,
    pub reject: bool,
}

#[async_trait]
impl ChatModel for FakeChat {
    async fn chat_stream(&self, _request: &ChatRequest) -> Result<DeltaStream, LlmError> {
        if self.reject {
            return Err(LlmError::Api {
                status: 401,
                message: "Incorrect API key provided".into(),
            });
        }
        let items: Vec<Result<String, LlmError>> = self.deltas.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Maps descriptions to URLs; anything else fails.
pub struct FakeImages(pub HashMap<String, String>);

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.0.get(prompt).cloned().ok_or_else(|| LlmError::Api {
            status: 400,
            message: "content policy".into(),
        })
    }
}

pub fn state(deltas: &[&str], images: &[(&str, &str)]) -> AppState {
    let chat = FakeChat {
        deltas: deltas.iter().map(|d| d.to_string()).collect(),
        reject: false,
    };
    let images = FakeImages(images.iter().map(|(d, u)| (d.to_string(), u.to_string())).collect());
    AppState {
        encoder: StreamEncoder::new(Arc::new(chat), Arc::new(images), "gpt-3.5-turbo"),
    }
}

pub fn rejecting_state() -> AppState {
    let chat = FakeChat {
        deltas: Vec::new(),
        reject: true,
    };
    AppState {
        encoder: StreamEncoder::new(Arc::new(chat), Arc::new(FakeImages(HashMap::new())), "gpt-3.5-turbo"),
    }
}

pub fn learner(style: LearningStyle) -> LearnerProfile {
    LearnerProfile {
        name: "Sam".into(),
        age: 9,
        learning_style: style,
    }
}
