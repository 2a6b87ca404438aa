//! Producer side of the chat stream.
//!
//! Tutor text is relayed delta by delta as it arrives. Once the completion
//! has ended, visual learners additionally get one delimited image batch
//! resolved from the `[IMAGE: ...]` markers in the full text.

use crate::llm::{ChatMessage, ChatModel, ChatRequest, ImageGenerator, LlmError};
use crate::message::ConversationMessage;
use crate::profile::LearnerProfile;
use crate::prompt::system_instruction;
use crate::wire::{extract_markers, ImageRequest, ImageResult, IMAGE_DATA_END, IMAGE_DATA_START};
use async_stream::stream;
use futures::future::join_all;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Body fragments in the order they must be written.
pub type EncodedStream = Pin<Box<dyn Stream<Item = String> + Send>>;

#[derive(Clone)]
pub struct StreamEncoder {
    chat: Arc<dyn ChatModel>,
    images: Arc<dyn ImageGenerator>,
    model: String,
}

impl StreamEncoder {
    pub fn new(chat: Arc<dyn ChatModel>, images: Arc<dyn ImageGenerator>, model: impl Into<String>) -> Self {
        Self {
            chat,
            images,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// System instruction followed by the history, role and content only.
    pub fn build_request(&self, history: &[ConversationMessage], profile: &LearnerProfile) -> ChatRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(system_instruction(profile)));
        messages.extend(history.iter().map(ConversationMessage::to_chat_message));
        ChatRequest {
            messages,
            model: self.model.clone(),
        }
    }

    /// Open the completion and return the body stream for this turn.
    ///
    /// An `Err` means the provider refused the request; nothing has been
    /// written yet and the caller should fail the whole response.
    pub async fn encode(
        &self,
        history: &[ConversationMessage],
        profile: &LearnerProfile,
    ) -> Result<EncodedStream, LlmError> {
        let request = self.build_request(history, profile);
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            style = %profile.learning_style,
            "Opening completion stream"
        );
        let mut deltas = self.chat.chat_stream(&request).await?;

        let images = Arc::clone(&self.images);
        let visual = profile.is_visual();

        let body = stream! {
            let mut full_text = String::new();
            while let Some(delta) = deltas.next().await {
                match delta {
                    Ok(text) => {
                        full_text.push_str(&text);
                        yield text;
                    }
                    Err(e) => {
                        error!("Completion stream failed mid-turn: {}", e);
                        return;
                    }
                }
            }

            if !visual {
                return;
            }
            let requests = extract_markers(&full_text);
            if requests.is_empty() {
                return;
            }

            info!(count = requests.len(), "Resolving image markers");
            yield IMAGE_DATA_START.to_string();
            let results = resolve_images(images.as_ref(), &requests).await;
            match serde_json::to_string(&results) {
                Ok(json) => {
                    yield json;
                }
                Err(e) => error!("Failed to serialize image batch: {}", e),
            }
            yield IMAGE_DATA_END.to_string();
        };

        Ok(Box::pin(body))
    }
}

/// Generate every requested image concurrently and wait for all of them.
///
/// Output order follows `requests`; a failed generation becomes an
/// `error: true` entry and never affects the others.
pub async fn resolve_images(images: &dyn ImageGenerator, requests: &[ImageRequest]) -> Vec<ImageResult> {
    let pending = requests.iter().enumerate().map(|(index, request)| async move {
        match images.generate(&request.description).await {
            Ok(url) => ImageResult::generated(index, &request.description, url),
            Err(e) => {
                warn!(index, description = %request.description, "Image generation failed: {}", e);
                ImageResult::failed(index, &request.description)
            }
        }
    });
    join_all(pending).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::DeltaStream;
    use crate::profile::LearningStyle;
    use crate::wire::encode_image_batch;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted completion; `None` entries become mid-stream errors.
    struct ScriptedChat {
        deltas: Vec<Option<String>>,
        reject: bool,
        seen: Mutex<Option<ChatRequest>>,
    }

    impl ScriptedChat {
        fn new(deltas: &[&str]) -> Self {
            Self {
                deltas: deltas.iter().map(|d| Some(d.to_string())).collect(),
                reject: false,
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedChat {
        async fn chat_stream(&self, request: &ChatRequest) -> Result<DeltaStream, LlmError> {
            *self.seen.lock().unwrap() = Some(request.clone());
            if self.reject {
                return Err(LlmError::Api {
                    status: 401,
                    message: "invalid key".into(),
                });
            }
            let items: Vec<Result<String, LlmError>> = self
                .deltas
                .iter()
                .map(|d| d.clone().ok_or_else(|| LlmError::Parse("connection reset".into())))
                .collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    /// Looks descriptions up in a table; missing entries fail. Delays let
    /// later requests finish first.
    struct TableImages {
        urls: HashMap<String, String>,
        delays: HashMap<String, u64>,
    }

    impl TableImages {
        fn new(entries: &[(&str, &str)]) -> Self {
            Self {
                urls: entries.iter().map(|(d, u)| (d.to_string(), u.to_string())).collect(),
                delays: HashMap::new(),
            }
        }
    }

    #[async_trait]
    impl ImageGenerator for TableImages {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            if let Some(ms) = self.delays.get(prompt) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            self.urls
                .get(prompt)
                .cloned()
                .ok_or_else(|| LlmError::Api {
                    status: 500,
                    message: "generation failed".into(),
                })
        }
    }

    fn profile(style: LearningStyle) -> LearnerProfile {
        LearnerProfile {
            name: "Ada".into(),
            age: 10,
            learning_style: style,
        }
    }

    fn encoder(chat: ScriptedChat, images: TableImages) -> StreamEncoder {
        StreamEncoder::new(Arc::new(chat), Arc::new(images), "gpt-3.5-turbo")
    }

    async fn collect(encoder: &StreamEncoder, style: LearningStyle) -> Vec<String> {
        let history = vec![ConversationMessage::user("How do plants grow?")];
        encoder
            .encode(&history, &profile(style))
            .await
            .unwrap()
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_non_visual_never_emits_image_block() {
        for style in [LearningStyle::Auditory, LearningStyle::Kinesthetic, LearningStyle::Reading] {
            let enc = encoder(
                ScriptedChat::new(&["See ", "[IMAGE: a leaf]", " here."]),
                TableImages::new(&[("a leaf", "https://x/leaf.png")]),
            );
            let out = collect(&enc, style).await.concat();
            assert_eq!(out, "See [IMAGE: a leaf] here.");
            assert!(!out.contains(IMAGE_DATA_START));
        }
    }

    #[tokio::test]
    async fn test_visual_without_markers_is_plain_concatenation() {
        let enc = encoder(ScriptedChat::new(&["Plants ", "need ", "water."]), TableImages::new(&[]));
        let out = collect(&enc, LearningStyle::Visual).await;
        assert_eq!(out, vec!["Plants ", "need ", "water."]);
    }

    #[tokio::test]
    async fn test_visual_single_marker_scenario() {
        let enc = encoder(
            ScriptedChat::new(&["Plants use [IMAGE: sunlight ", "hitting a leaf] to grow."]),
            TableImages::new(&[("sunlight hitting a leaf", "https://x/img1.png")]),
        );
        let out = collect(&enc, LearningStyle::Visual).await.concat();
        let expected = format!(
            "Plants use [IMAGE: sunlight hitting a leaf] to grow.{}",
            encode_image_batch(&[ImageResult::generated(0, "sunlight hitting a leaf", "https://x/img1.png")]).unwrap()
        );
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn test_failed_image_is_flagged_and_order_kept() {
        let mut images = TableImages::new(&[("a root", "https://x/root.png"), ("a seed", "https://x/seed.png")]);
        images.delays.insert("a root".into(), 40);
        let enc = encoder(
            ScriptedChat::new(&["[IMAGE: a root] [IMAGE: a stem] [IMAGE: a seed]"]),
            images,
        );
        let out = collect(&enc, LearningStyle::Visual).await;

        let json = &out[out.len() - 2];
        let results: Vec<ImageResult> = serde_json::from_str(json).unwrap();
        assert_eq!(
            results,
            vec![
                ImageResult::generated(0, "a root", "https://x/root.png"),
                ImageResult::failed(1, "a stem"),
                ImageResult::generated(2, "a seed", "https://x/seed.png"),
            ]
        );
        assert_eq!(out[out.len() - 3], IMAGE_DATA_START);
        assert_eq!(out[out.len() - 1], IMAGE_DATA_END);
    }

    /// Every call waits until all expected calls are in flight.
    struct GatedImages {
        gate: tokio::sync::Barrier,
    }

    #[async_trait]
    impl ImageGenerator for GatedImages {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.gate.wait().await;
            Ok(format!("https://x/{}.png", prompt))
        }
    }

    #[tokio::test]
    async fn test_images_are_generated_concurrently() {
        let images = GatedImages {
            gate: tokio::sync::Barrier::new(3),
        };
        let requests = extract_markers("[IMAGE: a] [IMAGE: b] [IMAGE: c]");
        let results = tokio::time::timeout(Duration::from_secs(2), resolve_images(&images, &requests))
            .await
            .expect("image generations did not all run at once");

        let indices: Vec<usize> = results.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(results.iter().all(|r| !r.error));
        assert_eq!(results[2].url.as_deref(), Some("https://x/c.png"));
    }

    #[tokio::test]
    async fn test_rejected_completion_fails_before_streaming() {
        let mut chat = ScriptedChat::new(&["never"]);
        chat.reject = true;
        let enc = encoder(chat, TableImages::new(&[]));
        let result = enc
            .encode(&[ConversationMessage::user("hi")], &profile(LearningStyle::Visual))
            .await;
        assert!(matches!(result, Err(LlmError::Api { status: 401, .. })));
    }

    #[tokio::test]
    async fn test_mid_stream_error_stops_relay_and_skips_images() {
        let mut chat = ScriptedChat::new(&["Look [IMAGE: a cell]", "lost"]);
        chat.deltas.insert(1, None);
        let enc = encoder(chat, TableImages::new(&[("a cell", "https://x/cell.png")]));
        let out = collect(&enc, LearningStyle::Visual).await;
        assert_eq!(out, vec!["Look [IMAGE: a cell]"]);
    }

    #[tokio::test]
    async fn test_request_carries_instruction_and_stripped_history() {
        let chat = Arc::new(ScriptedChat::new(&["ok"]));
        let enc = StreamEncoder::new(chat.clone(), Arc::new(TableImages::new(&[])), "gpt-3.5-turbo");

        let mut earlier = ConversationMessage::assistant("[Image: a frog]");
        earlier.images = Some(vec![ImageResult::failed(0, "a frog")]);
        let history = vec![
            ConversationMessage::user("show me a frog"),
            earlier,
            ConversationMessage::user("thanks"),
        ];
        let _ = enc
            .encode(&history, &profile(LearningStyle::Reading))
            .await
            .unwrap()
            .collect::<Vec<_>>()
            .await;

        let seen = chat.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.model, "gpt-3.5-turbo");
        assert_eq!(seen.messages.len(), 4);
        assert_eq!(seen.messages[0].role, "system");
        assert!(seen.messages[0].content.contains("10 years old"));
        assert_eq!(seen.messages[2].role, "assistant");
        assert_eq!(seen.messages[2].content, "[Image: a frog]");
    }
}
