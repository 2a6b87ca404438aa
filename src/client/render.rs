use super::transcript::Transcript;
use crate::message::{ConversationMessage, Role};
use std::fmt;

pub const LOADING_INDICATOR: &str = "...";
pub const FAILED_PLACEHOLDER: &str = "Image generation failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderBlock {
    Text(String),
    Loading,
    Image { url: String, caption: String },
    ImageFailed { caption: String },
}

impl fmt::Display for RenderBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderBlock::Text(text) => f.write_str(text),
            RenderBlock::Loading => f.write_str(LOADING_INDICATOR),
            RenderBlock::Image { url, caption } => write!(f, "  [picture] {}\n            {}", caption, url),
            RenderBlock::ImageFailed { caption } => {
                write!(f, "  [{}] {}", FAILED_PLACEHOLDER, caption)
            }
        }
    }
}

/// Display blocks for one message.
///
/// Without images the content is shown as is, or a loading indicator while
/// an assistant reply is still empty. With images the text comes first,
/// then one block per image in batch order.
pub fn render_message(message: &ConversationMessage, in_progress: bool) -> Vec<RenderBlock> {
    let images = match &message.images {
        Some(images) if !images.is_empty() => images,
        _ => {
            if message.content.is_empty() && in_progress && message.role == Role::Assistant {
                return vec![RenderBlock::Loading];
            }
            return vec![RenderBlock::Text(message.content.clone())];
        }
    };

    let mut blocks = Vec::with_capacity(images.len() + 1);
    blocks.push(RenderBlock::Text(message.content.clone()));
    for image in images {
        let caption = image.description.clone();
        match (&image.url, image.error) {
            (Some(url), false) => blocks.push(RenderBlock::Image {
                url: url.clone(),
                caption,
            }),
            _ => blocks.push(RenderBlock::ImageFailed { caption }),
        }
    }
    blocks
}

/// Plain-text rendering of the whole transcript, one speaker label per message.
pub fn render_transcript(transcript: &Transcript) -> String {
    let mut out = String::new();
    let in_progress = transcript.in_progress().and_then(|h| transcript.get(h)).map(|m| m.id.as_str());
    for message in transcript.messages() {
        let label = match message.role {
            Role::Assistant => "AI",
            Role::User => "Me",
        };
        let blocks = render_message(message, in_progress == Some(message.id.as_str()));
        out.push_str(label);
        out.push_str(": ");
        let lines: Vec<String> = blocks.iter().map(|b| b.to_string()).collect();
        out.push_str(&lines.join("\n"));
        out.push('\n');
    }
    out
}
