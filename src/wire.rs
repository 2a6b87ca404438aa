//! Wire format shared by the stream encoder and the stream decoder.
//!
//! A chat response body is the raw concatenation of the tutor's text deltas,
//! optionally followed by one image batch:
//!
//! ```text
//! <text deltas...>\n\n__IMAGE_DATA_START__\n[{...}, ...]\n__IMAGE_DATA_END__
//! ```
//!
//! The delimiters are matched byte-for-byte and have no escaping, so model
//! text that contains them verbatim will confuse the decoder.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const IMAGE_DATA_START: &str = "\n\n__IMAGE_DATA_START__\n";
pub const IMAGE_DATA_END: &str = "\n__IMAGE_DATA_END__";

/// A marker found in assistant text, `[IMAGE: <description>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub description: String,
    /// The exact matched span, used for substitution later.
    pub placeholder_text: String,
}

/// One entry of the image batch. Exactly one of `url` / `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResult {
    pub index: usize,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub error: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ImageResult {
    pub fn generated(index: usize, description: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            index,
            description: description.into(),
            url: Some(url.into()),
            error: false,
        }
    }

    pub fn failed(index: usize, description: impl Into<String>) -> Self {
        Self {
            index,
            description: description.into(),
            url: None,
            error: true,
        }
    }
}

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Case sensitive on IMAGE so the display form never matches again.
    PATTERN.get_or_init(|| Regex::new(r"(?s)\[IMAGE:\s*(.*?)\]").expect("marker pattern compiles"))
}

/// Extract every image marker from `text`, left to right.
pub fn extract_markers(text: &str) -> Vec<ImageRequest> {
    marker_pattern()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let description = caps.get(1)?;
            Some(ImageRequest {
                description: description.as_str().to_string(),
                placeholder_text: whole.as_str().to_string(),
            })
        })
        .collect()
}

pub fn marker_text(description: &str) -> String {
    format!("[IMAGE: {}]", description)
}

pub fn display_text(description: &str) -> String {
    format!("[Image: {}]", description)
}

/// Replace the first literal `[IMAGE: d]` with `[Image: d]` for every result.
///
/// Matching is by text, not by index: two identical descriptions both hit the
/// first remaining occurrence in turn.
pub fn substitute_markers(content: &str, results: &[ImageResult]) -> String {
    let mut updated = content.to_string();
    for result in results {
        updated = updated.replacen(
            &marker_text(&result.description),
            &display_text(&result.description),
            1,
        );
    }
    updated
}

/// Serialize a batch with its delimiters, as it appears on the wire.
pub fn encode_image_batch(results: &[ImageResult]) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(results)?;
    Ok(format!("{}{}{}", IMAGE_DATA_START, json, IMAGE_DATA_END))
}
