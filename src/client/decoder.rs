//! Consumer side of the chat stream.
//!
//! The response body arrives in fragments whose boundaries mean nothing: a
//! fragment may end halfway through a UTF-8 sequence, a delimiter, or the
//! image batch JSON. The decoder folds fragments into the transcript so that
//! every way of splitting the same body produces the same final message.

use super::transcript::{MessageHandle, Transcript};
use crate::wire::{substitute_markers, ImageResult, IMAGE_DATA_END, IMAGE_DATA_START};
use std::mem;
use tracing::{debug, warn};

pub struct StreamDecoder {
    handle: MessageHandle,
    collecting_image_data: bool,
    image_buffer: String,
    /// Plain text that might still turn out to be the start delimiter.
    held_text: String,
    /// Incomplete UTF-8 sequence from the end of the last byte fragment.
    utf8_tail: Vec<u8>,
    malformed_batches: usize,
}

impl StreamDecoder {
    pub fn new(handle: MessageHandle) -> Self {
        Self {
            handle,
            collecting_image_data: false,
            image_buffer: String::new(),
            held_text: String::new(),
            utf8_tail: Vec::new(),
            malformed_batches: 0,
        }
    }

    pub fn handle(&self) -> MessageHandle {
        self.handle
    }

    pub fn is_collecting(&self) -> bool {
        self.collecting_image_data
    }

    /// Image batches that were dropped because their JSON did not parse.
    pub fn malformed_batches(&self) -> usize {
        self.malformed_batches
    }

    /// Feed raw body bytes.
    pub fn feed_bytes(&mut self, transcript: &mut Transcript, bytes: &[u8]) {
        self.utf8_tail.extend_from_slice(bytes);
        let text = take_utf8(&mut self.utf8_tail);
        if !text.is_empty() {
            self.feed(transcript, &text);
        }
    }

    /// Feed one text fragment.
    pub fn feed(&mut self, transcript: &mut Transcript, fragment: &str) {
        if self.collecting_image_data {
            self.image_buffer.push_str(fragment);
        } else {
            self.held_text.push_str(fragment);
        }

        loop {
            if self.collecting_image_data {
                let Some(pos) = self.image_buffer.find(IMAGE_DATA_END) else {
                    break;
                };
                let after = self.image_buffer.split_off(pos + IMAGE_DATA_END.len());
                self.image_buffer.truncate(pos);
                let batch = mem::take(&mut self.image_buffer);
                self.collecting_image_data = false;
                self.apply_batch(transcript, &batch);
                self.held_text = after;
            } else if let Some(pos) = self.held_text.find(IMAGE_DATA_START) {
                let after = self.held_text.split_off(pos + IMAGE_DATA_START.len());
                self.held_text.truncate(pos);
                let before = mem::take(&mut self.held_text);
                transcript.append_text(self.handle, &before);
                debug!("Image batch started");
                self.collecting_image_data = true;
                self.image_buffer = after;
            } else {
                let keep = partial_suffix_len(&self.held_text, IMAGE_DATA_START);
                let emit = self.held_text.len() - keep;
                if emit > 0 {
                    let rest = self.held_text.split_off(emit);
                    let text = mem::replace(&mut self.held_text, rest);
                    transcript.append_text(self.handle, &text);
                }
                break;
            }
        }
    }

    /// The transport ended. Flush held-back text and release the message.
    ///
    /// An image batch that never saw its end delimiter is dropped, leaving
    /// the raw markers in the text.
    pub fn finish(mut self, transcript: &mut Transcript) {
        if !self.utf8_tail.is_empty() {
            let tail = String::from_utf8_lossy(&self.utf8_tail).into_owned();
            self.utf8_tail.clear();
            self.feed(transcript, &tail);
        }

        if self.collecting_image_data {
            warn!(
                buffered = self.image_buffer.len(),
                "Stream ended inside an image batch; images dropped"
            );
        } else if !self.held_text.is_empty() {
            let text = mem::take(&mut self.held_text);
            transcript.append_text(self.handle, &text);
        }
        transcript.complete(self.handle);
    }

    fn apply_batch(&mut self, transcript: &mut Transcript, batch: &str) {
        match serde_json::from_str::<Vec<ImageResult>>(batch.trim()) {
            Ok(results) => {
                debug!(count = results.len(), "Image batch received");
                if let Some(message) = transcript.get_mut(self.handle) {
                    message.content = substitute_markers(&message.content, &results);
                    message.images = Some(results);
                }
            }
            Err(e) => {
                self.malformed_batches += 1;
                warn!(error = %e, buffered = batch.len(), "Discarding malformed image batch");
            }
        }
    }
}

/// Length of the longest proper prefix of `delimiter` that `text` ends with.
fn partial_suffix_len(text: &str, delimiter: &str) -> usize {
    let max = text.len().min(delimiter.len() - 1);
    (1..=max)
        .rev()
        .find(|&k| text.ends_with(&delimiter[..k]))
        .unwrap_or(0)
}

/// Decode the complete UTF-8 prefix of `buf`, leaving an unfinished trailing
/// sequence in place. Invalid bytes become U+FFFD.
fn take_utf8(buf: &mut Vec<u8>) -> String {
    let mut out = String::new();
    loop {
        match std::str::from_utf8(&buf[..]) {
            Ok(s) => {
                out.push_str(s);
                buf.clear();
                return out;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                out.push_str(&String::from_utf8_lossy(&buf[..valid]));
                match e.error_len() {
                    Some(bad) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        buf.drain(..valid + bad);
                    }
                    None => {
                        buf.drain(..valid);
                        return out;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encode_image_batch;
    use proptest::prelude::*;

    fn start() -> (Transcript, StreamDecoder) {
        let mut transcript = Transcript::new();
        transcript.push_user("question").unwrap();
        let handle = transcript.begin_assistant().unwrap();
        (transcript, StreamDecoder::new(handle))
    }

    /// Final (content, images, malformed batch count) after feeding `fragments`.
    fn decode(fragments: &[&[u8]]) -> (String, Option<Vec<ImageResult>>, usize) {
        let (mut transcript, mut decoder) = start();
        let handle = decoder.handle();
        for fragment in fragments {
            decoder.feed_bytes(&mut transcript, fragment);
        }
        let malformed = decoder.malformed_batches();
        decoder.finish(&mut transcript);
        assert!(transcript.in_progress().is_none());
        let message = transcript.get(handle).unwrap().clone();
        (message.content, message.images, malformed)
    }

    fn leaf_body() -> String {
        format!(
            "Plants use [IMAGE: sunlight hitting a leaf] to grow.{}",
            encode_image_batch(&[ImageResult::generated(0, "sunlight hitting a leaf", "https://x/img1.png")]).unwrap()
        )
    }

    #[test]
    fn test_single_image_scenario() {
        let body = leaf_body();
        let (content, images, malformed) = decode(&[body.as_bytes()]);
        assert_eq!(content, "Plants use [Image: sunlight hitting a leaf] to grow.");
        assert_eq!(
            images,
            Some(vec![ImageResult::generated(0, "sunlight hitting a leaf", "https://x/img1.png")])
        );
        assert_eq!(malformed, 0);
    }

    #[test]
    fn test_success_and_failure_both_substituted() {
        let body = format!(
            "A [IMAGE: seed] becomes a [IMAGE: tree].{}",
            encode_image_batch(&[
                ImageResult::generated(0, "seed", "https://x/seed.png"),
                ImageResult::failed(1, "tree"),
            ])
            .unwrap()
        );
        let (content, images, _) = decode(&[body.as_bytes()]);
        assert_eq!(content, "A [Image: seed] becomes a [Image: tree].");
        let images = images.unwrap();
        assert_eq!(images.len(), 2);
        assert!(images[1].error);
        assert!(images[1].url.is_none());
    }

    #[test]
    fn test_round_trip_preserves_count_and_order() {
        let descriptions: Vec<String> = (0..6).map(|i| format!("diagram {}", i)).collect();
        let text: String = descriptions.iter().map(|d| format!("Step [IMAGE: {}]. ", d)).collect();
        let results: Vec<ImageResult> = descriptions
            .iter()
            .enumerate()
            .map(|(i, d)| ImageResult::generated(i, d, format!("https://x/{}.png", i)))
            .collect();
        let body = format!("{}{}", text, encode_image_batch(&results).unwrap());

        let (content, images, _) = decode(&[body.as_bytes()]);
        assert_eq!(images.unwrap(), results);
        assert!(crate::wire::extract_markers(&content).is_empty());
    }

    #[test]
    fn test_plain_text_passes_through() {
        let (content, images, _) = decode(&["No pictures ".as_bytes(), "today.\n".as_bytes()]);
        assert_eq!(content, "No pictures today.\n");
        assert!(images.is_none());
    }

    #[test]
    fn test_malformed_batch_keeps_markers() {
        let body = format!(
            "See [IMAGE: a cell].{}[{{\"index\":0,\"desc{}",
            IMAGE_DATA_START, IMAGE_DATA_END
        );
        let (content, images, malformed) = decode(&[body.as_bytes()]);
        assert_eq!(content, "See [IMAGE: a cell].");
        assert!(images.is_none());
        assert_eq!(malformed, 1);
    }

    #[test]
    fn test_unterminated_batch_is_lost() {
        let body = format!("See [IMAGE: a cell].{}[{{\"index\":0", IMAGE_DATA_START);
        let (content, images, malformed) = decode(&[body.as_bytes()]);
        assert_eq!(content, "See [IMAGE: a cell].");
        assert!(images.is_none());
        assert_eq!(malformed, 0);
    }

    #[test]
    fn test_text_after_end_delimiter_is_plain() {
        let body = format!(
            "[IMAGE: x]{} and more",
            encode_image_batch(&[ImageResult::failed(0, "x")]).unwrap()
        );
        let (content, _, _) = decode(&[body.as_bytes()]);
        assert_eq!(content, "[Image: x] and more");
    }

    #[test]
    fn test_trailing_newlines_are_flushed_on_finish() {
        let (mut transcript, mut decoder) = start();
        let handle = decoder.handle();
        decoder.feed(&mut transcript, "Line one\n\n");
        assert_eq!(transcript.get(handle).unwrap().content, "Line one");
        decoder.finish(&mut transcript);
        assert_eq!(transcript.get(handle).unwrap().content, "Line one\n\n");
    }

    #[test]
    fn test_every_single_split_matches_whole_body() {
        let body = format!("Grüße 🌱 {}", leaf_body());
        let bytes = body.as_bytes();
        let expected = decode(&[bytes]);

        for offset in 0..=bytes.len() {
            let (head, tail) = bytes.split_at(offset);
            assert_eq!(decode(&[head, tail]), expected, "split at byte {}", offset);
        }
    }

    #[test]
    fn test_byte_by_byte_matches_whole_body() {
        let body = leaf_body();
        let bytes = body.as_bytes();
        let singles: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(decode(&singles), decode(&[bytes]));
    }

    #[test]
    fn test_take_utf8_holds_incomplete_sequence() {
        let mut buf = "é".as_bytes()[..1].to_vec();
        assert_eq!(take_utf8(&mut buf), "");
        buf.push("é".as_bytes()[1]);
        assert_eq!(take_utf8(&mut buf), "é");
        assert!(buf.is_empty());

        let mut bad = vec![b'a', 0xFF, b'b'];
        assert_eq!(take_utf8(&mut bad), "a\u{FFFD}b");
    }

    #[test]
    fn test_partial_suffix_len() {
        assert_eq!(partial_suffix_len("abc", IMAGE_DATA_START), 0);
        assert_eq!(partial_suffix_len("abc\n", IMAGE_DATA_START), 1);
        assert_eq!(partial_suffix_len("abc\n\n__IMA", IMAGE_DATA_START), 7);
    }

    proptest! {
        #[test]
        fn prop_arbitrary_fragmentation_is_invisible(cuts in proptest::collection::vec(0usize..400, 0..12)) {
            let body = format!(
                "Roots [IMAGE: root hairs] drink; leaves [IMAGE: stomata] breathe.{}\n",
                encode_image_batch(&[
                    ImageResult::generated(0, "root hairs", "https://x/roots.png"),
                    ImageResult::failed(1, "stomata"),
                ]).unwrap()
            );
            let bytes = body.as_bytes();
            let mut cuts: Vec<usize> = cuts.into_iter().map(|c| c % (bytes.len() + 1)).collect();
            cuts.sort_unstable();

            let mut fragments: Vec<&[u8]> = Vec::new();
            let mut last = 0;
            for cut in cuts {
                fragments.push(&bytes[last..cut]);
                last = cut;
            }
            fragments.push(&bytes[last..]);

            prop_assert_eq!(decode(&fragments), decode(&[bytes]));
        }
    }
}
