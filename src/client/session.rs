use super::decoder::StreamDecoder;
use super::transcript::{MessageHandle, Transcript, TranscriptError};
use crate::message::ChatTurnRequest;
use crate::profile::LearnerProfile;
use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server error: {status} - {message}")]
    Status { status: u16, message: String },
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
}

/// Talks to the chat endpoint on behalf of one learner.
///
/// `send` takes `&mut self`, so a second turn cannot start while one is
/// still streaming.
pub struct ChatClient {
    http: Client,
    endpoint: String,
    profile: LearnerProfile,
}

impl ChatClient {
    pub fn new(server_url: &str, profile: LearnerProfile) -> Self {
        Self {
            http: Client::new(),
            endpoint: format!("{}/api/chat", server_url.trim_end_matches('/')),
            profile,
        }
    }

    pub fn profile(&self) -> &LearnerProfile {
        &self.profile
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one turn: append the user message, post the history, and stream
    /// the reply into a new assistant message.
    ///
    /// Blank input is ignored and returns `Ok(None)`. `on_update` runs after
    /// every body fragment so callers can redraw. If the body breaks off
    /// mid-way the text received so far is kept and the error returned.
    pub async fn send(
        &mut self,
        transcript: &mut Transcript,
        input: &str,
        mut on_update: impl FnMut(&Transcript, MessageHandle),
    ) -> Result<Option<MessageHandle>, ClientError> {
        if input.trim().is_empty() {
            return Ok(None);
        }
        transcript.push_user(input)?;

        let body = ChatTurnRequest {
            messages: transcript.messages().to_vec(),
            student_data: self.profile.clone(),
        };
        debug!(endpoint = %self.endpoint, messages = body.messages.len(), "Sending chat turn");

        let resp = self.http.post(&self.endpoint).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, message });
        }

        let handle = transcript.begin_assistant()?;
        let mut decoder = StreamDecoder::new(handle);
        let mut stream = resp.bytes_stream();
        let mut failure = None;

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    decoder.feed_bytes(transcript, &bytes);
                    on_update(transcript, handle);
                }
                Err(e) => {
                    warn!("Chat stream interrupted: {}", e);
                    failure = Some(e);
                    break;
                }
            }
        }

        decoder.finish(transcript);
        on_update(transcript, handle);

        match failure {
            Some(e) => Err(ClientError::Http(e)),
            None => Ok(Some(handle)),
        }
    }
}
