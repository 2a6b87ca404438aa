use crate::message::{ConversationMessage, Role};

/// Refers to the assistant message a turn is writing into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(usize);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptError {
    #[error("an assistant reply is still streaming")]
    TurnInProgress,
}

/// Ordered chat history. Append-only; render order is insertion order.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    messages: Vec<ConversationMessage>,
    in_progress: Option<MessageHandle>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn in_progress(&self) -> Option<MessageHandle> {
        self.in_progress
    }

    pub fn is_in_progress(&self, handle: MessageHandle) -> bool {
        self.in_progress == Some(handle)
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> Result<&ConversationMessage, TranscriptError> {
        if self.in_progress.is_some() {
            return Err(TranscriptError::TurnInProgress);
        }
        self.messages.push(ConversationMessage::user(content));
        Ok(&self.messages[self.messages.len() - 1])
    }

    /// Append an empty assistant message and mark it as the one in progress.
    pub fn begin_assistant(&mut self) -> Result<MessageHandle, TranscriptError> {
        if self.in_progress.is_some() {
            return Err(TranscriptError::TurnInProgress);
        }
        self.messages.push(ConversationMessage::assistant(String::new()));
        let handle = MessageHandle(self.messages.len() - 1);
        self.in_progress = Some(handle);
        Ok(handle)
    }

    pub fn get(&self, handle: MessageHandle) -> Option<&ConversationMessage> {
        self.messages.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: MessageHandle) -> Option<&mut ConversationMessage> {
        self.messages
            .get_mut(handle.0)
            .filter(|m| m.role == Role::Assistant)
    }

    pub fn append_text(&mut self, handle: MessageHandle, text: &str) {
        if let Some(message) = self.get_mut(handle) {
            message.content.push_str(text);
        }
    }

    /// Release the in-progress mark. Completing another handle is a no-op.
    pub fn complete(&mut self, handle: MessageHandle) {
        if self.in_progress == Some(handle) {
            self.in_progress = None;
        }
    }
}
