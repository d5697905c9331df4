use std::time::SystemTime;

use crate::dto::format_system_time;

/// A chat line as received from the room broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Author of the message.
    pub sender: String,
    /// Message text.
    pub content: String,
    /// Local receipt time (RFC 3339).
    pub received_at: String,
}

/// Append-only log of chat messages in receipt order.
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    /// Append a received message; no deduplication is attempted.
    pub fn push(&mut self, sender: String, content: String) {
        self.messages.push(ChatMessage {
            sender,
            content,
            received_at: format_system_time(SystemTime::now()),
        });
    }

    /// Messages in receipt order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

/// Normalize outbound chat text, rejecting blank messages.
pub fn outbound_content(content: &str) -> Option<&str> {
    let trimmed = content.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
