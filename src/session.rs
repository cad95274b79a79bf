//! Per-agent chat session
//!
//! Holds the ordered request/response history an agent replays to the
//! generation capability on every call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a session message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    User,
    Model,
}

/// A single message in an agent's session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    pub timestamp: DateTime<Utc>,
    pub role: SessionRole,
    pub content: String,
    /// Approximate token count
    pub token_count: usize,
}

impl SessionMessage {
    pub fn new(role: SessionRole, content: String) -> Self {
        let token_count = (content.len() + 3) / 4;

        Self {
            timestamp: Utc::now(),
            role,
            content,
            token_count,
        }
    }
}

/// Append-only exchange history, owned by exactly one agent
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    messages: Vec<SessionMessage>,
    total_tokens: usize,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed request/response pair
    pub fn record_exchange(&mut self, prompt: String, reply: String) {
        self.push(SessionMessage::new(SessionRole::User, prompt));
        self.push(SessionMessage::new(SessionRole::Model, reply));
    }

    fn push(&mut self, message: SessionMessage) {
        self.total_tokens += message.token_count;
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[SessionMessage] {
        &self.messages
    }

    pub fn exchange_count(&self) -> usize {
        self.messages.len() / 2
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
