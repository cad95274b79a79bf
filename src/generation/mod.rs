//! Generation capability trait and implementations
//!
//! A generator turns a prompt (plus the session's prior exchanges) into
//! response text, or fails. It is the only remote dependency of an agent.

use crate::session::SessionMessage;
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub mod gemini;
pub use gemini::GeminiGenerator;

/// Trait for text generation (LLM controlled)
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a reply to `prompt`, given the earlier exchanges of the session
    async fn generate(&self, history: &[SessionMessage], prompt: &str) -> Result<String>;
}

/// Scripted generator for development & testing
/// Cycles through a fixed list of replies without any LLM dependency
pub struct ScriptedGenerator {
    replies: Vec<String>,
    cursor: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            cursor: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Always answer with the same text
    pub fn constant(reply: impl Into<String>) -> Self {
        let reply: String = reply.into();
        Self::new([reply])
    }

    /// Simulate remote latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of generate calls served so far
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, _history: &[SessionMessage], _prompt: &str) -> Result<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let call = self.cursor.fetch_add(1, Ordering::SeqCst);

        if self.replies.is_empty() {
            return Err(crate::error::DialogueError::GenerationError(
                "scripted generator has no replies".to_string(),
            ));
        }

        Ok(self.replies[call % self.replies.len()].clone())
    }
}

/// Generator that always fails, for exercising degraded conversations
pub struct FailingGenerator {
    reason: String,
}

impl FailingGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _history: &[SessionMessage], _prompt: &str) -> Result<String> {
        Err(crate::error::DialogueError::GenerationError(self.reason.clone()))
    }
}
