//! Conversational agent
//!
//! An agent is one identity + personality bound to a persistent chat
//! session with a generation capability. Every call replays the session,
//! so the model sees the whole exchange rather than just the latest message.

use crate::error::DialogueError;
use crate::generation::Generator;
use crate::models::{GenerationOutcome, Turn};
use crate::session::ChatSession;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct Agent {
    name: String,
    personality: String,
    session: ChatSession,
    generator: Arc<dyn Generator>,
    timeout: Option<Duration>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        personality: impl Into<String>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            name: name.into(),
            personality: personality.into(),
            session: ChatSession::new(),
            generator,
            timeout: None,
        }
    }

    /// Bound each remote call; an elapsed call counts as a generation failure
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn personality(&self) -> &str {
        &self.personality
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// In-character prompt for a single reply
    pub fn build_prompt(&self, message: &str) -> String {
        format!(
            "You are {}, an AI agent with the following personality: {}\n\
             Respond to this message in a conversational way, staying in character:\n\
             Message: {}\n\n\
             Keep your response concise (2-3 sentences max).",
            self.name, self.personality, message
        )
    }

    /// Generate a reply, keeping success and failure apart
    pub async fn generate(&mut self, message: &str) -> GenerationOutcome {
        let prompt = self.build_prompt(message);

        let call = self.generator.generate(self.session.messages(), &prompt);
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(DialogueError::Timeout(limit.as_millis() as u64)),
            },
            None => call.await,
        };

        match result {
            Ok(text) => {
                self.session.record_exchange(prompt, text.clone());
                debug!(
                    agent = %self.name,
                    exchanges = self.session.exchange_count(),
                    "Reply generated"
                );
                GenerationOutcome::Success(text)
            }
            Err(e) => {
                warn!(agent = %self.name, error = %e, "Generation failed");
                GenerationOutcome::Failure(e.to_string())
            }
        }
    }

    /// Reply to `message` as a transcript turn.
    ///
    /// Never fails: a failed generation becomes a turn whose message starts
    /// with "Error generating response:" and whose `failed` flag is set.
    pub async fn respond(&mut self, message: &str) -> Turn {
        let outcome = self.generate(message).await;
        outcome.into_turn(self.name.clone())
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("personality", &self.personality)
            .field("exchanges", &self.session.exchange_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{GeminiClient, DEFAULT_MODEL};
    use crate::generation::{FailingGenerator, GeminiGenerator, ScriptedGenerator};
    use crate::session::SessionMessage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Captures the history length and prompt of every call
    struct RecordingGenerator {
        seen: Mutex<Vec<(usize, String)>>,
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn generate(&self, history: &[SessionMessage], prompt: &str) -> crate::Result<String> {
            self.seen.lock().unwrap().push((history.len(), prompt.to_string()));
            Ok("noted".to_string())
        }
    }

    #[tokio::test]
    async fn test_respond_success() {
        let mut agent = Agent::new(
            "Agent A",
            "curious",
            Arc::new(ScriptedGenerator::constant("Hi from A")),
        );

        let turn = agent.respond("Hello").await;

        assert_eq!(turn.agent_name, "Agent A");
        assert_eq!(turn.message, "Hi from A");
        assert!(!turn.failed);
        assert!(!turn.timestamp.is_empty());
        assert_eq!(agent.session().exchange_count(), 1);
    }

    #[tokio::test]
    async fn test_session_is_replayed_on_each_call() {
        let generator = Arc::new(RecordingGenerator {
            seen: Mutex::new(Vec::new()),
        });
        let mut agent = Agent::new("Agent B", "analytical", generator.clone());

        agent.respond("first").await;
        agent.respond("second").await;
        agent.respond("third").await;

        let seen = generator.seen.lock().unwrap();
        let history_lens: Vec<usize> = seen.iter().map(|(len, _)| *len).collect();
        assert_eq!(history_lens, vec![0, 2, 4]);

        let (_, prompt) = &seen[2];
        assert!(prompt.contains("You are Agent B"));
        assert!(prompt.contains("analytical"));
        assert!(prompt.contains("Message: third"));
        assert!(prompt.contains("2-3 sentences"));
    }

    #[tokio::test]
    async fn test_failure_is_absorbed_into_turn() {
        let mut agent = Agent::new(
            "Agent A",
            "curious",
            Arc::new(FailingGenerator::new("connection reset")),
        );

        let turn = agent.respond("Hello").await;

        assert!(turn.failed);
        assert_eq!(turn.agent_name, "Agent A");
        assert!(turn.message.starts_with("Error generating response:"));
        assert!(turn.message.contains("connection reset"));
        assert!(agent.session().is_empty());
    }

    #[tokio::test]
    async fn test_generate_distinguishes_failure() {
        let mut agent = Agent::new("Agent A", "curious", Arc::new(FailingGenerator::new("boom")));

        let outcome = agent.generate("Hello").await;
        assert!(!outcome.is_success());
        assert!(matches!(outcome, GenerationOutcome::Failure(reason) if reason.contains("boom")));
    }

    #[tokio::test]
    async fn test_timeout_becomes_failure_turn() {
        let slow = ScriptedGenerator::constant("too late").with_delay(Duration::from_millis(500));
        let mut agent = Agent::new("Agent A", "curious", Arc::new(slow))
            .with_timeout(Duration::from_millis(20));

        let turn = agent.respond("Hello").await;

        assert!(turn.failed);
        assert!(turn.message.contains("Timed out after 20 ms"));
    }

    #[tokio::test]
    async fn test_unreachable_gemini_turn_hides_api_key() {
        let client = GeminiClient::new("SECRET_KEY_123".to_string(), DEFAULT_MODEL)
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let mut agent = Agent::new(
            "Agent A",
            "curious",
            Arc::new(GeminiGenerator::from_client(client)),
        );

        let turn = agent.respond("Hello").await;

        assert!(turn.failed);
        assert!(turn.message.starts_with("Error generating response:"));
        assert!(!turn.message.contains("SECRET_KEY_123"));
    }
}
