//! Core data models for the agent dialogue

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Wall-clock format used for turn timestamps (second precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Sender name used for lifecycle notifications on the wire
pub const SYSTEM_SENDER: &str = "System";

/// Current local time formatted for a turn
pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

//
// ================= Turn =================
//

/// One agent's reply plus metadata. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    #[serde(rename = "agent")]
    pub agent_name: String,
    pub message: String,
    pub timestamp: String,
    /// Set when `message` is an error description rather than a reply
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
}

impl Turn {
    pub fn reply(agent_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            message: message.into(),
            timestamp: timestamp_now(),
            failed: false,
        }
    }

    pub fn generation_failure(agent_name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            agent_name: agent_name.into(),
            message: format!("Error generating response: {}", reason),
            timestamp: timestamp_now(),
            failed: true,
        }
    }

    /// Export line: `[timestamp] agent_name: message`.
    /// Line breaks inside the message are folded into spaces so each turn
    /// stays on exactly one line.
    pub fn export_line(&self) -> String {
        let message = self.message.lines().collect::<Vec<_>>().join(" ");
        format!("[{}] {}: {}", self.timestamp, self.agent_name, message)
    }
}

//
// ================= Generation =================
//

/// Result of one generation attempt at the agent boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Success(String),
    Failure(String),
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Success(_))
    }

    /// Flatten into a transcript turn for `agent_name`
    pub fn into_turn(self, agent_name: impl Into<String>) -> Turn {
        match self {
            GenerationOutcome::Success(text) => Turn::reply(agent_name, text),
            GenerationOutcome::Failure(reason) => Turn::generation_failure(agent_name, reason),
        }
    }
}

//
// ================= Conversation Lifecycle =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConversationState {
    Idle,
    Running,
    Stopped,
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConversationState::Idle => "idle",
            ConversationState::Running => "running",
            ConversationState::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// Why the most recent conversation left `Running`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `max_turns` reached
    Completed,
    /// External `stop()` observed between turns
    Stopped,
    /// Consumer dropped the turn stream
    Abandoned,
    /// A generation failed under the halt policy
    GenerationFailed,
}

/// What to do with a turn whose generation failed
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep going; the error text becomes the next prompt
    #[default]
    Continue,
    /// Deliver the error turn, then end the conversation
    Halt,
}

/// Snapshot of orchestrator state for status queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationStatus {
    pub state: ConversationState,
    pub conversation_id: Option<Uuid>,
    pub turn_index: usize,
    pub max_turns: usize,
    pub agents: Vec<String>,
    pub stop_reason: Option<StopReason>,
}

//
// ================= Wire Notices =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    End,
    Error,
}

/// Terminal notification sent to a streaming client, shaped like a turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemNotice {
    pub agent: String,
    pub message: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: NoticeKind,
}

impl SystemNotice {
    pub fn end() -> Self {
        Self {
            agent: SYSTEM_SENDER.to_string(),
            message: "Conversation complete".to_string(),
            timestamp: String::new(),
            kind: NoticeKind::End,
        }
    }

    pub fn error(detail: impl fmt::Display) -> Self {
        Self {
            agent: SYSTEM_SENDER.to_string(),
            message: format!("Error: {}", detail),
            timestamp: String::new(),
            kind: NoticeKind::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_wire_shape() {
        let turn = Turn::reply("Agent A", "Hello there");
        let json = serde_json::to_value(&turn).unwrap();

        assert_eq!(json["agent"], "Agent A");
        assert_eq!(json["message"], "Hello there");
        assert!(json.get("failed").is_none());
        assert_eq!(turn.timestamp.len(), "2024-01-01 00:00:00".len());
    }

    #[test]
    fn test_failure_turn() {
        let turn = GenerationOutcome::Failure("503 Service Unavailable".to_string())
            .into_turn("Agent B");

        assert!(turn.failed);
        assert_eq!(turn.agent_name, "Agent B");
        assert!(turn.message.starts_with("Error generating response:"));
        assert!(turn.message.ends_with("503 Service Unavailable"));
        assert!(!turn.timestamp.is_empty());
    }

    #[test]
    fn test_export_line() {
        let turn = Turn {
            agent_name: "AgentX".to_string(),
            message: "Hi from X".to_string(),
            timestamp: "2024-05-01 12:00:00".to_string(),
            failed: false,
        };
        assert_eq!(turn.export_line(), "[2024-05-01 12:00:00] AgentX: Hi from X");
    }

    #[test]
    fn test_export_line_folds_multiline_message() {
        let turn = Turn {
            agent_name: "AgentY".to_string(),
            message: "First thought.\nSecond thought.\r\nThird.".to_string(),
            timestamp: "2024-05-01 12:00:01".to_string(),
            failed: false,
        };

        let line = turn.export_line();
        assert_eq!(line.lines().count(), 1);
        assert_eq!(
            line,
            "[2024-05-01 12:00:01] AgentY: First thought. Second thought. Third."
        );
    }

    #[test]
    fn test_system_notices() {
        let end = serde_json::to_value(SystemNotice::end()).unwrap();
        assert_eq!(end["agent"], "System");
        assert_eq!(end["timestamp"], "");
        assert_eq!(end["type"], "end");

        let error = serde_json::to_value(SystemNotice::error("socket closed")).unwrap();
        assert_eq!(error["type"], "error");
        assert_eq!(error["message"], "Error: socket closed");
    }
}
