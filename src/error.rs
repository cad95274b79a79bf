//! Error types for the agent dialogue orchestrator

use thiserror::Error;

/// Result type alias for dialogue operations
pub type Result<T> = std::result::Result<T, DialogueError>;

#[derive(Error, Debug)]
pub enum DialogueError {

    // =============================
    // Conversation Lifecycle Errors
    // =============================

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Conversation already in progress: {0}")]
    ConversationInProgress(String),

    // =============================
    // Generation Errors
    // =============================

    #[error("Generation error: {0}")]
    GenerationError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    // =============================
    // Transport Errors
    // =============================

    #[error("Transport error: {0}")]
    TransportError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
