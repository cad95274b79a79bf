//! Agent Dialogue Orchestrator
//!
//! Drives a scripted dialogue between two LLM-backed agents and streams
//! each turn to a listening client as it is produced:
//! - Strict two-party alternation, bounded by a configurable turn limit
//! - Each agent keeps a persistent chat session with the model
//! - Generation failures degrade into visible transcript text, never abort
//! - Cooperative cancellation between turns
//! - Ordered, exportable in-memory transcript
//!
//! TURN LOOP:
//! SEED → SPEAK → RECORD → DELIVER → PACE → (next speaker) … → STOP

pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod gemini;
pub mod generation;
pub mod models;
pub mod orchestrator;
pub mod session;

pub use error::Result;

// Re-export common types
pub use agent::Agent;
pub use models::*;
pub use orchestrator::{ConversationConfig, ConversationOrchestrator, TurnStream};
