//! Environment-driven configuration
//!
//! Values come from the process environment (after `dotenv` has loaded any
//! `.env` file). Unset keys fall back to defaults; malformed values are
//! configuration errors.

use crate::agent::Agent;
use crate::error::DialogueError;
use crate::gemini::DEFAULT_MODEL;
use crate::generation::Generator;
use crate::models::FailurePolicy;
use crate::orchestrator::ConversationConfig;
use crate::Result;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SERVER_MAX_TURNS: usize = 5;

const DEFAULT_AGENT_A_NAME: &str = "Agent A";
const DEFAULT_AGENT_A_PERSONALITY: &str =
    "You are a curious and enthusiastic AI who loves learning new things and asking thoughtful questions.";
const DEFAULT_AGENT_B_NAME: &str = "Agent B";
const DEFAULT_AGENT_B_PERSONALITY: &str =
    "You are a knowledgeable and analytical AI who enjoys explaining complex topics in simple terms.";

/// Name and personality of one dialogue participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentProfile {
    pub name: String,
    pub personality: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub port: u16,
    /// Allowed CORS origin; any origin when unset
    pub frontend_url: Option<String>,
    pub conversation: ConversationConfig,
    pub turn_timeout: Option<Duration>,
    pub agents: [AgentProfile; 2],
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let gemini_api_key = get("GEMINI_API_KEY")
            .or_else(|| get("GOOGLE_API_KEY"))
            .unwrap_or_default();

        let port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => DEFAULT_PORT,
        };

        let max_turns = match get("MAX_TURNS") {
            Some(raw) => parse_value("MAX_TURNS", &raw)?,
            None => DEFAULT_SERVER_MAX_TURNS,
        };

        let turn_delay = match get("TURN_DELAY_MS") {
            Some(raw) => Duration::from_millis(parse_value("TURN_DELAY_MS", &raw)?),
            None => crate::orchestrator::DEFAULT_TURN_DELAY,
        };

        let turn_timeout = match get("TURN_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(parse_value("TURN_TIMEOUT_SECS", &raw)?)),
            None => None,
        };

        let failure_policy = match get("HALT_ON_FAILURE") {
            Some(raw) if parse_bool("HALT_ON_FAILURE", &raw)? => FailurePolicy::Halt,
            _ => FailurePolicy::Continue,
        };

        let profile = |prefix: &str, name: &str, personality: &str| AgentProfile {
            name: get(&format!("{}_NAME", prefix)).unwrap_or_else(|| name.to_string()),
            personality: get(&format!("{}_PERSONALITY", prefix))
                .unwrap_or_else(|| personality.to_string()),
        };

        let agents = [
            profile("AGENT_A", DEFAULT_AGENT_A_NAME, DEFAULT_AGENT_A_PERSONALITY),
            profile("AGENT_B", DEFAULT_AGENT_B_NAME, DEFAULT_AGENT_B_PERSONALITY),
        ];

        if agents[0].name == agents[1].name {
            return Err(DialogueError::ConfigurationError(format!(
                "AGENT_A_NAME and AGENT_B_NAME must differ (both are {:?})",
                agents[0].name
            )));
        }

        Ok(Self {
            gemini_api_key,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            port,
            frontend_url: get("FRONTEND_URL"),
            conversation: ConversationConfig {
                max_turns,
                turn_delay,
                failure_policy,
            },
            turn_timeout,
            agents,
        })
    }

    pub fn has_api_key(&self) -> bool {
        !self.gemini_api_key.is_empty()
    }

    /// Instantiate both configured agents over a shared generator
    pub fn build_agents(&self, generator: Arc<dyn Generator>) -> Vec<Agent> {
        self.agents
            .iter()
            .map(|profile| {
                let agent = Agent::new(
                    profile.name.clone(),
                    profile.personality.clone(),
                    Arc::clone(&generator),
                );
                match self.turn_timeout {
                    Some(timeout) => agent.with_timeout(timeout),
                    None => agent,
                }
            })
            .collect()
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| {
        DialogueError::ConfigurationError(format!("Invalid {} value {:?}: {}", key, raw, e))
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DialogueError::ConfigurationError(format!(
            "Invalid {} value {:?}: expected a boolean",
            key, raw
        ))),
    }
}
