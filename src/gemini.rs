//! Gemini API client for agent chat sessions
//!
//! Sends a full multi-turn `contents` array on every call so the model
//! sees the whole exchange, not just the latest message.
//! Uses a long-lived reqwest::Client for connection pooling.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use reqwest::Client;
use std::time::Duration;
use crate::error::DialogueError;
use crate::session::{SessionMessage, SessionRole};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: impl Into<String>) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            base_url: BASE_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint root (proxies, local mocks)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `prompt` as the next user message after `history`
    pub async fn chat(&self, history: &[SessionMessage], prompt: &str) -> crate::Result<String> {
        if self.api_key.is_empty() {
            return Err(DialogueError::ConfigurationError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}/{}:generateContent", self.base_url, self.model);

        let request = build_request(history, prompt);

        debug!(model = %self.model, history_len = history.len(), "Calling Gemini API");

        let response = self.client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                error!("Gemini API request failed: {}", e);
                DialogueError::LlmError(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);
            return Err(DialogueError::LlmError(format!(
                "Gemini API error ({}): {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            let e = e.without_url();
            error!("Failed to parse Gemini response: {}", e);
            DialogueError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        extract_text(gemini_response)
    }
}

fn build_request(history: &[SessionMessage], prompt: &str) -> GeminiRequest {
    let mut contents: Vec<Content> = history
        .iter()
        .map(|msg| Content {
            role: Some(role_name(msg.role).to_string()),
            parts: vec![Part {
                text: msg.content.clone(),
            }],
        })
        .collect();

    contents.push(Content {
        role: Some("user".to_string()),
        parts: vec![Part {
            text: prompt.to_string(),
        }],
    });

    GeminiRequest {
        contents,
        generation_config: GenerationConfig {
            temperature: 0.9,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 256,
        },
    }
}

fn role_name(role: SessionRole) -> &'static str {
    match role {
        SessionRole::User => "user",
        SessionRole::Model => "model",
    }
}

fn extract_text(response: GeminiResponse) -> crate::Result<String> {
    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        DialogueError::LlmError("No candidates in Gemini response".to_string())
    })?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".to_string());
        return Err(DialogueError::LlmError(format!(
            "Empty response from Gemini (finish reason: {})",
            reason
        )));
    }

    Ok(text.trim().to_string())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}
