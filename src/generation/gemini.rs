//! Gemini-backed generator
//!
//! Uses Google's Gemini API to produce in-character replies

use crate::gemini::GeminiClient;
use crate::generation::Generator;
use crate::session::SessionMessage;
use crate::Result;
use async_trait::async_trait;

pub struct GeminiGenerator {
    client: GeminiClient,
}

impl GeminiGenerator {
    pub fn new(api_key: String, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: GeminiClient::new(api_key, model)?,
        })
    }

    pub fn from_client(client: GeminiClient) -> Self {
        Self { client }
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, history: &[SessionMessage], prompt: &str) -> Result<String> {
        self.client.chat(history, prompt).await
    }
}
