//! Ollama Model Backend
//!
//! Runs panel prompts against a local Ollama server through its chat API.
//! Each session keeps its own message history, so sequential prompts on
//! the same session share context.

use super::{LanguageModel, ModelSession};
use crate::config::Config;
use crate::error::{PanelError, PanelResult};
use crate::prompt::{ModelCapabilities, PromptParameters};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Ollama `/api/chat` response (non-streaming)
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// Ollama-backed language model
#[derive(Debug, Clone)]
pub struct OllamaModel {
    client: reqwest::Client,
    url: String,
    model: String,
    timeout: Duration,
    capabilities: ModelCapabilities,
}

impl OllamaModel {
    /// Create new Ollama backend from config
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.ollama_model.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            capabilities: ModelCapabilities {
                default_temperature: config.default_temperature,
                default_top_k: config.default_top_k,
                max_top_k: config.max_top_k,
            },
        }
    }

    /// Health check - verify Ollama is reachable
    pub async fn health_check(&self) -> bool {
        match self
            .client
            .get(format!("{}/api/tags", self.url))
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    async fn params(&self) -> PanelResult<ModelCapabilities> {
        Ok(self.capabilities)
    }

    async fn create(&self, params: &PromptParameters) -> PanelResult<Box<dyn ModelSession>> {
        if !self.health_check().await {
            return Err(PanelError::Unavailable(format!(
                "Ollama is not reachable at {}",
                self.url
            )));
        }

        debug!(
            "🧠 New Ollama session (temperature={}, top_k={})",
            params.temperature, params.top_k
        );
        Ok(Box::new(OllamaSession {
            model: self.clone(),
            params: params.clone(),
            history: vec![ChatMessage::new("system", system_message(params))],
        }))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// One chat conversation with Ollama
#[derive(Debug)]
pub struct OllamaSession {
    model: OllamaModel,
    params: PromptParameters,
    history: Vec<ChatMessage>,
}

#[async_trait]
impl ModelSession for OllamaSession {
    async fn prompt(&mut self, text: &str) -> PanelResult<String> {
        let mut messages = self.history.clone();
        messages.push(ChatMessage::new("user", text));

        let response = self
            .model
            .client
            .post(format!("{}/api/chat", self.model.url))
            .json(&serde_json::json!({
                "model": self.model.model,
                "messages": messages,
                "stream": false,
                "options": {
                    "temperature": self.params.temperature,
                    "top_k": self.params.top_k
                }
            }))
            .timeout(self.model.timeout)
            .send()
            .await?;

        let status = response.status();
        let body_text = response.text().await?;

        if !status.is_success() {
            warn!("❌ Ollama API Error ({}): {}", status, body_text);
            return Err(PanelError::Model(format!(
                "Ollama returned {}: {}",
                status,
                body_text.trim()
            )));
        }

        debug!("🧠 Ollama raw body: {}", body_text);
        let reply = parse_chat_response(&body_text)?;

        // Only commit the exchange once the model has answered
        messages.push(ChatMessage::new("assistant", reply.clone()));
        self.history = messages;
        Ok(reply)
    }

    fn destroy(&mut self) {
        debug!("🧹 Dropping Ollama session ({} messages)", self.history.len());
        self.history.clear();
    }
}

fn system_message(params: &PromptParameters) -> String {
    match &params.output_language {
        Some(lang) => format!(
            "{}\nRespond in the language with code \"{}\".",
            params.system_preamble, lang
        ),
        None => params.system_preamble.clone(),
    }
}

fn parse_chat_response(body: &str) -> PanelResult<String> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
        warn!("❌ Failed to deserialize Ollama response: {} - Body: {}", e, body);
        PanelError::Model(format!("unexpected response from Ollama: {}", e))
    })?;
    Ok(parsed.message.content)
}
