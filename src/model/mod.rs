//! Language Model Module
//!
//! Provides a unified interface over the language model backend that
//! answers panel prompts.

use crate::config::Config;
use crate::error::{PanelError, PanelResult};
use crate::prompt::{ModelCapabilities, PromptParameters};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub mod ollama;

pub use ollama::OllamaModel;

/// Trait for language model backends
#[async_trait]
pub trait LanguageModel: Send + Sync + std::fmt::Debug {
    /// Sampling bounds the backend supports
    async fn params(&self) -> PanelResult<ModelCapabilities>;

    /// Open a new session configured with `params`
    async fn create(&self, params: &PromptParameters) -> PanelResult<Box<dyn ModelSession>>;

    /// Get the backend name
    fn name(&self) -> &str;
}

/// A live, stateful conversation with the model
#[async_trait]
pub trait ModelSession: Send + std::fmt::Debug {
    /// Send one prompt and wait for the full text reply
    async fn prompt(&mut self, text: &str) -> PanelResult<String>;

    /// Release any resources held by the session
    fn destroy(&mut self);
}

/// Factory to create the configured model backend
pub fn create_backend(config: &Config) -> PanelResult<Arc<dyn LanguageModel>> {
    info!("🛠️ Creating model backend: {}", config.model_backend);
    let backend: Arc<dyn LanguageModel> = match config.model_backend.as_str() {
        "ollama" => {
            info!("  - Using Ollama ({} @ {})", config.ollama_model, config.ollama_url);
            Arc::new(OllamaModel::new(config))
        }
        other => {
            return Err(PanelError::Config(format!(
                "unknown model backend '{}'",
                other
            )))
        }
    };
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_rejects_unknown_backend() {
        let config = Config {
            model_backend: "mystery".to_string(),
            ..Config::default()
        };
        let err = create_backend(&config).unwrap_err();
        assert!(matches!(err, PanelError::Config(_)));
    }

    #[test]
    fn test_factory_builds_ollama() {
        let backend = create_backend(&Config::default()).unwrap();
        assert_eq!(backend.name(), "ollama");
    }
}
