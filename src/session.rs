//! Session Manager
//!
//! Owns the single live model session. The session is created lazily with
//! the parameters of the first prompt after a reset and reused until it is
//! invalidated, either explicitly or by any failure while prompting.

use crate::error::PanelResult;
use crate::model::{LanguageModel, ModelSession};
use crate::prompt::{ModelCapabilities, PromptParameters};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SessionManager {
    backend: Arc<dyn LanguageModel>,
    session: Option<Box<dyn ModelSession>>,
    /// Parameters the live session was created with
    session_params: Option<PromptParameters>,
    created: u64,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn LanguageModel>) -> Self {
        Self {
            backend,
            session: None,
            session_params: None,
            created: 0,
        }
    }

    /// Whether a live session exists
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Parameters of the live session, if any
    pub fn session_params(&self) -> Option<&PromptParameters> {
        self.session_params.as_ref()
    }

    /// How many sessions have been created over the manager's lifetime
    pub fn sessions_created(&self) -> u64 {
        self.created
    }

    pub async fn capabilities(&self) -> PanelResult<ModelCapabilities> {
        self.backend.params().await
    }

    /// Return the live session, creating one with `params` if absent.
    ///
    /// An existing session is returned as-is even when `params` differ;
    /// callers invalidate first when sampling changes.
    pub async fn get_or_create(
        &mut self,
        params: &PromptParameters,
    ) -> PanelResult<&mut Box<dyn ModelSession>> {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                let session = self.backend.create(params).await?;
                self.created += 1;
                info!(
                    "🧠 Model session #{} created via {}",
                    self.created,
                    self.backend.name()
                );
                self.session_params = Some(params.clone());
                session
            }
        };

        Ok(self.session.insert(session))
    }

    /// Destroy the live session, if any
    pub fn invalidate(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.destroy();
            debug!("🧹 Model session invalidated");
        }
        self.session_params = None;
    }

    /// Run one prompt on the (possibly new) session.
    ///
    /// Any failure, during creation or prompting, destroys the session so
    /// the next call starts fresh.
    pub async fn run_prompt(
        &mut self,
        prompt: &str,
        params: &PromptParameters,
    ) -> PanelResult<String> {
        let result = match self.get_or_create(params).await {
            Ok(session) => session.prompt(prompt).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            warn!("❌ Prompt failed, resetting session: {}", e);
            self.invalidate();
        }
        result
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("backend", &self.backend.name())
            .field("has_session", &self.session.is_some())
            .field("created", &self.created)
            .finish()
    }
}
