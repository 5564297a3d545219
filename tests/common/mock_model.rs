//! Mock Language Model for Testing
//!
//! Records created sessions and prompts, and replays scripted replies.

use async_trait::async_trait;
use lenspanel::error::{PanelError, PanelResult};
use lenspanel::model::{LanguageModel, ModelSession};
use lenspanel::prompt::{ModelCapabilities, PromptParameters};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct MockState {
    /// Scripted replies; `Err` makes the prompt fail. Empty queue echoes.
    pub replies: VecDeque<Result<String, String>>,
    /// Parameters of every session created, in order
    pub created: Vec<PromptParameters>,
    /// (session number, prompt text) for every prompt
    pub prompts: Vec<(usize, String)>,
    pub destroyed: usize,
    pub fail_create: bool,
}

#[derive(Debug, Clone)]
pub struct MockModel {
    pub state: Arc<Mutex<MockState>>,
    pub caps: ModelCapabilities,
    /// Notified whenever a prompt starts
    pub started: Arc<Notify>,
    /// When set, prompts wait for a notification before replying
    pub gate: Option<Arc<Notify>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            caps: super::caps(),
            started: Arc::new(Notify::new()),
            gate: None,
        }
    }

    pub fn with_replies(replies: &[&str]) -> Self {
        let model = Self::new();
        for r in replies {
            model.push_reply(r);
        }
        model
    }

    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let mut model = Self::new();
        model.gate = Some(gate.clone());
        (model, gate)
    }

    pub fn push_reply(&self, reply: &str) {
        self.state
            .lock()
            .unwrap()
            .replies
            .push_back(Ok(reply.to_string()));
    }

    pub fn push_failure(&self, message: &str) {
        self.state
            .lock()
            .unwrap()
            .replies
            .push_back(Err(message.to_string()));
    }

    pub fn fail_create(&self, fail: bool) {
        self.state.lock().unwrap().fail_create = fail;
    }

    pub fn created(&self) -> Vec<PromptParameters> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn prompts(&self) -> Vec<(usize, String)> {
        self.state.lock().unwrap().prompts.clone()
    }

    pub fn destroyed(&self) -> usize {
        self.state.lock().unwrap().destroyed
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn params(&self) -> PanelResult<ModelCapabilities> {
        Ok(self.caps)
    }

    async fn create(&self, params: &PromptParameters) -> PanelResult<Box<dyn ModelSession>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create {
            return Err(PanelError::Unavailable("mock model offline".to_string()));
        }
        state.created.push(params.clone());
        Ok(Box::new(MockSession {
            number: state.created.len(),
            model: self.clone(),
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[derive(Debug)]
pub struct MockSession {
    pub number: usize,
    model: MockModel,
}

#[async_trait]
impl ModelSession for MockSession {
    async fn prompt(&mut self, text: &str) -> PanelResult<String> {
        let reply = {
            let mut state = self.model.state.lock().unwrap();
            state.prompts.push((self.number, text.to_string()));
            state.replies.pop_front()
        };
        self.model.started.notify_one();

        if let Some(gate) = &self.model.gate {
            gate.notified().await;
        }

        match reply {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(PanelError::Model(message)),
            None => Ok(format!("echo: {}", text)),
        }
    }

    fn destroy(&mut self) {
        self.model.state.lock().unwrap().destroyed += 1;
    }
}
