//! Prompt Panel
//!
//! Receives forwarded selection actions and free-form prompts, runs them
//! through the shared model session and keeps the display state the user
//! sees. Model work runs on a single task fed by a one-slot queue, so at
//! most one request is in flight and one waits; anything beyond that is
//! rejected as busy.
//!
//! Controls never wait for the model. Status is read from the last
//! published snapshot, and reset/sampling changes are recorded in shared
//! state that the task picks up: a reset cancels the in-flight request,
//! a sampling change retires the live session once its reply is in.

use crate::citation::{format_citation, parse_citation, Citation};
use crate::error::{PanelError, PanelResult};
use crate::export::{export_text, RESULT_EXPORT_FILE};
use crate::model::LanguageModel;
use crate::prompt::{
    build_citation_request, build_free_prompt, build_request, Action, ModelCapabilities,
    PromptRequest, Sampling,
};
use crate::render::render_markdown;
use crate::session::SessionManager;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Message forwarded from the selection router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelMessage {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PanelMessage {
    pub fn new(action: Action, text: impl Into<String>, url: Option<String>) -> Self {
        Self {
            action: action.id().to_string(),
            text: text.into(),
            url,
        }
    }
}

/// What the panel is currently showing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum DisplayState {
    Idle,
    Loading,
    ShowingResult { markdown: String, html: String },
    ShowingError { message: String },
}

impl DisplayState {
    pub fn label(&self) -> &'static str {
        match self {
            DisplayState::Idle => "idle",
            DisplayState::Loading => "loading",
            DisplayState::ShowingResult { .. } => "showing-result",
            DisplayState::ShowingError { .. } => "showing-error",
        }
    }
}

/// Snapshot of the panel for status queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelStatus {
    pub display: DisplayState,
    pub sampling: Sampling,
    pub has_session: bool,
    pub sessions_created: u64,
}

/// Control values written by handles and read by the panel task
#[derive(Debug)]
struct Controls {
    sampling: Sampling,
    capabilities: Option<ModelCapabilities>,
    /// Bumped whenever the live session must not be reused
    session_epoch: u64,
    /// Bumped by every reset
    reset_epoch: u64,
}

#[derive(Debug)]
struct Shared {
    controls: Mutex<Controls>,
    status: watch::Sender<PanelStatus>,
    /// Wakes the panel task when a reset should cancel its request
    cancel: Notify,
    export_dir: PathBuf,
}

impl Shared {
    fn controls(&self) -> MutexGuard<'_, Controls> {
        self.controls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_sampling(&self, sampling: Sampling) -> Sampling {
        let mut controls = self.controls();
        let applied = match &controls.capabilities {
            Some(caps) => sampling.clamped(caps),
            None => sampling,
        };
        controls.sampling = applied;
        controls.session_epoch += 1;
        self.status.send_modify(|status| {
            status.sampling = applied;
            status.has_session = false;
        });
        debug!(
            "🎚️ Sampling set to temperature={}, top_k={}",
            applied.temperature, applied.top_k
        );
        applied
    }

    fn reset(&self) {
        {
            let mut controls = self.controls();
            controls.session_epoch += 1;
            controls.reset_epoch += 1;
            self.status.send_modify(|status| {
                status.display = DisplayState::Idle;
                status.has_session = false;
            });
        }
        self.cancel.notify_waiters();
        info!("🔄 Panel reset");
    }
}

pub struct Panel {
    sessions: SessionManager,
    state: DisplayState,
    shared: Arc<Shared>,
    /// Control epochs this panel has applied
    session_epoch: u64,
    reset_epoch: u64,
}

impl Panel {
    pub fn new(backend: Arc<dyn LanguageModel>, sampling: Sampling, export_dir: PathBuf) -> Self {
        let (status, _) = watch::channel(PanelStatus {
            display: DisplayState::Idle,
            sampling,
            has_session: false,
            sessions_created: 0,
        });
        let shared = Shared {
            controls: Mutex::new(Controls {
                sampling,
                capabilities: None,
                session_epoch: 0,
                reset_epoch: 0,
            }),
            status,
            cancel: Notify::new(),
            export_dir,
        };
        Self {
            sessions: SessionManager::new(backend),
            state: DisplayState::Idle,
            shared: Arc::new(shared),
            session_epoch: 0,
            reset_epoch: 0,
        }
    }

    /// Seed the sampling controls from the backend's advertised defaults
    pub async fn init_defaults(&mut self) -> PanelResult<Sampling> {
        let caps = self.sessions.capabilities().await?;
        let sampling = Sampling::from_capabilities(&caps);
        {
            let mut controls = self.shared.controls();
            controls.capabilities = Some(caps);
            controls.sampling = sampling;
        }
        self.publish();
        info!(
            "🎚️ Sampling defaults: temperature={}, top_k={} (max {})",
            sampling.temperature, sampling.top_k, caps.max_top_k
        );
        Ok(sampling)
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    pub fn sampling(&self) -> Sampling {
        self.shared.controls().sampling
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Last published status
    pub fn status(&self) -> PanelStatus {
        self.shared.status.borrow().clone()
    }

    /// Change temperature/top-K. The live session is dropped so the next
    /// prompt picks up the new values.
    pub fn set_sampling(&mut self, sampling: Sampling) -> Sampling {
        let applied = self.shared.set_sampling(sampling);
        self.sync_controls();
        applied
    }

    /// Clear the display and drop the live session
    pub fn reset(&mut self) {
        self.shared.reset();
        self.sync_controls();
    }

    /// Handle a message forwarded by the selection router.
    ///
    /// Returns `false` when the message was ignored: missing action or
    /// text, unknown action, or an action the panel does not run.
    pub async fn handle_message(&mut self, message: PanelMessage) -> bool {
        if message.action.is_empty() || message.text.is_empty() {
            debug!("Ignoring incomplete panel message");
            return false;
        }
        let Some(action) = Action::from_id(&message.action) else {
            debug!("Ignoring unknown action '{}'", message.action);
            return false;
        };

        info!("📨 Panel action: {}", action);
        self.sync_controls();
        match action {
            Action::ExtractCitation => {
                self.begin_loading();
                let url = message.url.unwrap_or_default();
                let outcome = self.extract_citation(&message.text, &url).await;
                if self.sync_controls() {
                    match outcome {
                        Ok(citation) => self.show_result(format_citation(&citation)),
                        Err(e) => self.show_error(&e),
                    }
                }
                true
            }
            _ => match build_request(action, &message.text, self.sampling()) {
                Some(request) => {
                    self.execute(request).await;
                    true
                }
                None => {
                    debug!("Action '{}' has no prompt template", action);
                    false
                }
            },
        }
    }

    /// Run the free-form prompt box
    pub async fn run_free_prompt(&mut self, text: &str) -> PanelResult<()> {
        if text.trim().is_empty() {
            return Err(PanelError::EmptyInput("Prompt cannot be empty.".to_string()));
        }
        self.sync_controls();
        let request = build_free_prompt(text, self.sampling());
        self.execute(request).await;
        Ok(())
    }

    /// Ask the model for citation metadata about `text`.
    ///
    /// Extraction needs temperature 0 / top-K 1, so it never runs on a
    /// session created with slider values, and its own session is dropped
    /// afterwards.
    pub async fn extract_citation(&mut self, text: &str, page_url: &str) -> PanelResult<Citation> {
        let request = build_citation_request(text);
        if self.sessions.session_params() != Some(&request.params) {
            self.sessions.invalidate();
        }
        let reply = self
            .sessions
            .run_prompt(&request.prompt, &request.params)
            .await;
        self.sessions.invalidate();
        Ok(parse_citation(&reply?, page_url))
    }

    /// Save the current result to `prompt-result.txt`
    pub fn export_result(&self, dir: Option<PathBuf>) -> PanelResult<PathBuf> {
        let dir = dir.unwrap_or_else(|| self.shared.export_dir.clone());
        export_display(&self.state, &dir)
    }

    async fn execute(&mut self, request: PromptRequest) {
        self.begin_loading();
        let outcome = self
            .sessions
            .run_prompt(&request.prompt, &request.params)
            .await;
        if !self.sync_controls() {
            debug!("Discarding reply to a request made before the last reset");
            return;
        }
        match outcome {
            Ok(reply) => self.show_result(reply),
            Err(e) => self.show_error(&e),
        }
    }

    /// Apply control changes made through a handle.
    ///
    /// Returns `false` when a reset arrived since the panel last looked,
    /// in which case the display is back to idle.
    fn sync_controls(&mut self) -> bool {
        let (session_epoch, reset_epoch) = {
            let controls = self.shared.controls();
            (controls.session_epoch, controls.reset_epoch)
        };
        if session_epoch != self.session_epoch {
            self.session_epoch = session_epoch;
            self.sessions.invalidate();
        }
        let current = reset_epoch == self.reset_epoch;
        if !current {
            self.reset_epoch = reset_epoch;
            self.state = DisplayState::Idle;
        }
        self.publish();
        current
    }

    /// Drop whatever the cancelled request left behind
    fn abandon(&mut self) {
        self.sessions.invalidate();
        self.state = DisplayState::Idle;
        self.sync_controls();
    }

    fn publish(&self) {
        let controls = self.shared.controls();
        // A reset this panel has not applied yet owns the display
        if controls.reset_epoch != self.reset_epoch {
            return;
        }
        let snapshot = PanelStatus {
            display: self.state.clone(),
            sampling: controls.sampling,
            has_session: self.sessions.has_session() && controls.session_epoch == self.session_epoch,
            sessions_created: self.sessions.sessions_created(),
        };
        self.shared.status.send_modify(|status| *status = snapshot);
    }

    fn begin_loading(&mut self) {
        self.state = DisplayState::Loading;
        self.publish();
    }

    fn show_result(&mut self, markdown: String) {
        let html = render_markdown(&markdown);
        self.state = DisplayState::ShowingResult { markdown, html };
        self.publish();
    }

    fn show_error(&mut self, err: &PanelError) {
        error!("❌ Prompt failed: {}", err);
        self.state = DisplayState::ShowingError {
            message: err.to_string(),
        };
        self.publish();
    }

    async fn apply(&mut self, command: PanelCommand) -> PanelResult<PanelReply> {
        match command {
            PanelCommand::Message(message) => {
                if self.handle_message(message).await {
                    Ok(PanelReply::Status(self.status()))
                } else {
                    Ok(PanelReply::Ignored)
                }
            }
            PanelCommand::FreePrompt(text) => {
                self.run_free_prompt(&text).await?;
                Ok(PanelReply::Status(self.status()))
            }
        }
    }
}

impl std::fmt::Debug for Panel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Panel")
            .field("state", &self.state.label())
            .field("sessions", &self.sessions)
            .finish()
    }
}

fn export_display(display: &DisplayState, dir: &Path) -> PanelResult<PathBuf> {
    let text = match display {
        DisplayState::ShowingResult { markdown, .. } => markdown.as_str(),
        _ => "",
    };
    export_text(dir, RESULT_EXPORT_FILE, text, "No prompt result to export.")
}

/// Model work queued for the panel task
#[derive(Debug, Clone)]
pub enum PanelCommand {
    Message(PanelMessage),
    FreePrompt(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelReply {
    Ignored,
    Status(PanelStatus),
}

struct Envelope {
    command: PanelCommand,
    reply: oneshot::Sender<PanelResult<PanelReply>>,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("command", &self.command)
            .finish()
    }
}

/// Cloneable handle to the panel task
#[derive(Clone, Debug)]
pub struct PanelHandle {
    tx: mpsc::Sender<Envelope>,
    shared: Arc<Shared>,
    status: watch::Receiver<PanelStatus>,
}

impl PanelHandle {
    /// Move `panel` onto its own task. Returns the handle and the task.
    pub fn spawn(mut panel: Panel) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Envelope>(1);
        let shared = panel.shared.clone();
        let handle = Self {
            tx,
            status: shared.status.subscribe(),
            shared: shared.clone(),
        };

        let task = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                // Created before the work starts so no reset is missed
                let cancelled = shared.cancel.notified();
                let result = tokio::select! {
                    result = panel.apply(envelope.command) => result,
                    _ = cancelled => Err(PanelError::Cancelled),
                };
                if matches!(result, Err(PanelError::Cancelled)) {
                    warn!("🛑 In-flight request cancelled by reset");
                    panel.abandon();
                }
                // The requester may not wait for the outcome
                let _ = envelope.reply.send(result);
            }
            info!("🛑 Panel task stopped");
        });
        (handle, task)
    }

    /// Current status, without waiting for running model work
    pub fn status(&self) -> PanelStatus {
        self.status.borrow().clone()
    }

    /// Receiver that sees every published status
    pub fn subscribe(&self) -> watch::Receiver<PanelStatus> {
        self.status.clone()
    }

    /// Reset the panel. A request in flight is cancelled and its reply
    /// discarded.
    pub fn reset(&self) -> PanelStatus {
        self.shared.reset();
        self.status()
    }

    /// Change sampling. A request in flight finishes, but its session is
    /// not reused.
    pub fn set_sampling(&self, sampling: Sampling) -> PanelStatus {
        self.shared.set_sampling(sampling);
        self.status()
    }

    /// Save the displayed result to `prompt-result.txt`
    pub fn export_result(&self, dir: Option<PathBuf>) -> PanelResult<PathBuf> {
        let dir = dir.unwrap_or_else(|| self.shared.export_dir.clone());
        export_display(&self.status().display, &dir)
    }

    fn enqueue(&self, command: PanelCommand) -> PanelResult<oneshot::Receiver<PanelResult<PanelReply>>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .try_send(Envelope { command, reply })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(envelope) => {
                    warn!("⏳ Panel busy, rejecting {:?}", envelope.command);
                    PanelError::Busy
                }
                mpsc::error::TrySendError::Closed(_) => {
                    PanelError::PanelUnavailable("panel task has stopped".to_string())
                }
            })?;
        Ok(rx)
    }

    /// Queue model work without waiting for it to run
    pub fn submit(&self, command: PanelCommand) -> PanelResult<()> {
        self.enqueue(command).map(|_| ())
    }

    /// Queue model work and wait for its outcome
    pub async fn request(&self, command: PanelCommand) -> PanelResult<PanelReply> {
        let rx = self.enqueue(command)?;
        rx.await.map_err(|_| {
            PanelError::PanelUnavailable("panel task dropped the request".to_string())
        })?
    }
}
