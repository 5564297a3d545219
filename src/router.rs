//! Selection Router
//!
//! Classifies a user action over selected page text and dispatches it:
//! highlights go straight to the store, everything else is forwarded to
//! the panel.

use crate::error::{PanelError, PanelResult};
use crate::highlights::{Highlight, HighlightNotebook, RecordStore};
use crate::panel::PanelMessage;
use crate::prompt::Action;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

/// Where an action is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Append to the highlight store, no panel involvement
    StoreHighlight,
    /// Open the panel and forward the selection
    ForwardToPanel { with_url: bool },
}

/// Single dispatch table: one route per action
const DISPATCH_TABLE: [(Action, Route); 6] = [
    (Action::Summarize, Route::ForwardToPanel { with_url: false }),
    (Action::Translate, Route::ForwardToPanel { with_url: false }),
    (Action::Proofread, Route::ForwardToPanel { with_url: false }),
    (Action::Quotes, Route::ForwardToPanel { with_url: false }),
    (Action::SaveHighlight, Route::StoreHighlight),
    (Action::ExtractCitation, Route::ForwardToPanel { with_url: true }),
];

pub fn route_for(action: Action) -> Route {
    DISPATCH_TABLE
        .iter()
        .find(|(a, _)| *a == action)
        .map(|(_, route)| *route)
        .unwrap_or(Route::ForwardToPanel { with_url: false })
}

/// Connection from the router to the panel
#[async_trait]
pub trait PanelChannel: Send + Sync {
    /// Make sure the panel is up and able to receive messages
    async fn open(&self) -> PanelResult<()>;

    /// Deliver one message to the panel
    async fn send(&self, message: PanelMessage) -> PanelResult<()>;
}

/// A user action over a text selection on some page
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionEvent {
    pub action: Action,
    pub text: String,
    pub url: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Blank selection, nothing done
    Ignored,
    HighlightSaved(Highlight),
    Forwarded(PanelMessage),
}

pub struct SelectionRouter<S: RecordStore, C: PanelChannel> {
    notebook: HighlightNotebook<S>,
    channel: C,
}

impl<S: RecordStore, C: PanelChannel> SelectionRouter<S, C> {
    pub fn new(notebook: HighlightNotebook<S>, channel: C) -> Self {
        Self { notebook, channel }
    }

    pub fn notebook(&self) -> &HighlightNotebook<S> {
        &self.notebook
    }

    /// Dispatch one selection event.
    ///
    /// Blank selections are ignored silently. Failing to reach the panel is
    /// logged and returned as `PanelUnavailable`; the request is dropped.
    pub async fn dispatch(
        &self,
        event: SelectionEvent,
        now: DateTime<Utc>,
    ) -> PanelResult<DispatchOutcome> {
        let text = event.text.trim();
        if text.is_empty() {
            debug!("Ignoring {} on blank selection", event.action);
            return Ok(DispatchOutcome::Ignored);
        }

        match route_for(event.action) {
            Route::StoreHighlight => {
                let Some(highlight) = Highlight::from_selection(
                    text,
                    event.url.as_deref(),
                    event.title.as_deref(),
                    now,
                ) else {
                    return Ok(DispatchOutcome::Ignored);
                };
                self.notebook.append(highlight.clone())?;
                info!("✅ Highlight saved: {:?}", highlight);
                Ok(DispatchOutcome::HighlightSaved(highlight))
            }
            Route::ForwardToPanel { with_url } => {
                let url = if with_url { event.url.clone() } else { None };
                let message = PanelMessage::new(event.action, text, url);

                if let Err(e) = self.channel.open().await {
                    error!("❌ Failed to open side panel: {}", e);
                    return Err(match e {
                        PanelError::PanelUnavailable(_) => e,
                        other => PanelError::PanelUnavailable(other.to_string()),
                    });
                }

                self.channel.send(message.clone()).await?;
                info!("📤 Forwarded {} to panel", event.action);
                Ok(DispatchOutcome::Forwarded(message))
            }
        }
    }
}
