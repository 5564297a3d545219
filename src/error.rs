//! LensPanel Error Types
//!
//! Centralized error handling for the panel, router and stores.

use thiserror::Error;

/// Central error type for LensPanel
#[derive(Error, Debug)]
pub enum PanelError {
    /// No usable text was supplied for an action
    #[error("No text selected.")]
    EmptySelection,

    /// Highlight save or export was given nothing to work with
    #[error("{0}")]
    EmptyInput(String),

    #[error("Language model error: {0}")]
    Model(String),

    #[error("Model backend unavailable: {0}")]
    Unavailable(String),

    #[error("Could not reach the panel: {0}")]
    PanelUnavailable(String),

    /// The panel already has a request in flight and its queue slot is taken
    #[error("Panel is busy with another request")]
    Busy,

    /// A panel reset dropped the request while it was running
    #[error("Request cancelled by a panel reset")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Result type alias for LensPanel operations
pub type PanelResult<T> = Result<T, PanelError>;

/// Helper to convert Mutex poison errors
impl<T> From<std::sync::PoisonError<T>> for PanelError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        PanelError::Storage(err.to_string())
    }
}
