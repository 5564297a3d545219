//! LensPanel Library
//!
//! Core modules for the LensPanel selection assistant: the selection
//! router, the prompt panel and its model session, and the highlight
//! notebook.

pub mod citation;
pub mod config;
pub mod error;
pub mod export;
pub mod highlights;
pub mod ipc;
pub mod model;
pub mod panel;
pub mod prompt;
pub mod render;
pub mod router;
pub mod session;
