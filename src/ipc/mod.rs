//! IPC (Inter-Process Communication) Module
//!
//! Unix socket channel between the selection router and the panel daemon.
//! Protocol: one JSON request per connection, newline-delimited, answered
//! by one JSON response.

pub mod client;
pub mod messages;
pub mod server;

pub use client::{IpcClient, IpcPanelChannel};
pub use messages::*;
pub use server::IpcServer;

/// Largest accepted request line. Selections can be long articles.
pub const MAX_REQUEST_BYTES: u64 = 256 * 1024;
