//! IPC Message Types
//!
//! JSON-serializable messages for router/CLI ↔ panel communication.

use crate::panel::{PanelMessage, PanelStatus};
use serde::{Deserialize, Serialize};

/// Request types sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcRequest {
    /// Selection action forwarded by the router (fire-and-forget)
    #[serde(rename = "forward")]
    Forward { seq_id: u64, message: PanelMessage },

    /// Free-form prompt; answered once the model replies
    #[serde(rename = "prompt")]
    Prompt { seq_id: u64, text: String },

    /// Clear the display and drop the model session
    #[serde(rename = "reset")]
    Reset { seq_id: u64 },

    /// Change sampling (drops the model session)
    #[serde(rename = "set_sampling")]
    SetSampling {
        seq_id: u64,
        temperature: f32,
        top_k: u32,
    },

    /// Request status of the panel
    #[serde(rename = "status_request")]
    StatusRequest { seq_id: u64 },

    /// Write the current result to `prompt-result.txt`
    #[serde(rename = "export_result")]
    ExportResult {
        seq_id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dir: Option<String>,
    },
}

impl IpcRequest {
    pub fn seq_id(&self) -> u64 {
        match self {
            IpcRequest::Forward { seq_id, .. }
            | IpcRequest::Prompt { seq_id, .. }
            | IpcRequest::Reset { seq_id }
            | IpcRequest::SetSampling { seq_id, .. }
            | IpcRequest::StatusRequest { seq_id }
            | IpcRequest::ExportResult { seq_id, .. } => *seq_id,
        }
    }
}

/// Response types sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcResponse {
    /// Status response
    #[serde(rename = "status_response")]
    StatusResponse { seq_id: u64, status: PanelStatus },

    /// The panel's request slot is taken
    #[serde(rename = "busy")]
    Busy { seq_id: u64 },

    /// Acknowledgment
    #[serde(rename = "ack")]
    Ack {
        seq_id: u64,
        success: bool,
        message: Option<String>,
    },
}

impl IpcResponse {
    pub fn seq_id(&self) -> u64 {
        match self {
            IpcResponse::StatusResponse { seq_id, .. }
            | IpcResponse::Busy { seq_id }
            | IpcResponse::Ack { seq_id, .. } => *seq_id,
        }
    }
}
