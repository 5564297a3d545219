//! IPC Server
//!
//! Unix socket server on the panel side. Each connection carries one
//! request that is handed to the panel task.

use super::{IpcRequest, IpcResponse, MAX_REQUEST_BYTES};
use crate::error::{PanelError, PanelResult};
use crate::panel::{PanelCommand, PanelHandle, PanelReply};
use crate::prompt::Sampling;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// IPC Server for the panel daemon
#[derive(Debug)]
pub struct IpcServer {
    path: PathBuf,
    task: Option<JoinHandle<()>>,
}

impl IpcServer {
    /// Create new IPC server bound (later) to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            task: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bind the socket and start accepting connections for `panel`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, panel: PanelHandle) -> PanelResult<()> {
        if self.path.exists() {
            if std::os::unix::net::UnixStream::connect(&self.path).is_ok() {
                return Err(PanelError::Ipc(format!(
                    "another panel is already listening on {}",
                    self.path.display()
                )));
            }
            // Clean up stale socket
            let _ = fs::remove_file(&self.path);
        }

        let listener = UnixListener::bind(&self.path)?;

        // Set strict permissions (user only: RW-------)
        if let Ok(metadata) = fs::metadata(&self.path) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o600);
            if let Err(e) = fs::set_permissions(&self.path, perms) {
                warn!("⚠️ Failed to set strict IPC socket permissions: {}", e);
            } else {
                debug!("🔒 IPC socket permissions set to 0600");
            }
        }

        info!("🔌 IPC server listening on {:?}", self.path);

        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        let panel = panel.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_client(stream, panel).await {
                                warn!("IPC client error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        warn!("IPC accept error: {}", e);
                    }
                }
            }
        });

        self.task = Some(handle);
        Ok(())
    }

    /// Stop the server and remove the socket file
    pub fn stop(&mut self) {
        if let Some(handle) = self.task.take() {
            handle.abort();
            let _ = fs::remove_file(&self.path);
            info!("🔌 IPC server stopped");
        }
    }

    /// Check if server is running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Handle a single client connection
async fn handle_client(stream: UnixStream, panel: PanelHandle) -> PanelResult<()> {
    let (read_half, mut write_half) = stream.into_split();

    // Size limit per request
    let mut reader = BufReader::new(read_half.take(MAX_REQUEST_BYTES));
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    if line.trim().is_empty() {
        return Ok(());
    }

    let response = match serde_json::from_str::<IpcRequest>(line.trim()) {
        Ok(request) => {
            debug!("📨 IPC request: {:?}", request);
            dispatch(request, &panel).await
        }
        Err(e) => {
            warn!("⚠️ Malformed IPC request: {}", e);
            IpcResponse::Ack {
                seq_id: 0,
                success: false,
                message: Some(format!("malformed request: {}", e)),
            }
        }
    };

    let response_json = serde_json::to_string(&response)? + "\n";
    write_half.write_all(response_json.as_bytes()).await?;
    Ok(())
}

async fn dispatch(request: IpcRequest, panel: &PanelHandle) -> IpcResponse {
    let seq_id = request.seq_id();

    match request {
        // Forwarded actions are queued and acknowledged without waiting
        IpcRequest::Forward { message, .. } => {
            info!("📡 IPC forward: {}", message.action);
            match panel.submit(PanelCommand::Message(message)) {
                Ok(()) => IpcResponse::Ack {
                    seq_id,
                    success: true,
                    message: Some("queued".to_string()),
                },
                Err(e) => failure(seq_id, e),
            }
        }
        IpcRequest::Prompt { text, .. } => match panel.request(PanelCommand::FreePrompt(text)).await {
            Ok(PanelReply::Status(status)) => IpcResponse::StatusResponse { seq_id, status },
            Ok(PanelReply::Ignored) => IpcResponse::Ack {
                seq_id,
                success: false,
                message: Some("ignored".to_string()),
            },
            Err(e) => failure(seq_id, e),
        },
        // Controls are answered right away, even while a prompt runs
        IpcRequest::Reset { .. } => IpcResponse::StatusResponse {
            seq_id,
            status: panel.reset(),
        },
        IpcRequest::SetSampling {
            temperature, top_k, ..
        } => IpcResponse::StatusResponse {
            seq_id,
            status: panel.set_sampling(Sampling { temperature, top_k }),
        },
        IpcRequest::StatusRequest { .. } => IpcResponse::StatusResponse {
            seq_id,
            status: panel.status(),
        },
        IpcRequest::ExportResult { dir, .. } => match panel.export_result(dir.map(PathBuf::from)) {
            Ok(path) => IpcResponse::Ack {
                seq_id,
                success: true,
                message: Some(path.display().to_string()),
            },
            Err(e) => failure(seq_id, e),
        },
    }
}

fn failure(seq_id: u64, err: PanelError) -> IpcResponse {
    match err {
        PanelError::Busy => IpcResponse::Busy { seq_id },
        other => IpcResponse::Ack {
            seq_id,
            success: false,
            message: Some(other.to_string()),
        },
    }
}
