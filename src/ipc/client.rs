//! IPC Client
//!
//! Unix socket client used by the router and the CLI controls.

use super::{IpcRequest, IpcResponse};
use crate::error::{PanelError, PanelResult};
use crate::panel::{PanelMessage, PanelStatus};
use crate::prompt::Sampling;
use crate::router::PanelChannel;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, info, warn};

/// Timeout for requests the panel answers without the model
const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

static NEXT_SEQ_ID: AtomicU64 = AtomicU64::new(1);

fn next_seq_id() -> u64 {
    NEXT_SEQ_ID.fetch_add(1, Ordering::SeqCst)
}

/// IPC Client for the panel socket
#[derive(Debug, Clone)]
pub struct IpcClient {
    path: PathBuf,
}

impl IpcClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Check if the panel daemon is running
    pub fn is_panel_running(&self) -> bool {
        if !self.path.exists() {
            return false;
        }
        std::os::unix::net::UnixStream::connect(&self.path).is_ok()
    }

    async fn roundtrip(
        &self,
        request: IpcRequest,
        timeout: Option<Duration>,
    ) -> PanelResult<IpcResponse> {
        let exchange = async {
            let stream = UnixStream::connect(&self.path).await.map_err(|e| {
                PanelError::PanelUnavailable(format!("{}: {}", self.path.display(), e))
            })?;
            let (read_half, mut write_half) = stream.into_split();

            let request_json = serde_json::to_string(&request)? + "\n";
            write_half.write_all(request_json.as_bytes()).await?;

            let mut reader = BufReader::new(read_half);
            let mut line = String::new();
            reader.read_line(&mut line).await?;
            if line.trim().is_empty() {
                return Err(PanelError::Ipc("panel closed the connection".to_string()));
            }

            let response: IpcResponse = serde_json::from_str(line.trim())?;
            debug!("📨 IPC response: {:?}", response);
            Ok::<_, PanelError>(response)
        };

        let response = match timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| PanelError::Ipc("timed out waiting for the panel".to_string()))??,
            None => exchange.await?,
        };

        if response.seq_id() != request.seq_id() {
            warn!(
                "⚠️ IPC sequence ID mismatch: expected {}, got {}",
                request.seq_id(),
                response.seq_id()
            );
            return Err(PanelError::Ipc("sequence ID mismatch".to_string()));
        }

        match response {
            IpcResponse::Busy { .. } => Err(PanelError::Busy),
            IpcResponse::Ack {
                success: false,
                message,
                ..
            } => Err(PanelError::Ipc(
                message.unwrap_or_else(|| "request failed".to_string()),
            )),
            other => Ok(other),
        }
    }

    async fn expect_status(
        &self,
        request: IpcRequest,
        timeout: Option<Duration>,
    ) -> PanelResult<PanelStatus> {
        match self.roundtrip(request, timeout).await? {
            IpcResponse::StatusResponse { status, .. } => Ok(status),
            other => Err(PanelError::Ipc(format!(
                "unexpected IPC response: {:?}",
                other
            ))),
        }
    }

    /// Forward a selection action. Returns once the panel has queued it.
    pub async fn forward(&self, message: PanelMessage) -> PanelResult<()> {
        let request = IpcRequest::Forward {
            seq_id: next_seq_id(),
            message,
        };
        self.roundtrip(request, Some(CONTROL_TIMEOUT)).await?;
        Ok(())
    }

    /// Run a free-form prompt and wait for the panel's final state
    pub async fn prompt(&self, text: &str) -> PanelResult<PanelStatus> {
        let request = IpcRequest::Prompt {
            seq_id: next_seq_id(),
            text: text.to_string(),
        };
        // No timeout: a prompt stays loading until the model answers
        self.expect_status(request, None).await
    }

    pub async fn reset(&self) -> PanelResult<PanelStatus> {
        let request = IpcRequest::Reset {
            seq_id: next_seq_id(),
        };
        self.expect_status(request, Some(CONTROL_TIMEOUT)).await
    }

    pub async fn set_sampling(&self, sampling: Sampling) -> PanelResult<PanelStatus> {
        let request = IpcRequest::SetSampling {
            seq_id: next_seq_id(),
            temperature: sampling.temperature,
            top_k: sampling.top_k,
        };
        self.expect_status(request, Some(CONTROL_TIMEOUT)).await
    }

    pub async fn status(&self) -> PanelResult<PanelStatus> {
        let request = IpcRequest::StatusRequest {
            seq_id: next_seq_id(),
        };
        self.expect_status(request, Some(CONTROL_TIMEOUT)).await
    }

    /// Export the current result; returns the written file path
    pub async fn export_result(&self, dir: Option<PathBuf>) -> PanelResult<PathBuf> {
        let request = IpcRequest::ExportResult {
            seq_id: next_seq_id(),
            dir: dir.map(|d| d.to_string_lossy().to_string()),
        };
        match self.roundtrip(request, Some(CONTROL_TIMEOUT)).await? {
            IpcResponse::Ack {
                message: Some(path),
                ..
            } => Ok(PathBuf::from(path)),
            other => Err(PanelError::Ipc(format!(
                "unexpected IPC response: {:?}",
                other
            ))),
        }
    }
}

/// Command used to start the panel daemon on demand
#[derive(Debug, Clone)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Router-side channel to the panel daemon over IPC
#[derive(Debug, Clone)]
pub struct IpcPanelChannel {
    client: IpcClient,
    launch: Option<LaunchCommand>,
    startup_timeout: Duration,
}

impl IpcPanelChannel {
    pub fn new(client: IpcClient) -> Self {
        Self {
            client,
            launch: None,
            startup_timeout: Duration::from_secs(5),
        }
    }

    /// Start the panel with `launch` when it is not running
    pub fn with_autostart(mut self, launch: LaunchCommand) -> Self {
        self.launch = Some(launch);
        self
    }

    async fn wait_for_socket(&self) -> bool {
        let start = Instant::now();
        while start.elapsed() < self.startup_timeout {
            if self.client.is_panel_running() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        false
    }
}

#[async_trait]
impl PanelChannel for IpcPanelChannel {
    async fn open(&self) -> PanelResult<()> {
        if self.client.is_panel_running() {
            return Ok(());
        }

        let Some(launch) = &self.launch else {
            return Err(PanelError::PanelUnavailable(
                "panel is not running (start it with `lenspanel panel`)".to_string(),
            ));
        };

        info!("🚀 Starting panel: {:?} {:?}", launch.program, launch.args);
        Command::new(&launch.program)
            .args(&launch.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PanelError::PanelUnavailable(format!("failed to start panel: {}", e)))?;

        if self.wait_for_socket().await {
            Ok(())
        } else {
            Err(PanelError::PanelUnavailable(
                "timed out waiting for the panel to start".to_string(),
            ))
        }
    }

    async fn send(&self, message: PanelMessage) -> PanelResult<()> {
        self.client.forward(message).await
    }
}
