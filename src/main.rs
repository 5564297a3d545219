//! LensPanel - selection assistant for a local language model
//!
//! `lenspanel panel` runs the prompt panel daemon; the other subcommands
//! act as the selection router, the panel controls and the highlight
//! notebook.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lenspanel::config::Config;
use lenspanel::error::PanelError;
use lenspanel::export::{export_text, HIGHLIGHTS_EXPORT_FILE};
use lenspanel::highlights::{HighlightNotebook, HighlightsView, JsonFileStore};
use lenspanel::ipc::client::LaunchCommand;
use lenspanel::ipc::{IpcClient, IpcPanelChannel, IpcServer};
use lenspanel::model;
use lenspanel::panel::{DisplayState, Panel, PanelHandle, PanelStatus};
use lenspanel::prompt::{Action, Sampling};
use lenspanel::router::{DispatchOutcome, SelectionEvent, SelectionRouter};
use std::io::Read;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run the prompt panel daemon
    Panel,

    /// Act on selected text (summarize, translate, proofread, quotes,
    /// save-highlight, extract-citation)
    Select {
        action: String,
        /// Selected text; `-` reads stdin
        #[arg(long)]
        text: String,
        /// Page URL
        #[arg(long)]
        url: Option<String>,
        /// Page title
        #[arg(long)]
        title: Option<String>,
        /// Do not start the panel if it is not running
        #[arg(long)]
        no_autostart: bool,
    },

    /// Send a free-form prompt to the panel
    Prompt {
        #[arg(required = true)]
        text: Vec<String>,
        /// Print the sanitized HTML instead of the markdown
        #[arg(long)]
        html: bool,
    },

    /// Clear the panel and drop the model session
    Reset,

    /// Change temperature / top-K (drops the model session)
    Sampling {
        #[arg(long)]
        temperature: f32,
        #[arg(long)]
        top_k: u32,
    },

    /// Show the panel state
    Status {
        #[arg(long)]
        html: bool,
    },

    /// Save the current result as prompt-result.txt
    ExportResult {
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Saved highlights
    Highlights {
        #[command(subcommand)]
        command: HighlightsCmd,
    },

    /// Show the model's sampling bounds
    Params,
}

#[derive(Subcommand, Debug)]
enum HighlightsCmd {
    /// Print all highlights as one editable block
    Show,
    /// Replace all highlights with the blocks of a text file (`-` for stdin)
    Save {
        #[arg(long)]
        file: PathBuf,
    },
    /// Write the highlights block to highlights.txt
    Export {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Setup logging
    let level = if args.verbose {
        "debug".to_string()
    } else {
        config.log_level.to_lowercase()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Cmd::Panel => run_panel(&config).await,
        Cmd::Select {
            action,
            text,
            url,
            title,
            no_autostart,
        } => {
            let launch = (!no_autostart).then(|| launch_command(args.config.as_ref()));
            run_select(&config, &action, &text, url, title, launch).await
        }
        Cmd::Prompt { text, html } => {
            let client = IpcClient::new(config.socket_path());
            let status = client.prompt(&text.join(" ")).await?;
            print_status(&status, html, true)
        }
        Cmd::Reset => {
            let client = IpcClient::new(config.socket_path());
            client.reset().await?;
            println!("Panel reset");
            Ok(())
        }
        Cmd::Sampling { temperature, top_k } => {
            let client = IpcClient::new(config.socket_path());
            let status = client
                .set_sampling(Sampling { temperature, top_k })
                .await?;
            println!(
                "temperature={} top_k={}",
                status.sampling.temperature, status.sampling.top_k
            );
            Ok(())
        }
        Cmd::Status { html } => {
            let client = IpcClient::new(config.socket_path());
            let status = client.status().await?;
            println!(
                "state={} temperature={} top_k={} session={}",
                status.display.label(),
                status.sampling.temperature,
                status.sampling.top_k,
                if status.has_session { "live" } else { "none" }
            );
            print_status(&status, html, false)
        }
        Cmd::ExportResult { dir } => {
            let client = IpcClient::new(config.socket_path());
            let path = client.export_result(dir).await?;
            println!("Exported {}", path.display());
            Ok(())
        }
        Cmd::Highlights { command } => run_highlights(&config, command),
        Cmd::Params => {
            let backend = model::create_backend(&config)?;
            let caps = backend.params().await?;
            println!(
                "defaultTemperature={} defaultTopK={} maxTopK={}",
                caps.default_temperature, caps.default_top_k, caps.max_top_k
            );
            Ok(())
        }
    }
}

async fn run_panel(config: &Config) -> Result<()> {
    info!("🔎 LensPanel v{} starting...", env!("CARGO_PKG_VERSION"));

    let backend = model::create_backend(config)?;
    let fallback = Sampling {
        temperature: config.default_temperature,
        top_k: config.default_top_k,
    };
    let mut panel = Panel::new(backend, fallback, config.export_dir());
    if let Err(e) = panel.init_defaults().await {
        warn!("Could not read model defaults, using config values: {}", e);
    }

    let (handle, task) = PanelHandle::spawn(panel);
    let mut server = IpcServer::new(config.socket_path());
    server.start(handle)?;

    info!("✅ Panel ready");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    info!("👋 Shutting down");
    server.stop();
    task.abort();
    Ok(())
}

async fn run_select(
    config: &Config,
    action: &str,
    text: &str,
    url: Option<String>,
    title: Option<String>,
    launch: Option<LaunchCommand>,
) -> Result<()> {
    let Some(action) = Action::from_id(action) else {
        let known: Vec<_> = Action::ALL.iter().map(Action::id).collect();
        bail!("unknown action '{}' (expected one of: {})", action, known.join(", "));
    };
    let text = read_arg_or_stdin(text)?;

    let mut channel = IpcPanelChannel::new(IpcClient::new(config.socket_path()));
    if let Some(launch) = launch {
        channel = channel.with_autostart(launch);
    }
    let notebook = HighlightNotebook::new(JsonFileStore::new(config.highlights_path()));
    let router = SelectionRouter::new(notebook, channel);

    let event = SelectionEvent {
        action,
        text,
        url,
        title,
    };
    match router.dispatch(event, chrono::Utc::now()).await? {
        DispatchOutcome::Ignored => eprintln!("{}", PanelError::EmptySelection),
        DispatchOutcome::HighlightSaved(h) => println!("Saved highlight ({})", h.date),
        DispatchOutcome::Forwarded(_) => println!("Sent to panel: {}", action.title()),
    }
    Ok(())
}

fn run_highlights(config: &Config, command: HighlightsCmd) -> Result<()> {
    let notebook = HighlightNotebook::new(JsonFileStore::new(config.highlights_path()));
    match command {
        HighlightsCmd::Show => {
            println!("{}", notebook.display()?.text());
        }
        HighlightsCmd::Save { file } => {
            let text = if file.as_os_str() == "-" {
                read_arg_or_stdin("-")?
            } else {
                std::fs::read_to_string(&file)
                    .with_context(|| format!("failed to read {}", file.display()))?
            };
            let saved = notebook.replace_from_text(&text, chrono::Utc::now())?;
            println!("All highlights saved! ({} entries)", saved.len());
        }
        HighlightsCmd::Export { dir } => {
            let text = match notebook.display()? {
                HighlightsView::Editable(text) => text,
                HighlightsView::Empty(_) => String::new(),
            };
            let dir = dir.unwrap_or_else(|| config.export_dir());
            let path = export_text(&dir, HIGHLIGHTS_EXPORT_FILE, &text, "No highlights to export.")?;
            println!("Exported {}", path.display());
        }
    }
    Ok(())
}

/// Print the displayed result. With `fail_on_error` an error display
/// becomes the command's error; otherwise it is printed like a result.
fn print_status(status: &PanelStatus, html: bool, fail_on_error: bool) -> Result<()> {
    match &status.display {
        DisplayState::ShowingResult { markdown, html: rendered } => {
            println!("{}", if html { rendered } else { markdown });
        }
        DisplayState::ShowingError { message } if fail_on_error => bail!("{}", message),
        DisplayState::ShowingError { message } => println!("error: {}", message),
        DisplayState::Idle | DisplayState::Loading => {}
    }
    Ok(())
}

fn read_arg_or_stdin(value: &str) -> Result<String> {
    if value != "-" {
        return Ok(value.to_string());
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read stdin")?;
    Ok(buf)
}

/// How `select` starts the panel daemon when it is not running
fn launch_command(config: Option<&PathBuf>) -> LaunchCommand {
    let program = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("lenspanel"));
    let mut args = Vec::new();
    if let Some(path) = config {
        args.push("--config".to_string());
        args.push(path.to_string_lossy().to_string());
    }
    args.push("panel".to_string());
    LaunchCommand { program, args }
}
