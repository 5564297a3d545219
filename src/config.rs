use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Model
    pub model_backend: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub request_timeout_secs: u64,

    // Sampling bounds reported to the panel
    pub default_temperature: f32,
    pub default_top_k: u32,
    pub max_top_k: u32,

    // Panel
    pub socket_path: String,
    pub export_dir: String,

    // Data
    pub highlights_path: String,

    // Meta
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_backend: "ollama".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "gemma3".to_string(),
            request_timeout_secs: 120,
            default_temperature: 1.0,
            default_top_k: 3,
            max_top_k: 8,
            socket_path: default_socket_path().to_string_lossy().to_string(),
            export_dir: dirs::download_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .to_string_lossy()
                .to_string(),
            highlights_path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("lenspanel/storage.json")
                .to_string_lossy()
                .to_string(),
            log_level: "INFO".to_string(),
        }
    }
}

impl Config {
    /// Load config from file, or fall back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load config from an explicit path
    pub fn load_from(config_path: &std::path::Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                // Graceful degradation: log warning and use defaults
                tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                // Backup corrupt file for debugging
                let backup_path = config_path.with_extension("json.corrupt");
                let _ = std::fs::rename(config_path, &backup_path);
                Ok(Self::default())
            }
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        PathBuf::from(&self.socket_path)
    }

    pub fn highlights_path(&self) -> PathBuf {
        PathBuf::from(&self.highlights_path)
    }

    pub fn export_dir(&self) -> PathBuf {
        PathBuf::from(&self.export_dir)
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lenspanel")
        .join("config.json")
}

/// Per-user socket path, e.g. `/tmp/lenspanel-alice.sock`
pub fn default_socket_path() -> PathBuf {
    let user = std::env::var("USER").unwrap_or_else(|_| "lenspanel".to_string());
    PathBuf::from(format!("/tmp/lenspanel-{}.sock", user))
}
