//! Configuration management for Guild
//!
//! Workspace-level settings live in `.guild/config.toml`. Every field has a
//! default, so a partial file (or no file at all) is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{GuildError, Result};

/// Directory, relative to the workspace root, holding Guild state
pub const GUILD_DIR: &str = ".guild";

/// Workspace-level Guild configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildConfig {
    /// Message bus limits
    #[serde(default)]
    pub bus: BusConfig,

    /// Run control
    #[serde(default)]
    pub run: RunConfig,

    /// Where deliverables and decision records are kept
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Message bus limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Maximum queued messages per participant mailbox
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Number of delivered messages kept for inspection
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

/// Run control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Abort the run after this many seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Return from the orchestrator loop once a terminal phase is reached
    #[serde(default = "default_stop_on_terminal")]
    pub stop_on_terminal: bool,
}

/// Storage locations, relative to the workspace root unless absolute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    #[serde(default = "default_decisions_dir")]
    pub decisions_dir: PathBuf,
}

/// Log output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (overridden by `RUST_LOG`)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value providers
fn default_mailbox_capacity() -> usize {
    1000
}

fn default_history_capacity() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    1800
}

fn default_stop_on_terminal() -> bool {
    true
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_decisions_dir() -> PathBuf {
    PathBuf::from("artifacts/adrs")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl GuildConfig {
    /// Load configuration from `.guild/config.toml` or use defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join(GUILD_DIR).join("config.toml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| GuildError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Write default configuration to `.guild/config.toml`
    pub fn write_default(root: &Path) -> Result<PathBuf> {
        let config_dir = root.join(GUILD_DIR);
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| GuildError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }

    /// Resolve the artifacts directory against a workspace root
    pub fn artifacts_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.storage.artifacts_dir)
    }

    /// Resolve the decision records directory against a workspace root
    pub fn decisions_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.storage.decisions_dir)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            history_capacity: default_history_capacity(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            stop_on_terminal: default_stop_on_terminal(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: default_artifacts_dir(),
            decisions_dir: default_decisions_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
