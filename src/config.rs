use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

/// Environment variable naming an alternative config file
pub const CONFIG_ENV: &str = "TMUX_AGENT_STATUS_CONFIG";

/// Runtime settings, all optional in the JSON file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tmux_bin: String,
    pub ps_bin: String,
    /// Longest window label, in visible characters
    pub max_name_len: usize,
    /// Lines of pane history fed to the classifier
    pub capture_lines: usize,
    /// Upper bound for each tmux or ps call
    pub command_timeout_ms: u64,
    /// Show paths under $HOME as `~/...`
    pub tilde_home: bool,
    /// Abbreviate intermediate directories in window labels
    pub shorten_paths: bool,
    /// Longest path shown in a menu entry
    pub menu_path_len: usize,
    pub menu_title: String,
    /// Global tmux environment variable holding the last attention count
    pub attention_env: String,
    /// Substring identifying our own processes in `ps` output
    pub self_signature: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tmux_bin: "tmux".to_string(),
            ps_bin: "ps".to_string(),
            max_name_len: 24,
            capture_lines: 20,
            command_timeout_ms: 3000,
            tilde_home: true,
            shorten_paths: true,
            menu_path_len: 20,
            menu_title: "Agent Management".to_string(),
            attention_env: "TMUX_AGENT_LAST_ATTENTION".to_string(),
            self_signature: "tmux-agent-status".to_string(),
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Explicit path, then `$TMUX_AGENT_STATUS_CONFIG`, then the user config dir
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|dir| dir.join("tmux-agent-status").join("config.json")))
    }

    /// Never fails: a missing file means defaults, a broken one is reported and ignored
    pub fn load(explicit: Option<&Path>) -> Self {
        let path = match explicit.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => return Self::default(),
        };
        if explicit.is_none() && !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }
        match Self::from_path(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{e:#}; using defaults");
                Self::default()
            }
        }
    }
}
