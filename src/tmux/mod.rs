mod client;
mod heuristics;

pub use client::{TmuxClient, TmuxError};
pub use heuristics::{prioritize, AgentStatus, StateInferenceEngine};

/// Represents a tmux session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Session ID (e.g., "$0")
    pub id: String,
    /// Session name
    pub name: String,
}

/// A window inside a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    /// Window ID (e.g., "@3")
    pub id: String,
    pub index: u32,
    /// Current display name, possibly carrying `#[...]` style codes
    pub name: String,
    /// ID of the window's active pane
    pub active_pane: String,
}

/// A single pane snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pane {
    /// Pane ID (e.g., "%7")
    pub id: String,
    pub window_id: String,
    /// PID of the pane's direct child, usually a shell
    pub pid: Option<u32>,
    /// What tmux reports as `pane_current_command`
    pub command: String,
    pub cwd: String,
    pub active: bool,
}

/// Narrow view of the multiplexer used by the rest of the crate.
///
/// Reads fail soft: an unreachable server or a failed subprocess yields an
/// empty result. Writes report their error so the caller can log it and move
/// on to the next item.
#[allow(async_fn_in_trait)]
pub trait Multiplexer {
    async fn list_sessions(&self) -> Vec<Session>;
    async fn list_windows(&self, session_id: &str) -> Vec<Window>;
    async fn list_panes(&self, window_id: &str) -> Vec<Pane>;
    /// Last `lines` lines of rendered pane content, empty on failure
    async fn capture_pane(&self, pane_id: &str, lines: usize) -> String;
    async fn get_env(&self, key: &str) -> Option<String>;

    async fn rename_window(&self, window_id: &str, name: &str) -> Result<(), TmuxError>;
    async fn set_env(&self, key: &str, value: &str) -> Result<(), TmuxError>;
    /// `display-menu` with already-assembled arguments
    async fn display_menu(&self, args: &[String]) -> Result<(), TmuxError>;
    async fn display_message(&self, text: &str) -> Result<(), TmuxError>;
    async fn ring_bell(&self) -> Result<(), TmuxError>;
}
