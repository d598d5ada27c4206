use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use super::{Multiplexer, Pane, Session, Window};

/// Tab-delimited formats for the `-F` flag of the list commands.
const SESSION_FORMAT: &str = "#{session_id}\t#{session_name}";
const WINDOW_FORMAT: &str = "#{window_id}\t#{window_index}\t#{pane_id}\t#{window_name}";
const PANE_FORMAT: &str =
    "#{pane_id}\t#{window_id}\t#{pane_pid}\t#{pane_active}\t#{pane_current_command}\t#{pane_current_path}";

#[derive(Debug, Error)]
pub enum TmuxError {
    #[error("tmux io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("`{command}` timed out after {after_ms}ms")]
    Timeout { command: String, after_ms: u64 },

    #[error("tmux command failed: {0}")]
    CommandFailed(String),

    #[error("no tmux server running")]
    NoServer,

    #[error("failed to parse line {line:?}: {detail}")]
    Parse { line: String, detail: String },
}

/// Client for interacting with tmux via CLI
pub struct TmuxClient {
    /// Path to tmux binary
    tmux_path: String,
    timeout: Duration,
}

impl TmuxClient {
    pub fn new(tmux_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            tmux_path: tmux_path.into(),
            timeout,
        }
    }

    /// Run a tmux subcommand and return its stdout
    async fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        let mut cmd = Command::new(&self.tmux_path);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| TmuxError::Timeout {
                command: format!("tmux {}", args.first().copied().unwrap_or_default()),
                after_ms: self.timeout.as_millis() as u64,
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("no server running") || stderr.contains("error connecting to") {
                return Err(TmuxError::NoServer);
            }
            return Err(TmuxError::CommandFailed(format!(
                "{}: exit code {}: {}",
                args.first().copied().unwrap_or_default(),
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run a read-only query, degrading to an empty string on any failure
    async fn query(&self, args: &[&str]) -> String {
        match self.run(args).await {
            Ok(out) => out,
            Err(e) => {
                debug!(error = %e, "tmux {} yielded nothing", args.join(" "));
                String::new()
            }
        }
    }
}

impl Default for TmuxClient {
    fn default() -> Self {
        Self::new("tmux", Duration::from_secs(3))
    }
}

impl Multiplexer for TmuxClient {
    async fn list_sessions(&self) -> Vec<Session> {
        let out = self.query(&["list-sessions", "-F", SESSION_FORMAT]).await;
        parse_lines(&out, parse_session_line)
    }

    async fn list_windows(&self, session_id: &str) -> Vec<Window> {
        let out = self
            .query(&["list-windows", "-t", session_id, "-F", WINDOW_FORMAT])
            .await;
        parse_lines(&out, parse_window_line)
    }

    async fn list_panes(&self, window_id: &str) -> Vec<Pane> {
        let out = self
            .query(&["list-panes", "-t", window_id, "-F", PANE_FORMAT])
            .await;
        parse_lines(&out, parse_pane_line)
    }

    async fn capture_pane(&self, pane_id: &str, lines: usize) -> String {
        let start = format!("-{lines}");
        self.query(&["capture-pane", "-p", "-t", pane_id, "-S", &start])
            .await
    }

    async fn get_env(&self, key: &str) -> Option<String> {
        let out = self.query(&["show-environment", "-g", key]).await;
        parse_env_line(&out, key)
    }

    async fn rename_window(&self, window_id: &str, name: &str) -> Result<(), TmuxError> {
        self.run(&["rename-window", "-t", window_id, name]).await?;
        Ok(())
    }

    async fn set_env(&self, key: &str, value: &str) -> Result<(), TmuxError> {
        self.run(&["set-environment", "-g", key, value]).await?;
        Ok(())
    }

    async fn display_menu(&self, args: &[String]) -> Result<(), TmuxError> {
        let mut full = vec!["display-menu"];
        full.extend(args.iter().map(String::as_str));
        self.run(&full).await?;
        Ok(())
    }

    async fn display_message(&self, text: &str) -> Result<(), TmuxError> {
        self.run(&["display-message", text]).await?;
        Ok(())
    }

    async fn ring_bell(&self) -> Result<(), TmuxError> {
        self.run(&["run-shell", "-b", "printf '\\a'"]).await?;
        Ok(())
    }
}

fn parse_lines<T>(output: &str, parse: fn(&str) -> Result<T, TmuxError>) -> Vec<T> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match parse(line) {
            Ok(item) => Some(item),
            Err(e) => {
                debug!(error = %e, "skipping tmux line");
                None
            }
        })
        .collect()
}

fn fields(line: &str, count: usize) -> Result<Vec<&str>, TmuxError> {
    // The last field keeps any embedded tabs
    let parts: Vec<&str> = line.splitn(count, '\t').collect();
    if parts.len() < count {
        return Err(TmuxError::Parse {
            line: line.to_string(),
            detail: format!("expected {count} tab-separated fields, got {}", parts.len()),
        });
    }
    Ok(parts)
}

pub fn parse_session_line(line: &str) -> Result<Session, TmuxError> {
    let parts = fields(line, 2)?;
    if parts[0].is_empty() {
        return Err(TmuxError::Parse {
            line: line.to_string(),
            detail: "empty session id".to_string(),
        });
    }
    Ok(Session {
        id: parts[0].to_string(),
        name: parts[1].to_string(),
    })
}

pub fn parse_window_line(line: &str) -> Result<Window, TmuxError> {
    let parts = fields(line, 4)?;
    let index = parts[1].parse().map_err(|_| TmuxError::Parse {
        line: line.to_string(),
        detail: format!("bad window index {:?}", parts[1]),
    })?;
    Ok(Window {
        id: parts[0].to_string(),
        index,
        active_pane: parts[2].to_string(),
        name: parts[3].to_string(),
    })
}

pub fn parse_pane_line(line: &str) -> Result<Pane, TmuxError> {
    let parts = fields(line, 6)?;
    Ok(Pane {
        id: parts[0].to_string(),
        window_id: parts[1].to_string(),
        pid: parts[2].parse().ok(),
        active: parts[3] == "1",
        command: parts[4].to_string(),
        cwd: parts[5].to_string(),
    })
}

/// `show-environment` prints `KEY=value`, or `-KEY` when the variable is unset
fn parse_env_line(output: &str, key: &str) -> Option<String> {
    output.lines().find_map(|line| {
        line.strip_prefix(key)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::to_string)
    })
}
