//! Working out which program really runs in a pane.
//!
//! tmux reports `pane_current_command`, which is often just the shell or an
//! interpreter such as `node`. For those panes the direct children of the
//! pane's process are looked up in a `ps` snapshot and the first interesting
//! one is normalized to a program name.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::tmux::Pane;

pub const SHELLS: &[&str] = &["bash", "zsh", "sh", "fish"];

/// Interpreters that commonly host an agent
pub const WRAPPERS: &[&str] = &["node", "python3", "python", "ruby", "bun"];

/// AI coding agents tracked for status
pub const AGENT_PROGRAMS: &[&str] = &[
    "claude",
    "codex",
    "gemini",
    "amp",
    "opencode",
    "pi",
    "aider",
    "goose",
    "mentat",
    "cline",
    "cursor",
    "zed",
    "warp",
    "continue",
    "sweep",
    "gpt-engineer",
    "gpt-pilot",
    "plandex",
    "devon",
    "roo",
];

/// Alternate binary name -> canonical agent
const AGENT_ALIASES: &[(&str, &str)] = &[("oc", "opencode"), ("codex-cli", "codex")];

/// Programs whose window label carries the working directory, besides agents
const DIR_PROGRAMS: &[&str] = &["nvim", "vim", "vi", "git", "jjui"];

const SCRIPT_EXTENSIONS: &[&str] = &[".mjs", ".cjs", ".js", ".ts", ".jsx", ".tsx"];

/// Agent or alias name preceded by start/space/slash and followed by a boundary
static AGENT_RE: Lazy<Regex> = Lazy::new(|| {
    let mut names: Vec<&str> = AGENT_PROGRAMS
        .iter()
        .copied()
        .chain(AGENT_ALIASES.iter().map(|(alias, _)| *alias))
        .collect();
    // Longest first so `opencode` wins over `oc`
    names.sort_by_key(|name| std::cmp::Reverse(name.len()));
    let alternation = names
        .iter()
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)(?:^|[ /])({alternation})(?:\s|$|[/.:-])"))
        .expect("agent pattern must compile")
});

static ENV_ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*=").unwrap());

pub fn is_shell(program: &str) -> bool {
    SHELLS.contains(&program)
}

pub fn is_agent(program: &str) -> bool {
    AGENT_PROGRAMS.contains(&program)
}

pub fn is_dir_program(program: &str) -> bool {
    DIR_PROGRAMS.contains(&program) || is_agent(program)
}

fn is_wrapper(program: &str) -> bool {
    WRAPPERS.contains(&program)
}

/// Canonical agent name for a bare binary name, if it is one
fn canonical_agent(name: &str) -> Option<&'static str> {
    let lowered = name.to_lowercase();
    AGENT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, agent)| *agent)
        .or_else(|| AGENT_PROGRAMS.iter().copied().find(|agent| *agent == lowered))
}

fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

fn is_quote(c: char) -> bool {
    c == '\'' || c == '"'
}

/// Agent named by one candidate piece of a token
fn candidate_agent(raw: &str) -> Option<&'static str> {
    let value = raw
        .trim_matches(is_quote)
        .trim_start_matches(|c: char| !c.is_ascii_alphanumeric() && c != '@')
        .trim_end_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-');
    if value.is_empty() {
        return None;
    }
    canonical_agent(value).or_else(|| {
        SCRIPT_EXTENSIONS
            .iter()
            .find_map(|ext| strip_suffix_ignore_case(value, ext))
            .and_then(canonical_agent)
    })
}

fn strip_suffix_ignore_case<'a>(value: &'a str, suffix: &str) -> Option<&'a str> {
    let cut = value.len().checked_sub(suffix.len())?;
    let tail = value.get(cut..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &value[..cut])
}

/// Agent named anywhere in a command line: token by token, then by boundary scan
fn detect_agent(cmdline: &str) -> Option<&'static str> {
    for (position, token) in cmdline.split_whitespace().enumerate() {
        if ENV_ASSIGNMENT.is_match(token) || (position > 0 && token.starts_with('-')) {
            continue;
        }
        let cleaned = token.trim_matches(is_quote);
        if cleaned.is_empty() {
            continue;
        }
        let found = candidate_agent(cleaned)
            .or_else(|| candidate_agent(basename(cleaned)))
            .or_else(|| cleaned.split('/').find_map(candidate_agent));
        if found.is_some() {
            return found;
        }
    }

    AGENT_RE
        .captures(cmdline)
        .and_then(|caps| caps.get(1))
        .and_then(|m| canonical_agent(m.as_str()))
}

/// Map a full command line to a program name.
///
/// Agent names anywhere in the line win (`node /opt/x/oc` is `opencode`);
/// otherwise the basename of the first token, minus a login-shell `-`.
pub fn normalize_program(cmdline: &str) -> String {
    if let Some(agent) = detect_agent(cmdline) {
        return agent.to_string();
    }

    let Some(first) = cmdline.split_whitespace().next() else {
        return String::new();
    };
    let name = basename(first);
    let name = name.strip_prefix('-').unwrap_or(name);
    canonical_agent(name)
        .map(str::to_string)
        .unwrap_or_else(|| name.to_string())
}

/// Editor flags that consume the following token
const EDITOR_FLAGS_WITH_ARGS: &[&str] = &[
    "-c",
    "--cmd",
    "-u",
    "-U",
    "-s",
    "-w",
    "-W",
    "-T",
    "-d",
    "--servername",
    "--server-name",
    "--listen",
    "--remote-send",
    "--remote-expr",
];

/// Basename of the first file argument in an editor command line
pub fn extract_filename(cmdline: &str) -> Option<String> {
    let mut skip_next = false;
    for token in cmdline.split_whitespace().skip(1) {
        if std::mem::take(&mut skip_next) {
            continue;
        }
        if token.starts_with('-') || token.starts_with('+') {
            skip_next = EDITOR_FLAGS_WITH_ARGS.contains(&token);
            continue;
        }
        let base = basename(token);
        if base.is_empty() || base == "." || base == ".." {
            continue;
        }
        return Some(base.to_string());
    }
    None
}

/// A direct child of some process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildProcess {
    pub pid: u32,
    pub command: String,
}

/// Source of parent/child process relationships
#[allow(async_fn_in_trait)]
pub trait ProcessTable {
    /// Direct children of `pid`; empty when the lookup fails or the process is gone
    async fn children_of(&self, pid: u32) -> Vec<ChildProcess>;
    /// Full command line of `pid` itself
    async fn command_of(&self, pid: u32) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PsEntry {
    pid: u32,
    ppid: u32,
    command: String,
}

/// `ps`-backed process table, snapshotted once per invocation
pub struct PsProcessTable {
    ps_path: String,
    timeout: Duration,
    snapshot: OnceCell<Vec<PsEntry>>,
}

impl PsProcessTable {
    pub fn new(ps_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ps_path: ps_path.into(),
            timeout,
            snapshot: OnceCell::new(),
        }
    }

    async fn load(&self) -> Result<Vec<PsEntry>> {
        let mut cmd = Command::new(&self.ps_path);
        cmd.args(["-A", "-o", "pid=,ppid=,command="])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .context("ps timed out")?
            .context("failed to execute ps")?;
        if !output.status.success() {
            bail!("ps exited with {}", output.status);
        }
        Ok(parse_ps_output(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn entries(&self) -> &[PsEntry] {
        self.snapshot
            .get_or_init(|| async {
                self.load().await.unwrap_or_else(|e| {
                    debug!(error = %e, "process table unavailable");
                    Vec::new()
                })
            })
            .await
    }
}

impl ProcessTable for PsProcessTable {
    async fn children_of(&self, pid: u32) -> Vec<ChildProcess> {
        self.entries()
            .await
            .iter()
            .filter(|entry| entry.ppid == pid)
            .map(|entry| ChildProcess {
                pid: entry.pid,
                command: entry.command.clone(),
            })
            .collect()
    }

    async fn command_of(&self, pid: u32) -> Option<String> {
        self.entries()
            .await
            .iter()
            .find(|entry| entry.pid == pid)
            .map(|entry| entry.command.clone())
    }
}

fn parse_ps_output(output: &str) -> Vec<PsEntry> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let pid = parts.next()?.parse().ok()?;
            let ppid = parts.next()?.parse().ok()?;
            let command = parts.collect::<Vec<_>>().join(" ");
            if command.is_empty() {
                return None;
            }
            Some(PsEntry { pid, ppid, command })
        })
        .collect()
}

/// Resolves the foreground program of a pane
pub struct ProgramResolver<P> {
    table: P,
    /// Our own command lines contain this; never report ourselves
    self_signature: String,
}

impl<P: ProcessTable> ProgramResolver<P> {
    pub fn new(table: P, self_signature: impl Into<String>) -> Self {
        Self {
            table,
            self_signature: self_signature.into(),
        }
    }

    pub async fn resolve(&self, pane: &Pane) -> String {
        if let Some(agent) = canonical_agent(&pane.command) {
            return agent.to_string();
        }

        if is_shell(&pane.command) || is_wrapper(&pane.command) {
            if let Some(pid) = pane.pid {
                if let Some(child) = self.interesting_child(pid).await {
                    let program = normalize_program(&child);
                    if !program.is_empty() {
                        return program;
                    }
                }
            }
        }

        pane.command.clone()
    }

    /// Command line of the pane's foreground program: its first interesting
    /// child, else the pane process itself
    pub async fn command_line(&self, pane: &Pane) -> Option<String> {
        let pid = pane.pid?;
        match self.interesting_child(pid).await {
            Some(command) => Some(command),
            None => self.table.command_of(pid).await,
        }
    }

    /// First child that is neither this tool nor a login shell re-exec
    async fn interesting_child(&self, pid: u32) -> Option<String> {
        self.table
            .children_of(pid)
            .await
            .into_iter()
            .filter(|child| {
                self.self_signature.is_empty() || !child.command.contains(&self.self_signature)
            })
            .find(|child| {
                child
                    .command
                    .split_whitespace()
                    .next()
                    .is_some_and(|argv0| !argv0.starts_with('-'))
            })
            .map(|child| {
                debug!(pane_pid = pid, child_pid = child.pid, command = %child.command, "pane child");
                child.command
            })
    }
}
