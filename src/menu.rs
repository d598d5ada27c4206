//! Agent picker built on tmux `display-menu`.

use crate::aggregate::{AgentInfo, GlobalStatus};
use crate::naming::{format_path, truncate_path_left};
use crate::tmux::AgentStatus;

/// Number keys are handed out to the first nine agents
const MAX_KEYED_ENTRIES: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    Item {
        label: String,
        key: String,
        command: String,
    },
    Separator,
}

impl MenuEntry {
    fn item(label: impl Into<String>, key: impl Into<String>, command: impl Into<String>) -> Self {
        MenuEntry::Item {
            label: label.into(),
            key: key.into(),
            command: command.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Menu {
    pub title: String,
    pub entries: Vec<MenuEntry>,
}

/// Rendering knobs for [`build_menu`]
pub struct MenuOptions<'a> {
    pub title: &'a str,
    pub path_len: usize,
    pub home: Option<&'a str>,
    /// Shell command that reopens the menu
    pub refresh_command: &'a str,
    /// Use tmux colour codes around status glyphs
    pub colorize: bool,
}

/// Most urgent first, then session name, then window index
pub fn sort_agents(agents: &mut [AgentInfo]) {
    agents.sort_by(|a, b| {
        a.status
            .priority()
            .cmp(&b.status.priority())
            .then_with(|| a.session.cmp(&b.session))
            .then_with(|| a.window_index.cmp(&b.window_index))
    });
}

/// `None` when there is nothing to pick from
pub fn build_menu(agents: &[AgentInfo], opts: &MenuOptions<'_>) -> Option<Menu> {
    let global = GlobalStatus::from_agents(agents);
    let aggregate = global.status?;

    let glyph = |status: AgentStatus| {
        if opts.colorize {
            status.colorize()
        } else {
            status.glyph().to_string()
        }
    };

    let mut sorted = agents.to_vec();
    sort_agents(&mut sorted);

    let mut header = format!("{} {} agents", glyph(aggregate), global.count);
    if !global.attention.is_empty() {
        header.push_str(&format!(" ({} need attention)", global.attention.len()));
    }

    // A leading '-' shows the header dimmed and unselectable
    let mut entries = vec![
        MenuEntry::item(format!("-{header}"), "", ""),
        MenuEntry::Separator,
    ];

    for (i, agent) in sorted.iter().enumerate() {
        let mut label = format!(
            "{} {} {}:{}",
            glyph(agent.status),
            agent.program,
            agent.session,
            agent.window_index
        );
        let path = truncate_path_left(&format_path(&agent.path, opts.home), opts.path_len);
        if !path.is_empty() {
            label.push(' ');
            label.push_str(&path);
        }

        let key = if i < MAX_KEYED_ENTRIES {
            (i + 1).to_string()
        } else {
            String::new()
        };
        entries.push(MenuEntry::item(label, key, switch_command(agent)));

        if agent.status == AgentStatus::Busy && !agent.pane_id.is_empty() {
            entries.push(MenuEntry::item(
                "  ⏹ Interrupt",
                "",
                format!("send-keys -t {} Escape", tmux_word(&agent.pane_id)),
            ));
        }
    }

    entries.push(MenuEntry::Separator);
    entries.push(MenuEntry::item(
        "Refresh",
        "r",
        format!("run-shell -b {}", tmux_word(opts.refresh_command)),
    ));
    entries.push(MenuEntry::item("Close", "q", ""));

    Some(Menu {
        title: opts.title.to_string(),
        entries,
    })
}

fn switch_command(agent: &AgentInfo) -> String {
    let target = tmux_word(&format!("{}:{}", agent.session, agent.window_index));
    if agent.pane_id.is_empty() {
        format!("switch-client -t {target}")
    } else {
        format!(
            "switch-client -t {target} ; select-pane -t {}",
            tmux_word(&agent.pane_id)
        )
    }
}

impl Menu {
    /// Arguments for `tmux display-menu`
    pub fn to_args(&self) -> Vec<String> {
        // `--` keeps the dimmed header, which starts with '-', from parsing as flags
        let mut args: Vec<String> = ["-T", self.title.as_str(), "-x", "C", "-y", "C", "--"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        for entry in &self.entries {
            match entry {
                MenuEntry::Item {
                    label,
                    key,
                    command,
                } => args.extend([label.clone(), key.clone(), command.clone()]),
                MenuEntry::Separator => args.push(String::new()),
            }
        }
        args
    }

    /// A single `display-menu ...` command line, for key bindings
    pub fn to_command(&self) -> String {
        let mut out = String::from("display-menu");
        for arg in self.to_args() {
            out.push(' ');
            if arg.starts_with('-') && arg.len() == 2 {
                out.push_str(&arg);
            } else {
                out.push_str(&double_quote(&arg));
            }
        }
        out
    }
}

/// Quote for tmux's command parser only when needed
fn tmux_word(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "_.:%@/+-=".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

fn double_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if matches!(c, '"' | '\\' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
