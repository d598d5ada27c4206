//! Window labels built from program, path and agent status.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::process::{is_agent, is_dir_program, is_shell};
use crate::tmux::AgentStatus;

const ELLIPSIS: &str = "...";

/// Replace the home directory prefix with `~`
pub fn format_path(path: &str, home: Option<&str>) -> String {
    match home {
        Some(home) if !home.is_empty() && home != "/" => match path.strip_prefix(home) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => format!("~{rest}"),
            _ => path.to_string(),
        },
        _ => path.to_string(),
    }
}

/// Abbreviate intermediate directories to their first character:
/// `~/src/personal/hledger` becomes `~/s/p/hledger`, `~/.config/x` becomes `~/.c/x`.
pub fn shorten_path(path: &str) -> String {
    let (prefix, rest) = if let Some(rest) = path.strip_prefix("~/") {
        ("~/", rest)
    } else if let Some(rest) = path.strip_prefix('/') {
        ("/", rest)
    } else {
        ("", path)
    };

    let parts: Vec<&str> = rest.split('/').filter(|p| !p.is_empty()).collect();
    let Some((last, dirs)) = parts.split_last() else {
        return path.to_string();
    };
    if dirs.is_empty() {
        return path.to_string();
    }

    let mut short: Vec<String> = dirs
        .iter()
        .map(|dir| {
            let mut chars = dir.chars();
            match (chars.next(), chars.next()) {
                (Some('.'), Some(second)) => format!(".{second}"),
                (Some(first), _) => first.to_string(),
                (None, _) => String::new(),
            }
        })
        .collect();
    short.push((*last).to_string());
    format!("{prefix}{}", short.join("/"))
}

/// Extra detail about what the active pane shows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaneContext {
    /// Git branch; never `main` or `master`
    pub branch: Option<String>,
    /// Session name from the pi footer
    pub session_name: Option<String>,
    /// File open in an editor
    pub filename: Option<String>,
}

/// Read branch and session name from pi's footer.
///
/// The footer is a `~/path (branch) • session` line directly above the
/// `↑...` token statistics line.
pub fn parse_pi_footer(content: &str) -> PaneContext {
    let mut ctx = PaneContext::default();
    let lines: Vec<&str> = content.lines().map(str::trim).collect();
    for (i, line) in lines.iter().enumerate() {
        let next = lines.get(i + 1).copied().unwrap_or_default();
        if !(RE_PARENS.is_match(line) && next.starts_with('↑')) {
            continue;
        }
        if let Some(caps) = RE_BRANCH.captures(line) {
            let branch = &caps[1];
            if branch != "main" && branch != "master" {
                ctx.branch = Some(branch.to_string());
            }
        }
        if let Some(caps) = RE_SESSION.captures(line) {
            ctx.session_name = Some(caps[1].trim().to_string());
        }
        break;
    }
    ctx
}

static RE_PARENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*\)").unwrap());
static RE_BRANCH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^)]+)\)").unwrap());
static RE_SESSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"•\s+(.+)$").unwrap());

/// Nerd font icons shown in place of some program names
const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("pi", "π"),
    ("nvim", "\u{e6ae}"),
    ("vim", "\u{e62b}"),
    ("vi", "\u{e62b}"),
];

fn display_name(program: &str) -> Option<&'static str> {
    DISPLAY_NAMES
        .iter()
        .find(|(name, _)| *name == program)
        .map(|(_, icon)| *icon)
}

/// Session name, then file name, then `path@branch`, then path
fn context_detail(path: &str, context: Option<&PaneContext>) -> String {
    let Some(ctx) = context else {
        return path.to_string();
    };
    if let Some(session) = &ctx.session_name {
        return session.clone();
    }
    if let Some(filename) = &ctx.filename {
        return filename.clone();
    }
    match &ctx.branch {
        Some(branch) => format!("{path}@{branch}"),
        None => path.to_string(),
    }
}

/// Label before any status decoration
pub fn build_base_name(
    program: &str,
    path: &str,
    shorten: bool,
    context: Option<&PaneContext>,
) -> String {
    let display_path = if shorten {
        shorten_path(path)
    } else {
        path.to_string()
    };

    if program.is_empty() {
        return display_path;
    }
    if is_shell(program) {
        return if path.is_empty() {
            program.to_string()
        } else {
            display_path
        };
    }
    if is_dir_program(program) {
        let (name, sep) = match display_name(program) {
            Some(icon) => (icon, " "),
            None => (program, ": "),
        };
        let detail = context_detail(&display_path, context);
        return if detail.is_empty() {
            name.to_string()
        } else {
            format!("{name}{sep}{detail}")
        };
    }
    program.to_string()
}

/// Final window label.
///
/// Windows with agents get a colored status glyph in front; when the active
/// pane is the agent itself its working directory replaces the base label.
pub fn window_label(
    base: &str,
    program: &str,
    path: &str,
    status: Option<AgentStatus>,
    shorten: bool,
    context: Option<&PaneContext>,
) -> String {
    let Some(status) = status else {
        return base.to_string();
    };

    let body = if is_agent(program) {
        let display_path = if shorten {
            shorten_path(path)
        } else {
            path.to_string()
        };
        match context_detail(&display_path, context) {
            detail if !detail.is_empty() => detail,
            _ if !base.is_empty() => base.to_string(),
            _ => program.to_string(),
        }
    } else {
        base.to_string()
    };
    format!("{} {}", status.colorize(), body)
}

/// Iterate a label as (is_style_code, piece) where style codes are `#[...]`
fn segments(name: &str) -> Vec<(bool, &str)> {
    let mut out = Vec::new();
    let mut rest = name;
    while !rest.is_empty() {
        match rest.find("#[") {
            Some(0) => match rest.find(']') {
                Some(end) => {
                    out.push((true, &rest[..=end]));
                    rest = &rest[end + 1..];
                }
                None => {
                    out.push((false, rest));
                    rest = "";
                }
            },
            Some(start) => {
                out.push((false, &rest[..start]));
                rest = &rest[start..];
            }
            None => {
                out.push((false, rest));
                rest = "";
            }
        }
    }
    out
}

/// Characters a label occupies on screen, ignoring `#[...]` style codes
pub fn visible_len(name: &str) -> usize {
    segments(name)
        .into_iter()
        .filter(|(style, _)| !style)
        .map(|(_, text)| text.chars().count())
        .sum()
}

/// Cut a label to `max_len` visible characters, the last three being `...`.
///
/// Style codes are kept; a code sitting right at the cut is kept too so a
/// trailing `#[default]` still resets the colour.
pub fn trim_name(name: &str, max_len: usize) -> String {
    if max_len == 0 || visible_len(name) <= max_len {
        return name.to_string();
    }

    let budget = if max_len <= ELLIPSIS.len() {
        max_len
    } else {
        max_len - ELLIPSIS.len()
    };

    let mut out = String::new();
    let mut used = 0;
    for (style, text) in segments(name) {
        if style {
            out.push_str(text);
            continue;
        }
        if used >= budget {
            break;
        }
        let take: String = text.chars().take(budget - used).collect();
        used += take.chars().count();
        out.push_str(&take);
        if used >= budget && take.chars().count() < text.chars().count() {
            break;
        }
    }

    if max_len > ELLIPSIS.len() {
        out.push_str(ELLIPSIS);
    }
    out
}

/// Keep the tail of a long path: `...` plus the last `max_len - 3` characters
pub fn truncate_path_left(path: &str, max_len: usize) -> String {
    let count = path.chars().count();
    if count <= max_len || max_len <= ELLIPSIS.len() {
        return path.to_string();
    }
    let keep = max_len - ELLIPSIS.len();
    let tail: String = path.chars().skip(count - keep).collect();
    format!("{ELLIPSIS}{tail}")
}
