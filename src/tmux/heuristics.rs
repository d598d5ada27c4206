use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::trace;

/// Status of an AI agent pane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    /// Agent is ready for a new prompt
    Idle,
    /// Agent is actively processing (spinning, thinking, running tools)
    Busy,
    /// Agent is blocked on a permission or confirmation prompt
    Waiting,
    /// Agent crashed or hit an API failure
    Error,
    /// Nothing recognisable on screen
    Unknown,
}

impl AgentStatus {
    /// Aggregation rank, 0 is the most urgent:
    /// Error > Unknown > Waiting > Busy > Idle
    pub fn priority(self) -> u8 {
        match self {
            AgentStatus::Error => 0,
            AgentStatus::Unknown => 1,
            AgentStatus::Waiting => 2,
            AgentStatus::Busy => 3,
            AgentStatus::Idle => 4,
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            AgentStatus::Idle => "□",
            AgentStatus::Busy => "●",
            AgentStatus::Waiting => "■",
            AgentStatus::Error => "▲",
            AgentStatus::Unknown => "◇",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            AgentStatus::Idle => "blue",
            AgentStatus::Busy => "cyan",
            AgentStatus::Waiting => "yellow",
            AgentStatus::Error => "red",
            AgentStatus::Unknown => "magenta",
        }
    }

    /// Glyph wrapped in tmux style codes
    pub fn colorize(self) -> String {
        format!("#[fg={}]{}#[default]", self.color(), self.glyph())
    }

    /// Error, Waiting and Unknown want the user to look at the pane
    pub fn needs_attention(self) -> bool {
        matches!(
            self,
            AgentStatus::Error | AgentStatus::Waiting | AgentStatus::Unknown
        )
    }
}

/// Highest-priority status of the set; Idle for an empty set
pub fn prioritize(statuses: &[AgentStatus]) -> AgentStatus {
    statuses
        .iter()
        .copied()
        .min_by_key(|s| s.priority())
        .unwrap_or(AgentStatus::Idle)
}

// Crash signatures and API failures
const SHARED_ERROR: &[&str] = &[
    r"Traceback \(most recent call last\)",
    r"UnhandledPromiseRejection",
    r"FATAL ERROR",
    r"panic:",
    r"Error: .*(?:API|rate limit|connection|timeout)",
];

// Permission and confirmation prompts
const SHARED_WAITING: &[&str] = &[
    r"Allow (?:once|always)\?",
    r"Do you want to (?:run|execute|allow)",
    r"(?:Approve|Confirm|Accept)\?.*\[Y/n\]",
    r"Press enter to continue",
    r"Waiting for (?:input|approval|confirmation)",
    r"Permission required",
    r"(?:yes|no|skip)\s*›",
];

// Only rendered while a task is in flight
const SHARED_BUSY: &[&str] = &[
    r"[⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏]",
    r"Thinking\.{2,}",
    r"(?:Running|Executing|Processing)\.{2,}",
    r"Working on",
    r"Analyzing",
    r"Reading (?:file|files)",
    r"Writing (?:to|file)",
    r"Searching",
    r"Calling tool",
];

const PI_BUSY: &[&str] = &[r"Working\.\.\.", r"Steering:"];

// pi status bar: model line, token/cost line, subscription cost, LSP marker
const PI_IDLE: &[&str] = &[
    r"\(anthropic\)\s+\S+",
    r"\(openai[^)]*\)\s+\S+",
    r"\(google\)\s+\S+",
    r"↑[\d.]+k?\s+↓[\d.]+k?\s+R[\d.]+",
    r"\$\d+\.\d+\s+\(sub\)",
    r"\bLSP\b",
];

const CLAUDE_BUSY: &[&str] = &[r"⎿", r"Esc to cancel"];

const CLAUDE_IDLE: &[&str] = &[
    r"(?m)>\s*$",
    r"What would you like",
    r"How can I help",
    r"\d+% of \d+k",
];

const AMP_BUSY: &[&str] = &[r"≋", r"■■■", r"esc interrupt", r"Running tools"];

const AMP_IDLE: &[&str] = &[r"ctrl\+p commands", r"ctrl\+t variants"];

const OPENCODE_BUSY: &[&str] = &[r"Tool:"];

const OPENCODE_IDLE: &[&str] = &[r"OpenCode \d+\.\d+\.\d+"];

// Generic completion messages and prompt glyphs for untuned agents
const GENERIC_IDLE: &[&str] = &[
    r"(?m)Done\.\s*$",
    r"completed successfully",
    r"Session went idle",
    r"(?m)Finished\s*$",
    r"(?m)│\s*$",
    r"(?m)❯\s*$",
];

/// One compiled heuristic and the status it signals
pub struct Rule {
    pub family: AgentStatus,
    pub source: &'static str,
    pub pattern: Regex,
}

/// Compile busy and idle sources on top of the shared error and waiting rules,
/// ordered by family: Error, Waiting, Busy, Idle
fn compile(busy: &[&[&'static str]], idle: &[&[&'static str]]) -> Vec<Rule> {
    let families = [
        (AgentStatus::Error, vec![SHARED_ERROR]),
        (AgentStatus::Waiting, vec![SHARED_WAITING]),
        (AgentStatus::Busy, busy.to_vec()),
        (AgentStatus::Idle, idle.to_vec()),
    ];
    families
        .into_iter()
        .flat_map(|(family, groups)| {
            groups.into_iter().flatten().map(move |&source| Rule {
                family,
                source,
                pattern: RegexBuilder::new(source)
                    .case_insensitive(true)
                    .build()
                    .expect("status pattern must compile"),
            })
        })
        .collect()
}

/// Tuned rule sets for agents whose screens are well known
static AGENT_RULES: Lazy<Vec<(&'static str, Vec<Rule>)>> = Lazy::new(|| {
    vec![
        ("pi", compile(&[PI_BUSY, SHARED_BUSY], &[PI_IDLE])),
        ("claude", compile(&[CLAUDE_BUSY, SHARED_BUSY], &[CLAUDE_IDLE])),
        ("amp", compile(&[AMP_BUSY, SHARED_BUSY], &[AMP_IDLE])),
        ("opencode", compile(&[OPENCODE_BUSY, SHARED_BUSY], &[OPENCODE_IDLE])),
    ]
});

/// Everything at once, for agents without a tuned set
static DEFAULT_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    compile(
        &[SHARED_BUSY, PI_BUSY, CLAUDE_BUSY, AMP_BUSY, OPENCODE_BUSY],
        &[PI_IDLE, CLAUDE_IDLE, AMP_IDLE, OPENCODE_IDLE, GENERIC_IDLE],
    )
});

/// Rules used for `agent`, falling back to the default set
fn rules_for(agent: &str) -> &'static [Rule] {
    AGENT_RULES
        .iter()
        .find(|(name, _)| *name == agent)
        .map(|(_, rules)| rules.as_slice())
        .unwrap_or(DEFAULT_RULES.as_slice())
}

/// CSI, OSC (BEL or ST terminated) and DCS/SOS/PM/APC strings
static RE_ESCAPES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[PX^_][^\x1b]*\x1b\\")
        .unwrap()
});

/// C0 and C1 controls, keeping tab, newline and carriage return
static RE_CONTROL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0b\x0c\x0e-\x1f\x7f-\x9f]").unwrap());

/// Remove terminal escape sequences and stray control characters
pub fn strip_control(text: &str) -> Cow<'_, str> {
    match RE_ESCAPES.replace_all(text, "") {
        Cow::Borrowed(clean) => RE_CONTROL.replace_all(clean, ""),
        Cow::Owned(clean) => Cow::Owned(RE_CONTROL.replace_all(&clean, "").into_owned()),
    }
}

/// Engine for inferring agent status from pane content
pub struct StateInferenceEngine;

impl StateInferenceEngine {
    /// Classify captured pane content of `agent`; the first matching family wins
    pub fn classify(content: &str, agent: &str) -> AgentStatus {
        if content.trim().is_empty() {
            return AgentStatus::Unknown;
        }

        let clean = strip_control(content);
        match rules_for(agent).iter().find(|rule| rule.pattern.is_match(&clean)) {
            Some(rule) => {
                trace!(agent, family = ?rule.family, pattern = rule.source, "status rule matched");
                rule.family
            }
            None => AgentStatus::Unknown,
        }
    }

    /// Rules of one family for `agent`, in evaluation order
    #[cfg(test)]
    pub fn rules(agent: &str, family: AgentStatus) -> impl Iterator<Item = &'static Rule> {
        rules_for(agent)
            .iter()
            .filter(move |rule| rule.family == family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [AgentStatus; 5] = [
        AgentStatus::Error,
        AgentStatus::Unknown,
        AgentStatus::Waiting,
        AgentStatus::Busy,
        AgentStatus::Idle,
    ];

    fn classify(content: &str) -> AgentStatus {
        StateInferenceEngine::classify(content, "")
    }

    #[test]
    fn test_detect_error() {
        for content in [
            "Traceback (most recent call last):\n  File \"x.py\"",
            "Error: API rate limit exceeded",
            "FATAL ERROR: out of memory",
            "panic: runtime error: index out of range",
            "UnhandledPromiseRejectionWarning: boom",
        ] {
            assert_eq!(classify(content), AgentStatus::Error, "{content}");
        }
    }

    #[test]
    fn test_detect_waiting() {
        for content in [
            "Allow once?",
            "Do you want to run this command?",
            "Permission required\nyes › no › skip",
            "Press enter to continue",
            "Approve? [Y/n]",
        ] {
            assert_eq!(classify(content), AgentStatus::Waiting, "{content}");
        }
    }

    #[test]
    fn test_detect_busy() {
        for content in [
            "Thinking...",
            "⠦ Working...",
            "⎿  Read 120 lines",
            "Running tools",
            "Esc to cancel",
            "Processing..",
        ] {
            assert_eq!(classify(content), AgentStatus::Busy, "{content}");
        }
    }

    #[test]
    fn test_detect_idle() {
        for content in [
            "Previous output\n> ",
            "some text\n❯",
            "Session went idle",
            "All done. Done.\n",
            "╰────────────────│",
            "45% of 168k",
            "OpenCode 0.3.12",
        ] {
            assert_eq!(classify(content), AgentStatus::Idle, "{content}");
        }
    }

    #[test]
    fn pi_footer_is_idle() {
        let content = "done.\n\n\
            ~/obsidian-vault (main)\n\
            ↑34 ↓5.2k R928k W33k $0.799 (sub) 19.5%/200k (auto)\n\
            (anthropic) claude-opus-4-6 • medium\n\
            LSP";
        assert_eq!(classify(content), AgentStatus::Idle);
    }

    #[test]
    fn empty_and_whitespace_are_unknown() {
        assert_eq!(classify(""), AgentStatus::Unknown);
        assert_eq!(classify("   \n\t\n  "), AgentStatus::Unknown);
    }

    #[test]
    fn unmatched_text_is_unknown() {
        assert_eq!(
            classify("random output with no patterns"),
            AgentStatus::Unknown
        );
    }

    #[test]
    fn matching_ignores_case() {
        assert_eq!(classify("THINKING..."), AgentStatus::Busy);
        assert_eq!(classify("allow ALWAYS?"), AgentStatus::Waiting);
    }

    #[test]
    fn error_beats_everything_else() {
        let content = "⠋ Thinking...\nAllow once?\nTraceback (most recent call last):\n> ";
        assert_eq!(classify(content), AgentStatus::Error);
    }

    #[test]
    fn waiting_beats_idle_prompt() {
        assert_eq!(classify("Do you want to allow this?\n> "), AgentStatus::Waiting);
    }

    #[test]
    fn busy_beats_trailing_prompt() {
        assert_eq!(classify("⠙ Thinking...\n> "), AgentStatus::Busy);
    }

    #[test]
    fn escapes_do_not_hide_patterns() {
        let content = "\x1b[1;33mThink\x1b[0ming...\x1b]0;title\x07";
        assert_eq!(classify(content), AgentStatus::Busy);
    }

    #[test]
    fn classify_is_deterministic() {
        let content = "⎿ Tool: Bash\nAllow once?";
        let first = classify(content);
        for _ in 0..5 {
            assert_eq!(classify(content), first);
        }
    }

    #[test]
    fn every_family_has_rules_in_order() {
        for agent in ["", "pi", "claude", "amp", "opencode"] {
            let mut seen = Vec::new();
            for family in rules_for(agent).iter().map(|r| r.family) {
                if seen.last() != Some(&family) {
                    assert!(!seen.contains(&family), "{agent}: {family:?} rules are split");
                    seen.push(family);
                }
            }
            assert_eq!(
                seen,
                [
                    AgentStatus::Error,
                    AgentStatus::Waiting,
                    AgentStatus::Busy,
                    AgentStatus::Idle
                ],
                "{agent}"
            );
        }
    }

    #[test]
    fn tuned_agents_ignore_other_agents_markers() {
        let engine = StateInferenceEngine::classify;
        assert_eq!(engine("⎿ Tool: Bash", "claude"), AgentStatus::Busy);
        assert_eq!(engine("Tool: read", "claude"), AgentStatus::Unknown);
        assert_eq!(engine("≋ streaming", "claude"), AgentStatus::Unknown);
        assert_eq!(engine("≋ streaming", "amp"), AgentStatus::Busy);
        assert_eq!(engine("output\n> ", "pi"), AgentStatus::Unknown);
        assert_eq!(engine("output\n> ", "claude"), AgentStatus::Idle);
        assert_eq!(engine("OpenCode 0.3.12", "opencode"), AgentStatus::Idle);
        assert_eq!(engine("OpenCode 0.3.12", "amp"), AgentStatus::Unknown);
    }

    #[test]
    fn shared_rules_apply_to_every_agent() {
        for agent in ["pi", "claude", "amp", "opencode", "aider", ""] {
            let engine = StateInferenceEngine::classify;
            assert_eq!(engine("panic: boom", agent), AgentStatus::Error, "{agent}");
            assert_eq!(engine("Allow once?", agent), AgentStatus::Waiting, "{agent}");
            assert_eq!(engine("Thinking...", agent), AgentStatus::Busy, "{agent}");
        }
    }

    #[test]
    fn untuned_agents_use_the_default_set() {
        assert_eq!(StateInferenceEngine::classify("Done.\n", "aider"), AgentStatus::Idle);
        assert_eq!(StateInferenceEngine::classify("Done.\n", "claude"), AgentStatus::Unknown);
    }

    #[test]
    fn each_rule_fires_on_its_own_example() {
        let samples = [
            (AgentStatus::Error, "panic: oops"),
            (AgentStatus::Waiting, "Waiting for approval"),
            (AgentStatus::Busy, "Calling tool grep"),
            (AgentStatus::Idle, "How can I help you today"),
        ];
        for (family, sample) in samples {
            assert!(
                StateInferenceEngine::rules("", family).any(|r| r.pattern.is_match(sample)),
                "{family:?} should match {sample:?}"
            );
        }
    }

    #[test]
    fn strip_keeps_box_drawing_and_glyphs() {
        let text = "╭──────╮\n│ ❯ hi │\n╰──────╯\n□ ● ■ ▲ ◇ ⠋ ⎿ ≋";
        assert_eq!(strip_control(text), text);
    }

    #[test]
    fn strip_removes_only_escapes() {
        let text = "\x1b[31mred\x1b[0m\nline\t2\x1b]8;;http://x\x1b\\link\x1b]8;;\x07\x07\x00!";
        assert_eq!(strip_control(text), "red\nline\t2link!");
    }

    #[test]
    fn strip_is_idempotent() {
        let text = "\x1b[?25l\x1bPq#0\x1b\\ok\u{9b}\x1b[2K done";
        let once = strip_control(text).into_owned();
        assert_eq!(strip_control(&once), once);
    }

    #[test]
    fn prioritize_follows_total_order() {
        use AgentStatus::*;
        assert_eq!(prioritize(&[Error, Idle]), Error);
        assert_eq!(prioritize(&[Waiting, Busy]), Waiting);
        assert_eq!(prioritize(&[Unknown, Waiting]), Unknown);
        assert_eq!(prioritize(&[Busy, Idle, Busy]), Busy);
        assert_eq!(prioritize(&[]), Idle);
    }

    #[test]
    fn priority_is_strict() {
        let ranks: Vec<u8> = ALL.iter().map(|s| s.priority()).collect();
        assert_eq!(ranks, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn attention_states() {
        let attention: Vec<AgentStatus> = ALL
            .into_iter()
            .filter(|s| s.needs_attention())
            .collect();
        assert_eq!(
            attention,
            [AgentStatus::Error, AgentStatus::Unknown, AgentStatus::Waiting]
        );
    }

    #[test]
    fn colorize_wraps_glyph() {
        assert_eq!(AgentStatus::Waiting.colorize(), "#[fg=yellow]■#[default]");
    }
}
