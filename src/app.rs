use anyhow::{Context, Result};
use tracing::debug;

use crate::actions::Action;
use crate::aggregate::Scanner;
use crate::config::Config;
use crate::menu::{build_menu, MenuOptions};
use crate::naming::{
    build_base_name, format_path, parse_pi_footer, trim_name, window_label, PaneContext,
};
use crate::process::{extract_filename, ProcessTable, ProgramResolver};
use crate::tmux::{Multiplexer, Pane, Window};

const NO_AGENTS: &str = "No AI agents running";
const NO_SESSIONS: &str = "No tmux sessions";

/// One invocation's worth of state
pub struct App<M, P> {
    mux: M,
    resolver: ProgramResolver<P>,
    config: Config,
    /// Home directory shown as `~`, `None` to keep paths verbatim
    home: Option<String>,
    /// Shell command that reopens the menu
    refresh_command: String,
}

impl<M: Multiplexer, P: ProcessTable> App<M, P> {
    pub fn new(
        mux: M,
        table: P,
        config: Config,
        home: Option<String>,
        refresh_command: impl Into<String>,
    ) -> Self {
        let resolver = ProgramResolver::new(table, config.self_signature.clone());
        Self {
            mux,
            resolver,
            config,
            home,
            refresh_command: refresh_command.into(),
        }
    }

    fn scanner(&self) -> Scanner<'_, M, P> {
        Scanner::new(&self.mux, &self.resolver, self.config.capture_lines)
    }

    /// Run the action; the returned text, if any, goes to stdout
    pub async fn handle_action(&self, action: Action) -> Option<String> {
        match action {
            Action::RenameWindows => {
                self.rename_windows().await;
                None
            }
            Action::PrintStatus => self.status_line().await,
            Action::ShowMenu => {
                self.run_menu().await;
                None
            }
            Action::PrintMenuCommand => Some(self.menu_command().await),
            Action::CheckAttention => {
                self.check_attention().await;
                None
            }
        }
    }

    pub async fn rename_windows(&self) {
        for session in self.mux.list_sessions().await {
            for window in self.mux.list_windows(&session.id).await {
                if let Err(e) = self.refresh_window(&window).await {
                    debug!(session = %session.name, window = %window.id, "skipped: {e:#}");
                }
            }
        }
    }

    async fn refresh_window(&self, window: &Window) -> Result<()> {
        let panes = self.mux.list_panes(&window.id).await;
        let active = panes
            .iter()
            .find(|p| p.active)
            .or_else(|| panes.iter().find(|p| p.id == window.active_pane))
            .or_else(|| panes.first());
        let Some(active) = active else {
            return Ok(());
        };

        let program = self.resolver.resolve(active).await;
        let path = format_path(&active.cwd, self.home.as_deref());
        let context = self.pane_context(active, &program).await;
        let shorten = self.config.shorten_paths;
        let base = build_base_name(&program, &path, shorten, context.as_ref());
        if base.is_empty() && program.is_empty() {
            return Ok(());
        }

        let status = self.scanner().window_status(&panes).await;
        let label = window_label(&base, &program, &path, status.status, shorten, context.as_ref());
        let label = trim_name(&label, self.config.max_name_len);
        if label == window.name {
            return Ok(());
        }

        self.mux
            .rename_window(&window.id, &label)
            .await
            .with_context(|| format!("Failed to rename {} to {label:?}", window.id))?;
        debug!(window = %window.id, from = %window.name, to = %label, "renamed");
        Ok(())
    }

    /// Branch and session from pi's footer, or the file an editor has open
    async fn pane_context(&self, pane: &Pane, program: &str) -> Option<PaneContext> {
        match program {
            "pi" => {
                let content = self.mux.capture_pane(&pane.id, self.config.capture_lines).await;
                Some(parse_pi_footer(&content))
            }
            "nvim" | "vim" | "vi" => {
                let cmdline = self.resolver.command_line(pane).await?;
                Some(PaneContext {
                    filename: Some(extract_filename(&cmdline)?),
                    ..Default::default()
                })
            }
            _ => None,
        }
    }

    pub async fn status_line(&self) -> Option<String> {
        let global = self.scanner().global_status().await;
        global
            .status
            .map(|status| format!("{} {}", status.glyph(), global.count))
    }

    fn menu_options(&self, colorize: bool) -> MenuOptions<'_> {
        MenuOptions {
            title: &self.config.menu_title,
            path_len: self.config.menu_path_len,
            home: self.home.as_deref(),
            refresh_command: &self.refresh_command,
            colorize,
        }
    }

    pub async fn menu_command(&self) -> String {
        let agents = self.scanner().agents().await;
        match build_menu(&agents, &self.menu_options(false)) {
            Some(menu) => menu.to_command(),
            None => format!("display-message \"{NO_AGENTS}\""),
        }
    }

    pub async fn run_menu(&self) {
        if self.mux.list_sessions().await.is_empty() {
            self.notify(NO_SESSIONS).await;
            return;
        }

        let agents = self.scanner().agents().await;
        let Some(menu) = build_menu(&agents, &self.menu_options(true)) else {
            self.notify(NO_AGENTS).await;
            return;
        };

        if let Err(e) = self.mux.display_menu(&menu.to_args()).await {
            self.notify(&format!("Error: {e}")).await;
        }
    }

    async fn notify(&self, text: &str) {
        if let Err(e) = self.mux.display_message(text).await {
            debug!(error = %e, "display-message failed");
        }
    }

    /// Ring once when the number of agents needing attention grows.
    ///
    /// The last count lives in the global tmux environment. It only moves up,
    /// and back to zero once nothing needs attention.
    pub async fn check_attention(&self) {
        if self.mux.list_sessions().await.is_empty() {
            return;
        }

        let current = self.scanner().global_status().await.attention.len();
        let key = self.config.attention_env.as_str();
        let last = self
            .mux
            .get_env(key)
            .await
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        debug!(current, last, "attention");

        let stored = if current > last {
            if let Err(e) = self.mux.ring_bell().await {
                debug!(error = %e, "bell failed");
            }
            current
        } else if current == 0 {
            0
        } else {
            return;
        };
        if let Err(e) = self.mux.set_env(key, &stored.to_string()).await {
            debug!(error = %e, "failed to store attention count");
        }
    }
}
