use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod actions;
mod aggregate;
mod app;
mod config;
mod menu;
mod naming;
mod process;
#[cfg(test)]
mod testing;
mod tmux;

use actions::Action;
use app::App;
use config::Config;
use process::PsProcessTable;
use tmux::TmuxClient;

/// Names tmux windows after what runs in them and tracks AI agent panes
#[derive(Parser)]
#[command(name = "tmux-agent-status", version)]
struct Cli {
    /// Print "<glyph> <count>" for the status bar
    #[arg(long, group = "mode")]
    status: bool,

    /// Open the agent picker
    #[arg(long, group = "mode")]
    menu: bool,

    /// Print the agent picker as a display-menu command
    #[arg(long, group = "mode")]
    menu_cmd: bool,

    /// Ring the bell when more agents need attention
    #[arg(long, group = "mode")]
    check_attention: bool,

    /// Config file (JSON)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log per-item failures to stderr
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn action(&self) -> Action {
        if self.status {
            Action::PrintStatus
        } else if self.menu {
            Action::ShowMenu
        } else if self.menu_cmd {
            Action::PrintMenuCommand
        } else if self.check_attention {
            Action::CheckAttention
        } else {
            Action::RenameWindows
        }
    }
}

/// How the Refresh entry reopens the menu
fn refresh_command() -> String {
    std::env::current_exe()
        .ok()
        .map(|exe| format!("{} --menu", exe.display()))
        .unwrap_or_else(|| "tmux-agent-status --menu".to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // stdout belongs to tmux, logs go to stderr
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref());
    let home = if config.tilde_home {
        dirs::home_dir().map(|dir| dir.to_string_lossy().into_owned())
    } else {
        None
    };

    let mux = TmuxClient::new(config.tmux_bin.clone(), config.timeout());
    let table = PsProcessTable::new(config.ps_bin.clone(), config.timeout());
    let app = App::new(mux, table, config, home, refresh_command());

    if let Some(output) = app.handle_action(cli.action()).await {
        println!("{output}");
    }
}
