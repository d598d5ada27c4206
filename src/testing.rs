//! In-memory stand-ins for tmux and the process table.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::process::{ChildProcess, ProcessTable};
use crate::tmux::{Multiplexer, Pane, Session, TmuxError, Window};

pub fn pane(id: &str, command: &str, pid: Option<u32>) -> Pane {
    Pane {
        id: id.to_string(),
        window_id: String::new(),
        pid,
        command: command.to_string(),
        cwd: String::new(),
        active: false,
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub sessions: Vec<Session>,
    pub windows: HashMap<String, Vec<Window>>,
    pub panes: HashMap<String, Vec<Pane>>,
    pub captures: HashMap<String, String>,
    pub env: HashMap<String, String>,
    pub renames: Vec<(String, String)>,
    pub menus: Vec<Vec<String>>,
    pub messages: Vec<String>,
    pub bells: usize,
    pub fail_renames_for: Vec<String>,
    pub fail_menus: bool,
}

#[derive(Debug, Default)]
pub struct FakeTmux {
    state: Mutex<FakeState>,
}

impl FakeTmux {
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn session(self, id: &str, name: &str) -> Self {
        self.state().sessions.push(Session {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn window(self, session_id: &str, id: &str, index: u32, name: &str) -> Self {
        self.state()
            .windows
            .entry(session_id.to_string())
            .or_default()
            .push(Window {
                id: id.to_string(),
                index,
                name: name.to_string(),
                active_pane: String::new(),
            });
        self
    }

    pub fn pane(self, window_id: &str, pane: Pane) -> Self {
        let pane = Pane {
            window_id: window_id.to_string(),
            ..pane
        };
        self.state()
            .panes
            .entry(window_id.to_string())
            .or_default()
            .push(pane);
        self
    }

    pub fn capture(self, pane_id: &str, text: &str) -> Self {
        self.state()
            .captures
            .insert(pane_id.to_string(), text.to_string());
        self
    }

    pub fn set_capture(&self, pane_id: &str, text: &str) {
        self.state()
            .captures
            .insert(pane_id.to_string(), text.to_string());
    }

    pub fn window_name(&self, window_id: &str) -> Option<String> {
        self.state()
            .windows
            .values()
            .flatten()
            .find(|w| w.id == window_id)
            .map(|w| w.name.clone())
    }
}

impl Multiplexer for FakeTmux {
    async fn list_sessions(&self) -> Vec<Session> {
        self.state().sessions.clone()
    }

    async fn list_windows(&self, session_id: &str) -> Vec<Window> {
        self.state()
            .windows
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn list_panes(&self, window_id: &str) -> Vec<Pane> {
        self.state()
            .panes
            .get(window_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn capture_pane(&self, pane_id: &str, _lines: usize) -> String {
        self.state()
            .captures
            .get(pane_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn get_env(&self, key: &str) -> Option<String> {
        self.state().env.get(key).cloned()
    }

    async fn rename_window(&self, window_id: &str, name: &str) -> Result<(), TmuxError> {
        let mut state = self.state();
        if state.fail_renames_for.iter().any(|id| id == window_id) {
            return Err(TmuxError::CommandFailed(format!("can't rename {window_id}")));
        }
        state.renames.push((window_id.to_string(), name.to_string()));
        for window in state.windows.values_mut().flatten() {
            if window.id == window_id {
                window.name = name.to_string();
            }
        }
        Ok(())
    }

    async fn set_env(&self, key: &str, value: &str) -> Result<(), TmuxError> {
        self.state()
            .env
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn display_menu(&self, args: &[String]) -> Result<(), TmuxError> {
        let mut state = self.state();
        if state.fail_menus {
            return Err(TmuxError::CommandFailed("menu too big".to_string()));
        }
        state.menus.push(args.to_vec());
        Ok(())
    }

    async fn display_message(&self, text: &str) -> Result<(), TmuxError> {
        self.state().messages.push(text.to_string());
        Ok(())
    }

    async fn ring_bell(&self) -> Result<(), TmuxError> {
        self.state().bells += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeProcessTable {
    children: HashMap<u32, Vec<ChildProcess>>,
    commands: HashMap<u32, String>,
}

impl FakeProcessTable {
    pub fn with_children(mut self, parent: u32, commands: &[&str]) -> Self {
        for (offset, command) in commands.iter().enumerate() {
            let pid = parent * 100 + offset as u32;
            self.commands.insert(pid, command.to_string());
            self.children.entry(parent).or_default().push(ChildProcess {
                pid,
                command: command.to_string(),
            });
        }
        self
    }

    pub fn with_command(mut self, pid: u32, command: &str) -> Self {
        self.commands.insert(pid, command.to_string());
        self
    }
}

impl ProcessTable for FakeProcessTable {
    async fn children_of(&self, pid: u32) -> Vec<ChildProcess> {
        self.children.get(&pid).cloned().unwrap_or_default()
    }

    async fn command_of(&self, pid: u32) -> Option<String> {
        self.commands.get(&pid).cloned()
    }
}
