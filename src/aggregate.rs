//! Per-window and global agent status.

use tracing::debug;

use crate::process::{is_agent, ProcessTable, ProgramResolver};
use crate::tmux::{prioritize, AgentStatus, Multiplexer, Pane, StateInferenceEngine};

/// Aggregate status of the agent panes in one window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowStatus {
    /// `None` when the window has no agent panes at all
    pub status: Option<AgentStatus>,
    pub count: usize,
}

/// One agent pane, flattened for the status line and the menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInfo {
    pub session: String,
    pub window_index: u32,
    pub pane_id: String,
    pub program: String,
    pub status: AgentStatus,
    /// Raw working directory of the pane
    pub path: String,
}

/// Status across every session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GlobalStatus {
    pub status: Option<AgentStatus>,
    pub count: usize,
    /// Agents in Error, Waiting or Unknown
    pub attention: Vec<AgentInfo>,
}

impl GlobalStatus {
    pub fn from_agents(agents: &[AgentInfo]) -> Self {
        if agents.is_empty() {
            return Self::default();
        }
        let statuses: Vec<AgentStatus> = agents.iter().map(|a| a.status).collect();
        Self {
            status: Some(prioritize(&statuses)),
            count: agents.len(),
            attention: agents
                .iter()
                .filter(|a| a.status.needs_attention())
                .cloned()
                .collect(),
        }
    }
}

/// One read-only walk over the multiplexer
pub struct Scanner<'a, M, P> {
    mux: &'a M,
    resolver: &'a ProgramResolver<P>,
    capture_lines: usize,
}

impl<'a, M: Multiplexer, P: ProcessTable> Scanner<'a, M, P> {
    pub fn new(mux: &'a M, resolver: &'a ProgramResolver<P>, capture_lines: usize) -> Self {
        Self {
            mux,
            resolver,
            capture_lines,
        }
    }

    /// Panes running a known agent, with the resolved agent name
    pub async fn find_agent_panes<'p>(&self, panes: &'p [Pane]) -> Vec<(&'p Pane, String)> {
        let mut agents = Vec::new();
        for pane in panes {
            let program = self.resolver.resolve(pane).await;
            if is_agent(&program) {
                agents.push((pane, program));
            }
        }
        agents
    }

    /// Status of one pane, judged with the rules tuned for `agent`
    pub async fn classify_pane(&self, pane: &Pane, agent: &str) -> AgentStatus {
        let content = self.mux.capture_pane(&pane.id, self.capture_lines).await;
        let status = StateInferenceEngine::classify(&content, agent);
        debug!(pane = %pane.id, agent, ?status, "classified pane");
        status
    }

    pub async fn window_status(&self, panes: &[Pane]) -> WindowStatus {
        let agents = self.find_agent_panes(panes).await;
        if agents.is_empty() {
            return WindowStatus::default();
        }

        let mut statuses = Vec::with_capacity(agents.len());
        for (pane, program) in &agents {
            statuses.push(self.classify_pane(pane, program).await);
        }
        WindowStatus {
            status: Some(prioritize(&statuses)),
            count: agents.len(),
        }
    }

    /// Every agent pane in every window of every session
    pub async fn agents(&self) -> Vec<AgentInfo> {
        let mut agents = Vec::new();
        for session in self.mux.list_sessions().await {
            for window in self.mux.list_windows(&session.id).await {
                let panes = self.mux.list_panes(&window.id).await;
                for (pane, program) in self.find_agent_panes(&panes).await {
                    let status = self.classify_pane(pane, &program).await;
                    agents.push(AgentInfo {
                        session: session.name.clone(),
                        window_index: window.index,
                        pane_id: pane.id.clone(),
                        program,
                        status,
                        path: pane.cwd.clone(),
                    });
                }
            }
        }
        agents
    }

    pub async fn global_status(&self) -> GlobalStatus {
        GlobalStatus::from_agents(&self.agents().await)
    }
}
