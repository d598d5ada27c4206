/// What a single invocation does, selected from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Rename every window after its program, path and agent status
    RenameWindows,
    /// Print `"<glyph> <count>"` for the status bar
    PrintStatus,
    /// Open the agent picker on the attached client
    ShowMenu,
    /// Print the picker as a `display-menu` command line
    PrintMenuCommand,
    /// Ring the bell when more agents need attention than last time
    CheckAttention,
}
