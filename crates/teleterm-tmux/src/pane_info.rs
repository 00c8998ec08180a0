//! Pane listing: `list-panes` format string, row type and parser.

use teleterm_core::TerminalSession;

use crate::error::TmuxError;
use crate::executor::TmuxCommandRunner;

/// Tab-delimited format for `tmux list-panes -a -F`. The title is last so it
/// may itself contain tabs.
pub const LIST_PANES_FORMAT: &str =
    "#{pane_id}\t#{session_name}:#{window_index}.#{pane_index}\t#{pane_pid}\t#{pane_title}";

const FIELDS: usize = 4;

/// One row of `list-panes` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmuxPane {
    /// `%N`, stable for the pane's lifetime.
    pub pane_id: String,
    /// `session:window.pane`
    pub target: String,
    pub pane_pid: u32,
    pub title: String,
}

impl From<TmuxPane> for TerminalSession {
    fn from(pane: TmuxPane) -> Self {
        TerminalSession::new(pane.pane_id, pane.pane_pid, pane.target, pane.title)
    }
}

/// Execute `tmux list-panes -a` across every session and parse the output.
pub fn list_panes(runner: &impl TmuxCommandRunner) -> Result<Vec<TmuxPane>, TmuxError> {
    let output = runner.run(&["list-panes", "-a", "-F", LIST_PANES_FORMAT])?;
    parse_list_panes_output(&output)
}

pub fn parse_list_panes_output(output: &str) -> Result<Vec<TmuxPane>, TmuxError> {
    output
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| parse_line(line, idx + 1))
        .collect()
}

fn parse_line(line: &str, line_num: usize) -> Result<TmuxPane, TmuxError> {
    let parts: Vec<&str> = line.splitn(FIELDS, '\t').collect();
    if parts.len() < FIELDS {
        return Err(TmuxError::ParseError {
            line_num,
            detail: format!("expected {FIELDS} tab-separated fields, got {}", parts.len()),
        });
    }
    let pane_pid = parts[2]
        .trim()
        .parse::<u32>()
        .map_err(|e| TmuxError::ParseError {
            line_num,
            detail: format!("pane_pid {:?}: {e}", parts[2]),
        })?;

    Ok(TmuxPane {
        pane_id: parts[0].trim().to_string(),
        target: parts[1].to_string(),
        pane_pid,
        title: parts[3].trim_end_matches('\r').to_string(),
    })
}
