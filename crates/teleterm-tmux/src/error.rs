//! Error types for the tmux backend.

use teleterm_core::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TmuxError {
    /// tmux ran but exited non-zero (no server, unknown pane, ...).
    #[error("tmux {subcommand} failed: {detail}")]
    CommandFailed { subcommand: String, detail: String },

    #[error("bad list-panes line {line_num}: {detail}")]
    ParseError { line_num: usize, detail: String },

    #[error("could not run tmux: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TmuxError> for BackendError {
    fn from(err: TmuxError) -> Self {
        BackendError::Unavailable(err.to_string())
    }
}
