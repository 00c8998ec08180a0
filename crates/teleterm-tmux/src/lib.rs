//! teleterm-tmux: tmux backend IO boundary.
//! Pane listing, pane capture and `send-keys` rendering over the tmux CLI,
//! plus the [`TmuxBackend`] that implements the core backend contract.

pub mod backend;
pub mod capture;
pub mod error;
pub mod executor;
pub mod keys;
pub mod pane_info;

pub use backend::TmuxBackend;
pub use capture::capture_pane;
pub use error::TmuxError;
pub use executor::{TmuxCommandRunner, TmuxExecutor};
pub use keys::{render_key, send_events};
pub use pane_info::{LIST_PANES_FORMAT, TmuxPane, list_panes, parse_list_panes_output};
