//! Pane capture.

use crate::error::TmuxError;
use crate::executor::TmuxCommandRunner;

/// Capture the visible screen of `pane_id` as raw text (no trimming).
pub fn capture_pane(runner: &impl TmuxCommandRunner, pane_id: &str) -> Result<String, TmuxError> {
    runner.run(&["capture-pane", "-p", "-t", pane_id])
}
