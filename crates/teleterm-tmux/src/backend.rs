//! [`TerminalBackend`] over the tmux CLI.

use teleterm_core::{
    BackendError, ConnectionState, KeyboardCaps, KeystrokeEvent, Liveness, TerminalBackend,
    TerminalSession, resolve_liveness, trim_capture,
};

use crate::capture::capture_pane;
use crate::executor::TmuxCommandRunner;
use crate::keys::send_events;
use crate::pane_info::list_panes;

/// Panes are addressed by id, so injection needs no focus change.
pub struct TmuxBackend<R> {
    runner: R,
}

impl<R: TmuxCommandRunner> TmuxBackend<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }
}

impl<R: TmuxCommandRunner> TerminalBackend for TmuxBackend<R> {
    fn list(&self) -> Result<Vec<TerminalSession>, BackendError> {
        let panes = list_panes(&self.runner)?;
        tracing::debug!(count = panes.len(), "listed tmux panes");
        Ok(panes.into_iter().map(TerminalSession::from).collect())
    }

    fn probe(&self, id: &str, pid: u32) -> Result<Liveness, BackendError> {
        let panes = list_panes(&self.runner)?;
        Ok(resolve_liveness(
            id,
            pid,
            panes.iter().map(|p| (p.pane_id.as_str(), p.pane_pid)),
        ))
    }

    fn capture(&self, conn: &ConnectionState) -> Result<Option<String>, BackendError> {
        let raw = capture_pane(&self.runner, &conn.id)?;
        Ok(trim_capture(&raw))
    }

    fn inject(&self, conn: &ConnectionState, events: &[KeystrokeEvent]) -> Result<(), BackendError> {
        send_events(&self.runner, &conn.id, events).map_err(|e| {
            tracing::warn!(pane_id = %conn.id, error = %e, "send-keys failed");
            BackendError::InjectFailed(e.to_string())
        })
    }

    fn keyboard(&self) -> KeyboardCaps {
        KeyboardCaps { cmd: false }
    }
}
