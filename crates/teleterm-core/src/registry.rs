//! Session registry: last listing snapshot, the single connection, and the
//! live-view message ids tied to it.

use thiserror::Error;

use crate::backend::{BackendError, Liveness, TerminalBackend};
use crate::output::TrackedMessages;
use crate::types::{ConnectionState, TerminalSession};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid session index {index} (have {count})")]
    InvalidIndex { index: usize, count: usize },

    #[error("connected session is gone")]
    SessionGone,

    #[error("not connected")]
    NotConnected,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Vec<TerminalSession>,
    connection: Option<ConnectionState>,
    tracked: TrackedMessages,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot with a fresh listing. Display indices are
    /// 1-based positions in this slice, valid until the next refresh.
    pub fn refresh(
        &mut self,
        backend: &impl TerminalBackend,
    ) -> Result<&[TerminalSession], RegistryError> {
        self.sessions = backend.list()?;
        tracing::debug!(count = self.sessions.len(), "session listing refreshed");
        Ok(&self.sessions)
    }

    pub fn sessions(&self) -> &[TerminalSession] {
        &self.sessions
    }

    /// Connect to the session at 1-based `index` of the current snapshot.
    /// On failure the existing connection is left untouched. Tracked output
    /// ids survive a switch so the next output send deletes the old view.
    pub fn connect(&mut self, index: usize) -> Result<&ConnectionState, RegistryError> {
        let count = self.sessions.len();
        if index == 0 || index > count {
            return Err(RegistryError::InvalidIndex { index, count });
        }
        let conn = ConnectionState::from(&self.sessions[index - 1]);
        tracing::info!(id = %conn.id, pid = conn.pid, name = %conn.name, "connected");
        Ok(self.connection.insert(conn))
    }

    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            tracing::info!(id = %conn.id, name = %conn.name, "disconnected");
        }
        self.tracked.clear();
    }

    pub fn connection(&self) -> Option<&ConnectionState> {
        self.connection.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn tracked(&self) -> &TrackedMessages {
        &self.tracked
    }

    pub fn tracked_mut(&mut self) -> &mut TrackedMessages {
        &mut self.tracked
    }

    /// Probe the connected session. Adopts a drifted id in place; on
    /// failure (including a probe error) disconnects and reports `SessionGone`.
    pub fn verify_live(&mut self, backend: &impl TerminalBackend) -> Result<(), RegistryError> {
        let Some(conn) = self.connection.as_mut() else {
            return Err(RegistryError::NotConnected);
        };
        let liveness = match backend.probe(&conn.id, conn.pid) {
            Ok(liveness) => liveness,
            Err(e) => {
                tracing::warn!(error = %e, id = %conn.id, "liveness probe failed");
                Liveness::Gone
            }
        };
        match liveness {
            Liveness::Live => Ok(()),
            Liveness::Drifted(new_id) => {
                tracing::info!(old = %conn.id, new = %new_id, pid = conn.pid, "session identity drifted");
                conn.id = new_id;
                Ok(())
            }
            Liveness::Gone => {
                self.disconnect();
                Err(RegistryError::SessionGone)
            }
        }
    }
}

pub const NO_SESSIONS: &str = "No terminal sessions found.";

/// Numbered session menu, indices matching [`SessionRegistry::connect`].
pub fn format_menu(sessions: &[TerminalSession]) -> String {
    if sessions.is_empty() {
        return NO_SESSIONS.to_string();
    }
    let mut msg = String::from("Terminal windows:\n");
    for (i, session) in sessions.iter().enumerate() {
        msg.push_str(&format!(".{} {}", i + 1, session.name));
        if !session.title.is_empty() {
            msg.push_str(" - ");
            msg.push_str(&session.title);
        }
        if let Some(activity) = &session.activity {
            msg.push_str(&format!(" [{activity}]"));
        }
        msg.push('\n');
    }
    msg
}
