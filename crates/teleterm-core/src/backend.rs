//! Backend capability contract: list / liveness-check / capture / inject.
//!
//! Backends hold no session state. Everything they need about the connected
//! session is passed in, and everything they learn (including identity drift)
//! is handed back to the caller.

use thiserror::Error;

use crate::types::{ConnectionState, KeyboardCaps, KeystrokeEvent, TerminalSession};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("terminal backend unavailable: {0}")]
    Unavailable(String),

    #[error("no session connected")]
    NotConnected,

    #[error("keystroke injection failed: {0}")]
    InjectFailed(String),
}

/// Result of a liveness probe for a stored `(id, pid)` identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    /// The exact id is still visible.
    Live,
    /// The id vanished but another visible session shares the owning pid
    /// (tab or pane switch). Carries the replacement id.
    Drifted(String),
    Gone,
}

impl Liveness {
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Gone)
    }
}

/// Trait implemented by each platform backend.
pub trait TerminalBackend: Send {
    /// Enumerate currently visible sessions. May be empty.
    fn list(&self) -> Result<Vec<TerminalSession>, BackendError>;

    /// Probe whether `id` (owned by `pid`) is still visible, with drift tolerance.
    fn probe(&self, id: &str, pid: u32) -> Result<Liveness, BackendError>;

    /// Visible text of the connected session, already passed through
    /// [`trim_capture`]. `None` when nothing remains after trimming.
    fn capture(&self, conn: &ConnectionState) -> Result<Option<String>, BackendError>;

    /// Deliver `events` in order, focusing the target first where required.
    fn inject(&self, conn: &ConnectionState, events: &[KeystrokeEvent])
        -> Result<(), BackendError>;

    /// Modifier keys this backend can deliver.
    fn keyboard(&self) -> KeyboardCaps;
}

impl<T: TerminalBackend + ?Sized> TerminalBackend for Box<T> {
    fn list(&self) -> Result<Vec<TerminalSession>, BackendError> {
        (**self).list()
    }

    fn probe(&self, id: &str, pid: u32) -> Result<Liveness, BackendError> {
        (**self).probe(id, pid)
    }

    fn capture(&self, conn: &ConnectionState) -> Result<Option<String>, BackendError> {
        (**self).capture(conn)
    }

    fn inject(
        &self,
        conn: &ConnectionState,
        events: &[KeystrokeEvent],
    ) -> Result<(), BackendError> {
        (**self).inject(conn, events)
    }

    fn keyboard(&self) -> KeyboardCaps {
        (**self).keyboard()
    }
}

/// Shared drift-tolerance rule. `visible` yields `(id, pid)` pairs in listing
/// order; the first session sharing `pid` is adopted when `id` is missing.
pub fn resolve_liveness<'a>(
    id: &str,
    pid: u32,
    visible: impl IntoIterator<Item = (&'a str, u32)>,
) -> Liveness {
    let mut fallback: Option<&str> = None;
    for (candidate_id, candidate_pid) in visible {
        if candidate_id == id {
            return Liveness::Live;
        }
        if fallback.is_none() && candidate_pid == pid {
            fallback = Some(candidate_id);
        }
    }
    match fallback {
        Some(replacement) => Liveness::Drifted(replacement.to_string()),
        None => Liveness::Gone,
    }
}

/// Normalise raw captured text: strip trailing spaces on every line, drop
/// trailing blank lines, keep at most one trailing line terminator.
///
/// Returns `None` if nothing but whitespace remains.
pub fn trim_capture(raw: &str) -> Option<String> {
    let mut lines: Vec<&str> = raw
        .split('\n')
        .map(|line| line.trim_end_matches([' ', '\t', '\r']))
        .collect();
    let had_terminator = raw.trim_end_matches([' ', '\t', '\r']).ends_with('\n');
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return None;
    }
    let mut out = lines.join("\n");
    if had_terminator {
        out.push('\n');
    }
    Some(out)
}
