//! Core data model shared by every backend and the dispatcher.

/// One controllable terminal session as reported by a backend listing.
///
/// The `id` is backend-specific: a tmux pane id (`%3`) or a CoreGraphics
/// window number (`1234`). Listings are replaced wholesale on every refresh,
/// so a session is only identified across listings by re-matching `id`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TerminalSession {
    pub id: String,
    pub pid: u32,
    pub name: String,
    pub title: String,
    /// Advisory label shown in listings only (`idle`, or the newest
    /// descendant process name). Never used for matching.
    pub activity: Option<String>,
}

impl TerminalSession {
    pub fn new(
        id: impl Into<String>,
        pid: u32,
        name: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            pid,
            name: name.into(),
            title: title.into(),
            activity: None,
        }
    }
}

/// The single active connection. Fields are copied out of a
/// [`TerminalSession`], never borrowed from the registry's listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    pub id: String,
    pub pid: u32,
    pub name: String,
    pub title: String,
}

impl From<&TerminalSession> for ConnectionState {
    fn from(session: &TerminalSession) -> Self {
        Self {
            id: session.id.clone(),
            pid: session.pid,
            name: session.name.clone(),
            title: session.title.clone(),
        }
    }
}

/// Accumulated modifier bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub cmd: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        alt: false,
        cmd: false,
    };

    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        alt: false,
        cmd: false,
    };

    pub fn is_empty(self) -> bool {
        !(self.ctrl || self.alt || self.cmd)
    }
}

/// Keys the codec can emit outside a literal run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Enter,
    Tab,
    Escape,
    Char(char),
}

/// The codec's only output type, consumed in order by `TerminalBackend::inject`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeystrokeEvent {
    /// Consecutive unmodified characters delivered in one call.
    Literal(String),
    Special { key: Key, modifiers: Modifiers },
}

impl KeystrokeEvent {
    pub fn key(key: Key, modifiers: Modifiers) -> Self {
        Self::Special { key, modifiers }
    }

    pub fn is_enter(&self) -> bool {
        matches!(
            self,
            Self::Special {
                key: Key::Enter,
                ..
            }
        )
    }
}

/// Which modifier keys the target platform can actually deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyboardCaps {
    /// Whether a Cmd key exists. When false the Cmd heart is a no-op.
    pub cmd: bool,
}
