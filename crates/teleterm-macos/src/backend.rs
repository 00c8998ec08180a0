//! [`TerminalBackend`] driving windows through accessibility and synthesized
//! key events.

use std::time::Duration;

use teleterm_core::{
    BackendError, ConnectionState, Key, KeyboardCaps, KeystrokeEvent, Liveness, Modifiers,
    TerminalBackend, TerminalSession, resolve_liveness, trim_capture,
};

use crate::activity::activity_label;
use crate::keycode::{KVK_ESCAPE, KVK_RETURN, KVK_TAB, KVK_UNICODE, keycode_for_char};
use crate::window::{KeyStroke, WindowRecord, WindowSystem};

/// Applications treated as terminals, matched case-insensitively as substrings
/// of the owning app's name.
pub const TERMINAL_APPS: &[&str] = &[
    "Terminal", "iTerm2", "iTerm", "Ghostty", "kitty", "Alacritty", "Hyper", "Warp", "WezTerm",
    "Tabby",
];

const MIN_WINDOW_SIDE: f64 = 50.0;
const ENTER_SETTLE: Duration = Duration::from_millis(50);

pub fn is_terminal_app(owner: &str) -> bool {
    let owner = owner.to_lowercase();
    TERMINAL_APPS
        .iter()
        .any(|app| owner.contains(&app.to_lowercase()))
}

pub struct AccessibilityBackend<W> {
    system: W,
    attach_any: bool,
}

impl<W: WindowSystem> AccessibilityBackend<W> {
    pub fn new(system: W) -> Self {
        Self {
            system,
            attach_any: false,
        }
    }

    /// List every normal window instead of terminals only.
    #[must_use]
    pub fn attach_to_any_window(mut self, enabled: bool) -> Self {
        self.attach_any = enabled;
        self
    }

    pub fn system(&self) -> &W {
        &self.system
    }

    fn listable(&self, w: &WindowRecord) -> bool {
        w.layer == 0
            && w.width > MIN_WINDOW_SIDE
            && w.height > MIN_WINDOW_SIDE
            && (self.attach_any || is_terminal_app(&w.owner))
    }

    fn read_text(&self, pid: u32, window_id: u32) -> Result<Option<String>, BackendError> {
        let raw = self.system.window_text(pid, window_id)?;
        Ok(raw.and_then(|text| trim_capture(&text.replace('\0', ""))))
    }

    fn stroke_for(key: Key, modifiers: Modifiers) -> KeyStroke {
        let (keycode, unicode) = match key {
            Key::Enter => (KVK_RETURN, None),
            Key::Tab => (KVK_TAB, None),
            Key::Escape => (KVK_ESCAPE, None),
            // With modifiers held, the physical key lets the system derive
            // the combination; otherwise the character travels as text.
            Key::Char(c) => match keycode_for_char(c) {
                Some(code) if !modifiers.is_empty() => (code, None),
                _ => (KVK_UNICODE, Some(c)),
            },
        };
        let modifiers = if key == Key::Escape {
            Modifiers::NONE
        } else {
            modifiers
        };
        KeyStroke {
            keycode,
            unicode,
            modifiers,
        }
    }
}

fn parse_window_id(id: &str) -> Result<u32, BackendError> {
    id.parse()
        .map_err(|_| BackendError::Unavailable(format!("invalid window id {id:?}")))
}

impl<W: WindowSystem> TerminalBackend for AccessibilityBackend<W> {
    fn list(&self) -> Result<Vec<TerminalSession>, BackendError> {
        let windows = self.system.windows()?;
        let processes = self.system.processes();
        let mut sessions = Vec::new();
        for w in windows.iter().filter(|w| self.listable(w)) {
            let title = if w.title.is_empty() {
                self.system.ax_title(w.pid, w.window_id).unwrap_or_default()
            } else {
                w.title.clone()
            };
            let text = self.read_text(w.pid, w.window_id).unwrap_or_else(|e| {
                tracing::debug!(window_id = w.window_id, error = %e, "no text for activity label");
                None
            });
            let mut session = TerminalSession::new(w.window_id.to_string(), w.pid, &w.owner, title);
            session.activity = activity_label(text.as_deref(), w.pid, &processes);
            sessions.push(session);
        }
        tracing::debug!(count = sessions.len(), total = windows.len(), "listed windows");
        Ok(sessions)
    }

    fn probe(&self, id: &str, pid: u32) -> Result<Liveness, BackendError> {
        let windows = self.system.windows()?;
        let ids: Vec<(String, u32)> = windows
            .iter()
            .filter(|w| self.listable(w))
            .map(|w| (w.window_id.to_string(), w.pid))
            .collect();
        Ok(resolve_liveness(
            id,
            pid,
            ids.iter().map(|(id, pid)| (id.as_str(), *pid)),
        ))
    }

    fn capture(&self, conn: &ConnectionState) -> Result<Option<String>, BackendError> {
        let window_id = parse_window_id(&conn.id)?;
        self.read_text(conn.pid, window_id)
    }

    fn inject(&self, conn: &ConnectionState, events: &[KeystrokeEvent]) -> Result<(), BackendError> {
        let window_id = parse_window_id(&conn.id)?;
        if let Err(e) = self.system.raise(conn.pid, window_id) {
            tracing::warn!(window_id, error = %e, "could not raise window; posting keys anyway");
        }
        let post = |stroke: KeyStroke| {
            self.system
                .post_key(conn.pid, stroke)
                .map_err(|e| BackendError::InjectFailed(e.to_string()))
        };
        for (i, event) in events.iter().enumerate() {
            match event {
                KeystrokeEvent::Literal(text) => {
                    for c in text.chars() {
                        post(Self::stroke_for(Key::Char(c), Modifiers::NONE))?;
                    }
                }
                KeystrokeEvent::Special { key, modifiers } => {
                    let trailing_enter =
                        i > 0 && i + 1 == events.len() && event.is_enter() && modifiers.is_empty();
                    if trailing_enter {
                        self.system.pause(ENTER_SETTLE);
                    }
                    post(Self::stroke_for(*key, *modifiers))?;
                }
            }
        }
        Ok(())
    }

    fn keyboard(&self) -> KeyboardCaps {
        KeyboardCaps { cmd: true }
    }
}
