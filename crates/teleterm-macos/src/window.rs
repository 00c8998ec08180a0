//! The window-system seam: everything the accessibility backend needs from
//! the OS, expressed as plain data so the backend logic can run anywhere.

use std::time::Duration;

use teleterm_core::{BackendError, Modifiers};
use thiserror::Error;

use crate::activity::{ProcessMap, scan_all_processes};

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("window enumeration failed: {0}")]
    Enumeration(String),

    #[error("window {0} not found")]
    NotFound(u32),

    #[error("accessibility call failed: {0}")]
    Accessibility(String),

    #[error("could not post key event: {0}")]
    EventPost(String),

    #[error("window system not supported on this platform")]
    Unsupported,
}

impl From<WindowError> for BackendError {
    fn from(err: WindowError) -> Self {
        BackendError::Unavailable(err.to_string())
    }
}

/// One on-screen window as reported by the window server.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowRecord {
    pub window_id: u32,
    pub pid: u32,
    /// Owning application's name.
    pub owner: String,
    /// Window server title. Often empty without Screen Recording permission.
    pub title: String,
    pub layer: i64,
    pub width: f64,
    pub height: f64,
}

/// A single key down/up pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub keycode: u16,
    /// Character attached to the event; when set, the keycode is ignored by
    /// the receiving app.
    pub unicode: Option<char>,
    pub modifiers: Modifiers,
}

pub trait WindowSystem: Send {
    /// On-screen windows, excluding desktop elements, front to back.
    fn windows(&self) -> Result<Vec<WindowRecord>, WindowError>;

    /// Title from the accessibility tree, used when the window server has none.
    fn ax_title(&self, pid: u32, window_id: u32) -> Option<String>;

    /// Text of the first text-bearing element under the window.
    fn window_text(&self, pid: u32, window_id: u32) -> Result<Option<String>, WindowError>;

    /// Raise the window and bring its application to the front.
    fn raise(&self, pid: u32, window_id: u32) -> Result<(), WindowError>;

    fn post_key(&self, pid: u32, stroke: KeyStroke) -> Result<(), WindowError>;

    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn processes(&self) -> ProcessMap {
        scan_all_processes()
    }
}

impl<T: WindowSystem + Sync + ?Sized> WindowSystem for &T {
    fn windows(&self) -> Result<Vec<WindowRecord>, WindowError> {
        (**self).windows()
    }

    fn ax_title(&self, pid: u32, window_id: u32) -> Option<String> {
        (**self).ax_title(pid, window_id)
    }

    fn window_text(&self, pid: u32, window_id: u32) -> Result<Option<String>, WindowError> {
        (**self).window_text(pid, window_id)
    }

    fn raise(&self, pid: u32, window_id: u32) -> Result<(), WindowError> {
        (**self).raise(pid, window_id)
    }

    fn post_key(&self, pid: u32, stroke: KeyStroke) -> Result<(), WindowError> {
        (**self).post_key(pid, stroke)
    }

    fn pause(&self, duration: Duration) {
        (**self).pause(duration);
    }

    fn processes(&self) -> ProcessMap {
        (**self).processes()
    }
}
