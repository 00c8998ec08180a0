//! teleterm-macos: accessibility backend.
//! Window enumeration, accessibility text capture and synthesized key events
//! behind the [`WindowSystem`] seam; the CoreGraphics implementation is only
//! built on macOS.

pub mod activity;
pub mod backend;
pub mod keycode;
pub mod window;

#[cfg(target_os = "macos")]
pub mod ffi;

pub use backend::{AccessibilityBackend, TERMINAL_APPS, is_terminal_app};
pub use window::{KeyStroke, WindowError, WindowRecord, WindowSystem};

#[cfg(target_os = "macos")]
pub use ffi::MacWindowSystem;
