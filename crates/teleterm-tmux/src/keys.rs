//! Rendering keystroke events as `tmux send-keys` invocations.

use std::borrow::Cow;

use teleterm_core::{Key, KeystrokeEvent, Modifiers};

use crate::error::TmuxError;
use crate::executor::TmuxCommandRunner;

/// tmux key name for a special keystroke, with `C-`/`M-` prefixes.
///
/// Returns `None` for an unmodified character, which is sent literally
/// instead. Cmd has no tmux equivalent and is dropped.
pub fn render_key(key: Key, modifiers: Modifiers) -> Option<String> {
    let mut name = String::new();
    // Escape is always sent bare.
    if key != Key::Escape {
        if modifiers.ctrl {
            name.push_str("C-");
        }
        if modifiers.alt {
            name.push_str("M-");
        }
    }
    match key {
        Key::Enter => name.push_str("Enter"),
        Key::Tab => name.push_str("Tab"),
        Key::Escape => name.push_str("Escape"),
        Key::Char(c) => {
            if name.is_empty() {
                return None;
            }
            name.push(c);
        }
    }
    Some(name)
}

/// tmux reads an argument ending in `;` as a command separator and drops
/// the `;` (a trailing `\;` becomes `;`). A backslash before the final `;`
/// makes tmux deliver the argument as written.
pub fn escape_trailing_semicolon(arg: &str) -> Cow<'_, str> {
    match arg.strip_suffix(';') {
        Some(head) => Cow::Owned(format!("{head}\\;")),
        None => Cow::Borrowed(arg),
    }
}

fn send_literal(runner: &impl TmuxCommandRunner, pane_id: &str, text: &str) -> Result<(), TmuxError> {
    if text.is_empty() {
        return Ok(());
    }
    let text = escape_trailing_semicolon(text);
    let mut args = vec!["send-keys", "-t", pane_id, "-l"];
    if text.starts_with('-') {
        args.push("--");
    }
    args.push(&*text);
    runner.run(&args).map(drop)
}

/// Deliver `events` to `pane_id` in order, one `send-keys` per event.
pub fn send_events(
    runner: &impl TmuxCommandRunner,
    pane_id: &str,
    events: &[KeystrokeEvent],
) -> Result<(), TmuxError> {
    for event in events {
        match event {
            KeystrokeEvent::Literal(text) => send_literal(runner, pane_id, text)?,
            KeystrokeEvent::Special { key, modifiers } => match render_key(*key, *modifiers) {
                Some(name) => {
                    let name = escape_trailing_semicolon(&name);
                    runner.run(&["send-keys", "-t", pane_id, &*name]).map(drop)?
                }
                None => {
                    if let Key::Char(c) = key {
                        send_literal(runner, pane_id, c.encode_utf8(&mut [0; 4]))?;
                    }
                }
            },
        }
    }
    Ok(())
}
