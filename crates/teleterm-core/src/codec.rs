//! Keystroke codec: emoji/escape-annotated text → ordered keystroke events.
//!
//! Single left-to-right scan with a modifier accumulator and a pending
//! literal run. Token table:
//!
//! | token | effect |
//! |---|---|
//! | ❤ / ❤️ | Ctrl bit |
//! | 💙 | Alt bit |
//! | 💚 | Cmd bit (only when the keyboard has one) |
//! | 💛 | Escape, modifiers cleared |
//! | 🧡 | Enter with modifiers |
//! | `\n` `\t` `\\` | Enter / Tab / backslash with modifiers |
//! | 💜 as payload suffix | stripped, suppresses the trailing Enter |
//!
//! Anything else joins the literal run, or becomes a single modified
//! keystroke when modifiers are pending.

use crate::types::{Key, KeyboardCaps, KeystrokeEvent, Modifiers};

const RED_HEART: &str = "\u{2764}";
const VARIATION_SELECTOR: &str = "\u{FE0F}";
const BLUE_HEART: &str = "\u{1F499}";
const GREEN_HEART: &str = "\u{1F49A}";
const YELLOW_HEART: &str = "\u{1F49B}";
const ORANGE_HEART: &str = "\u{1F9E1}";
const PURPLE_HEART: &str = "\u{1F49C}";

/// Codec output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedInput {
    /// Events in delivery order, including the trailing Enter when added.
    pub events: Vec<KeystrokeEvent>,
    /// Payload ended with the purple-heart sentinel.
    pub suppress_enter: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Ctrl,
    Alt,
    Cmd,
    Escape,
    Enter,
    Tab,
    Backslash,
    Char(char),
}

/// Longest-match-first tokenizer. Returns the token and its byte length.
fn next_token(rest: &str) -> Option<(Token, usize)> {
    if let Some(after) = rest.strip_prefix(RED_HEART) {
        let len = if after.starts_with(VARIATION_SELECTOR) {
            RED_HEART.len() + VARIATION_SELECTOR.len()
        } else {
            RED_HEART.len()
        };
        return Some((Token::Ctrl, len));
    }
    for (glyph, token) in [
        (BLUE_HEART, Token::Alt),
        (GREEN_HEART, Token::Cmd),
        (YELLOW_HEART, Token::Escape),
        (ORANGE_HEART, Token::Enter),
    ] {
        if rest.starts_with(glyph) {
            return Some((token, glyph.len()));
        }
    }
    for (escape, token) in [
        ("\\n", Token::Enter),
        ("\\t", Token::Tab),
        ("\\\\", Token::Backslash),
    ] {
        if rest.starts_with(escape) {
            return Some((token, 2));
        }
    }
    let c = rest.chars().next()?;
    Some((Token::Char(c), c.len_utf8()))
}

/// Scanner state. `literal` is the pending unmodified run.
struct Scanner {
    caps: KeyboardCaps,
    modifiers: Modifiers,
    literal: String,
    events: Vec<KeystrokeEvent>,
    keystrokes: usize,
    had_modifier: bool,
}

impl Scanner {
    fn new(caps: KeyboardCaps) -> Self {
        Self {
            caps,
            modifiers: Modifiers::NONE,
            literal: String::new(),
            events: Vec::new(),
            keystrokes: 0,
            had_modifier: false,
        }
    }

    fn flush_literal(&mut self) {
        if !self.literal.is_empty() {
            self.events
                .push(KeystrokeEvent::Literal(std::mem::take(&mut self.literal)));
        }
    }

    /// Emit a key carrying (and consuming) the pending modifiers.
    fn emit_modified(&mut self, key: Key) {
        self.flush_literal();
        let modifiers = std::mem::take(&mut self.modifiers);
        if !modifiers.is_empty() {
            self.had_modifier = true;
        }
        self.keystrokes += 1;
        self.events.push(KeystrokeEvent::key(key, modifiers));
    }

    fn feed(&mut self, token: Token) {
        match token {
            Token::Ctrl => self.modifiers.ctrl = true,
            Token::Alt => self.modifiers.alt = true,
            Token::Cmd => {
                if self.caps.cmd {
                    self.modifiers.cmd = true;
                }
            }
            Token::Escape => {
                self.flush_literal();
                self.modifiers = Modifiers::NONE;
                self.had_modifier = true;
                self.keystrokes += 1;
                self.events
                    .push(KeystrokeEvent::key(Key::Escape, Modifiers::NONE));
            }
            Token::Enter => self.emit_modified(Key::Enter),
            Token::Tab => self.emit_modified(Key::Tab),
            Token::Backslash => self.emit_modified(Key::Char('\\')),
            Token::Char(c) => {
                if self.modifiers.is_empty() {
                    self.literal.push(c);
                    self.keystrokes += 1;
                } else {
                    self.emit_modified(Key::Char(c));
                }
            }
        }
    }

    /// `empty_body` is true when nothing preceded the optional suffix. Any
    /// other payload gets the trailing Enter, including one made only of
    /// modifier hearts.
    fn finish(mut self, suppress_enter: bool, empty_body: bool) -> DecodedInput {
        self.flush_literal();
        let single_control = self.keystrokes == 1 && self.had_modifier;
        let ends_with_enter = self.events.last().is_some_and(KeystrokeEvent::is_enter);
        if !empty_body && !suppress_enter && !single_control && !ends_with_enter {
            self.events
                .push(KeystrokeEvent::key(Key::Enter, Modifiers::NONE));
        }
        DecodedInput {
            events: self.events,
            suppress_enter,
        }
    }
}

/// Decode `payload` for a keyboard with the given capabilities.
///
/// Pure: identical input always yields an identical event sequence.
pub fn decode(payload: &str, caps: KeyboardCaps) -> DecodedInput {
    let (body, suppress_enter) = match payload.strip_suffix(PURPLE_HEART) {
        Some(body) => (body, true),
        None => (payload, false),
    };

    let mut scanner = Scanner::new(caps);
    let mut rest = body;
    while let Some((token, len)) = next_token(rest) {
        scanner.feed(token);
        rest = &rest[len..];
    }
    scanner.finish(suppress_enter, body.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MAC: KeyboardCaps = KeyboardCaps { cmd: true };
    const TMUX: KeyboardCaps = KeyboardCaps { cmd: false };

    fn lit(s: &str) -> KeystrokeEvent {
        KeystrokeEvent::Literal(s.to_string())
    }

    fn key(k: Key) -> KeystrokeEvent {
        KeystrokeEvent::key(k, Modifiers::NONE)
    }

    fn ctrl(k: Key) -> KeystrokeEvent {
        KeystrokeEvent::key(k, Modifiers::CTRL)
    }

    #[test]
    fn plain_text_gets_trailing_enter() {
        let out = decode("hello", TMUX);
        assert_eq!(out.events, vec![lit("hello"), key(Key::Enter)]);
        assert!(!out.suppress_enter);
    }

    #[test]
    fn red_heart_with_selector_is_single_ctrl_keystroke() {
        let out = decode("\u{2764}\u{FE0F}c", TMUX);
        assert_eq!(out.events, vec![ctrl(Key::Char('c'))]);
    }

    #[test]
    fn red_heart_without_selector() {
        let out = decode("\u{2764}c", TMUX);
        assert_eq!(out.events, vec![ctrl(Key::Char('c'))]);
    }

    #[test]
    fn bare_escape_not_terminated() {
        assert_eq!(decode("💛", TMUX).events, vec![key(Key::Escape)]);
    }

    #[test]
    fn escape_clears_pending_modifiers() {
        let out = decode("❤️💛x", TMUX);
        assert_eq!(
            out.events,
            vec![key(Key::Escape), lit("x"), key(Key::Enter)]
        );
    }

    #[test]
    fn purple_heart_suffix_suppresses_enter() {
        let out = decode("ls -la💜", TMUX);
        assert_eq!(out.events, vec![lit("ls -la")]);
        assert!(out.suppress_enter);
    }

    #[test]
    fn purple_heart_mid_string_is_literal() {
        let out = decode("a💜b", TMUX);
        assert_eq!(out.events, vec![lit("a💜b"), key(Key::Enter)]);
        assert!(!out.suppress_enter);
    }

    #[test]
    fn orange_heart_is_enter_and_ends_sequence() {
        let out = decode("y🧡", TMUX);
        assert_eq!(out.events, vec![lit("y"), key(Key::Enter)]);
    }

    #[test]
    fn escaped_newline_and_tab() {
        let out = decode("cd /tm\\t\\nls", TMUX);
        assert_eq!(
            out.events,
            vec![
                lit("cd /tm"),
                key(Key::Tab),
                key(Key::Enter),
                lit("ls"),
                key(Key::Enter),
            ]
        );
    }

    #[test]
    fn escaped_backslash_flushes_run() {
        let out = decode("a\\\\b", TMUX);
        assert_eq!(
            out.events,
            vec![lit("a"), key(Key::Char('\\')), lit("b"), key(Key::Enter)]
        );
    }

    #[test]
    fn lone_backslash_is_literal() {
        let out = decode("a\\x", TMUX);
        assert_eq!(out.events, vec![lit("a\\x"), key(Key::Enter)]);
    }

    #[test]
    fn modified_enter() {
        let out = decode("❤️🧡", TMUX);
        assert_eq!(out.events, vec![ctrl(Key::Enter)]);
    }

    #[test]
    fn modifiers_accumulate_then_clear() {
        let out = decode("❤️💙xy", TMUX);
        assert_eq!(
            out.events,
            vec![
                KeystrokeEvent::key(
                    Key::Char('x'),
                    Modifiers {
                        ctrl: true,
                        alt: true,
                        cmd: false
                    }
                ),
                lit("y"),
                key(Key::Enter),
            ]
        );
    }

    #[test]
    fn modified_keystroke_after_text_still_terminated() {
        let out = decode("x❤️c", TMUX);
        assert_eq!(
            out.events,
            vec![lit("x"), ctrl(Key::Char('c')), key(Key::Enter)]
        );
    }

    #[test]
    fn green_heart_only_where_cmd_exists() {
        let cmd = Modifiers {
            cmd: true,
            ..Modifiers::NONE
        };
        assert_eq!(
            decode("💚v", MAC).events,
            vec![KeystrokeEvent::key(Key::Char('v'), cmd)]
        );
        assert_eq!(decode("💚v", TMUX).events, vec![lit("v"), key(Key::Enter)]);
    }

    #[test]
    fn single_unmodified_char_is_terminated() {
        assert_eq!(decode("q", TMUX).events, vec![lit("q"), key(Key::Enter)]);
    }

    #[test]
    fn empty_payload_emits_nothing() {
        assert!(decode("", TMUX).events.is_empty());
        let only_sentinel = decode("💜", TMUX);
        assert!(only_sentinel.events.is_empty());
        assert!(only_sentinel.suppress_enter);
    }

    #[test]
    fn modifier_only_payload_sends_lone_enter() {
        assert_eq!(decode("❤️", TMUX).events, vec![key(Key::Enter)]);
        assert_eq!(decode("❤💙", MAC).events, vec![key(Key::Enter)]);
        let suppressed = decode("❤️💜", TMUX);
        assert!(suppressed.events.is_empty());
        assert!(suppressed.suppress_enter);
    }

    #[test]
    fn modified_multibyte_char_stays_whole() {
        assert_eq!(decode("❤️é", TMUX).events, vec![ctrl(Key::Char('é'))]);
    }

    #[test]
    fn dangling_modifier_dropped_before_trailing_enter() {
        let out = decode("ab❤️", TMUX);
        assert_eq!(out.events, vec![lit("ab"), key(Key::Enter)]);
    }

    // ─── properties ──────────────────────────────────────────────────

    proptest! {
        #[test]
        fn sentinel_never_adds_enter_or_leaks(body in "[ -\\[\\]-~]{0,40}") {
            let payload = format!("{body}{PURPLE_HEART}");
            let out = decode(&payload, TMUX);
            prop_assert!(out.suppress_enter);
            prop_assert!(!out.events.iter().any(KeystrokeEvent::is_enter));
            for ev in &out.events {
                if let KeystrokeEvent::Literal(s) = ev {
                    prop_assert!(!s.contains(PURPLE_HEART));
                }
            }
        }

        #[test]
        fn plain_printable_is_one_run_plus_enter(body in "[a-zA-Z0-9 .,;:!?/_-]{1,60}") {
            let out = decode(&body, MAC);
            prop_assert_eq!(out.events, vec![lit(&body), key(Key::Enter)]);
        }

        #[test]
        fn decoding_is_deterministic(payload in "\\PC{0,30}") {
            prop_assert_eq!(decode(&payload, MAC), decode(&payload, MAC));
        }
    }
}
