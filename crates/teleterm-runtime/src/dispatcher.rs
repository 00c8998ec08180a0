//! Command dispatcher: owner lock, OTP gate, dot-commands, keystroke
//! forwarding and the live terminal view.
//!
//! All session and auth state lives in [`SessionManager`]. The runtime keeps
//! it behind one `tokio::sync::Mutex`, so a request runs end to end (backend
//! calls and the settle delay included) before the next one starts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use teleterm_core::auth::{AuthDecision, AuthGate};
use teleterm_core::backend::{BackendError, TerminalBackend};
use teleterm_core::codec::decode;
use teleterm_core::output::{OutputOptions, format_chunks};
use teleterm_core::registry::{SessionRegistry, format_menu};
use teleterm_core::store::{KvStore, StoreError};
use teleterm_core::types::ConnectionState;

use crate::transport::{InboundRequest, RequestKind, Transport};

pub const REFRESH_TOKEN: &str = "refresh";
pub const REFRESH_LABEL: &str = "\u{1F504} Refresh";

pub const REPLY_INVALID_INDEX: &str = "Invalid window number.";
pub const REPLY_SESSION_CLOSED: &str = "Session closed.";
pub const REPLY_CAPTURE_FAILED: &str = "Could not read terminal text.";
pub const REPLY_BACKEND_UNAVAILABLE: &str = "Terminal backend unavailable.";
pub const REPLY_INJECT_FAILED: &str = "Could not send keystrokes.";

pub const HELP_TEXT: &str = "Commands:\n\
.list - Show terminal windows\n\
.1 .2 ... - Connect to window\n\
.help - This help\n\n\
Once connected, text is sent as keystrokes.\n\
Newline is auto-added; end with \u{1F49C} to suppress it.\n\n\
Modifiers (tap to copy, then paste + key):\n\
\u{2764}\u{FE0F} Ctrl  \u{1F499} Alt  \u{1F49A} Cmd  \u{1F49B} ESC  \u{1F9E1} Enter\n\n\
Escape sequences: \\n=Enter \\t=Tab \\\\=backslash\n\n\
.otptimeout <seconds> - Set OTP timeout (30-28800)";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    List,
    Help,
    OtpTimeout(i64),
    Connect(usize),
    /// Anything else: keystrokes for the connected session.
    Keys,
}

fn parse_command(text: &str) -> Command {
    if text.eq_ignore_ascii_case(".list") {
        return Command::List;
    }
    if text.eq_ignore_ascii_case(".help") {
        return Command::Help;
    }
    if let Some(prefix) = text.get(..11) {
        if prefix.eq_ignore_ascii_case(".otptimeout") {
            return Command::OtpTimeout(parse_leading_int(&text[11..]));
        }
    }
    if let Some(rest) = text.strip_prefix('.') {
        if rest.starts_with(|c: char| c.is_ascii_digit()) {
            let index = usize::try_from(parse_leading_int(rest)).unwrap_or(0);
            return Command::Connect(index);
        }
    }
    Command::Keys
}

/// Leading decimal integer after optional whitespace and sign; 0 when absent.
/// Saturates instead of overflowing.
fn parse_leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, b| {
            acc.saturating_mul(10).saturating_add(i64::from(b - b'0'))
        });
    if negative { -value } else { value }
}

fn connected_message(conn: &ConnectionState) -> String {
    if conn.title.is_empty() {
        format!("Connected to {}", conn.name)
    } else {
        format!("Connected to {} - {}", conn.name, conn.title)
    }
}

/// Owns every piece of per-process session state.
pub struct SessionManager<B, T, S> {
    backend: B,
    transport: T,
    store: S,
    auth: AuthGate,
    registry: SessionRegistry,
    output: OutputOptions,
    settle: Duration,
}

impl<B: TerminalBackend, T: Transport, S: KvStore> SessionManager<B, T, S> {
    pub fn new(
        backend: B,
        transport: T,
        store: S,
        auth: AuthGate,
        output: OutputOptions,
        settle: Duration,
    ) -> Self {
        Self {
            backend,
            transport,
            store,
            auth,
            registry: SessionRegistry::new(),
            output,
            settle,
        }
    }

    pub async fn handle(&mut self, req: InboundRequest) {
        let sender = req.sender;
        if let Err(e) = self.handle_at(req, Utc::now()).await {
            tracing::error!(sender, error = %e, "request failed");
        }
    }

    pub async fn handle_at(
        &mut self,
        req: InboundRequest,
        now: DateTime<Utc>,
    ) -> Result<(), DispatchError> {
        let owner = self.auth.check_owner(&mut self.store, req.sender)?;
        if !owner.is_owner() {
            tracing::info!(sender = req.sender, "ignoring request from non-owner");
            return Ok(());
        }

        let decision = self
            .auth
            .check(&self.store, req.is_callback(), req.text(), now)?;
        match decision {
            AuthDecision::Proceed => {}
            AuthDecision::AcknowledgeCallback => {
                if let RequestKind::Callback { id, .. } = &req.kind {
                    answer(&self.transport, id).await;
                }
                return Ok(());
            }
            AuthDecision::Reply(msg) => {
                reply(&self.transport, req.chat, msg).await;
                return Ok(());
            }
        }

        let chat = req.chat;
        match req.kind {
            RequestKind::Callback { id, data } => {
                answer(&self.transport, &id).await;
                if data == REFRESH_TOKEN && self.registry.is_connected() {
                    self.send_output(chat).await;
                }
            }
            RequestKind::Text(text) => self.handle_text(chat, &text).await?,
        }
        Ok(())
    }

    async fn handle_text(&mut self, chat: i64, text: &str) -> Result<(), DispatchError> {
        match parse_command(text) {
            Command::List => {
                self.registry.disconnect();
                self.send_menu(chat, None).await;
            }
            Command::Help => reply(&self.transport, chat, HELP_TEXT).await,
            Command::OtpTimeout(requested) => {
                let secs = self.auth.set_otp_timeout(&mut self.store, requested)?;
                tracing::info!(secs, "otp timeout updated");
                let msg = format!("OTP timeout set to {secs} seconds.");
                reply(&self.transport, chat, &msg).await;
            }
            Command::Connect(index) => self.connect(chat, index).await,
            Command::Keys => self.forward_keys(chat, text).await,
        }
        Ok(())
    }

    /// Refresh the listing and reply with the menu, optionally after a notice.
    async fn send_menu(&mut self, chat: i64, notice: Option<&str>) {
        let menu = match self.registry.refresh(&self.backend) {
            Ok(sessions) => format_menu(sessions),
            Err(e) => {
                tracing::warn!(error = %e, "session listing failed");
                REPLY_BACKEND_UNAVAILABLE.to_string()
            }
        };
        let msg = match notice {
            Some(notice) => format!("{notice}\n\n{menu}"),
            None => menu,
        };
        reply(&self.transport, chat, &msg).await;
    }

    async fn connect(&mut self, chat: i64, index: usize) {
        let listed = self.registry.refresh(&self.backend).map(|sessions| sessions.len());
        if let Err(e) = listed {
            tracing::warn!(error = %e, "session listing failed");
            reply(&self.transport, chat, REPLY_BACKEND_UNAVAILABLE).await;
            return;
        }
        let connected = self.registry.connect(index).map(connected_message);
        match connected {
            Ok(msg) => {
                reply(&self.transport, chat, &msg).await;
                self.send_output(chat).await;
            }
            Err(e) => {
                tracing::info!(error = %e, "connect rejected");
                reply(&self.transport, chat, REPLY_INVALID_INDEX).await;
            }
        }
    }

    async fn forward_keys(&mut self, chat: i64, text: &str) {
        if !self.registry.is_connected() {
            self.send_menu(chat, None).await;
            return;
        }
        if self.registry.verify_live(&self.backend).is_err() {
            self.send_menu(chat, Some(REPLY_SESSION_CLOSED)).await;
            return;
        }

        let decoded = decode(text, self.backend.keyboard());
        let injected = match self.registry.connection() {
            Some(conn) => self.backend.inject(conn, &decoded.events),
            None => Err(BackendError::NotConnected),
        };
        if let Err(e) = injected {
            tracing::warn!(error = %e, "keystroke injection failed");
            reply(&self.transport, chat, REPLY_INJECT_FAILED).await;
            return;
        }
        tracing::debug!(
            events = decoded.events.len(),
            suppress_enter = decoded.suppress_enter,
            "keystrokes injected"
        );

        // Keystrokes may switch tabs or panes, so re-resolve before capturing.
        tokio::time::sleep(self.settle).await;
        if self.registry.verify_live(&self.backend).is_err() {
            self.send_menu(chat, Some(REPLY_SESSION_CLOSED)).await;
            return;
        }
        self.send_output(chat).await;
    }

    /// Replace the live view with a fresh capture of the connected session.
    async fn send_output(&mut self, chat: i64) {
        let captured = match self.registry.connection() {
            Some(conn) => self.backend.capture(conn),
            None => return,
        };
        let text = match captured {
            Ok(Some(text)) => text,
            Ok(None) => {
                reply(&self.transport, chat, REPLY_CAPTURE_FAILED).await;
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "capture failed");
                reply(&self.transport, chat, REPLY_CAPTURE_FAILED).await;
                return;
            }
        };

        let stale = self.registry.tracked_mut().drain_newest_first();
        for message_id in stale {
            if let Err(e) = self.transport.delete_message(chat, message_id).await {
                tracing::debug!(message_id, error = %e, "could not delete old output");
            }
        }

        let chunks = format_chunks(&text, &self.output);
        let Some((last, leading)) = chunks.split_last() else {
            return;
        };
        for chunk in leading {
            match self.transport.send_html(chat, chunk).await {
                Ok(id) => {
                    self.registry.tracked_mut().push(id);
                }
                Err(e) => tracing::warn!(error = %e, "output send failed"),
            }
        }
        match self
            .transport
            .send_html_with_button(chat, last, REFRESH_LABEL, REFRESH_TOKEN)
            .await
        {
            Ok(id) => {
                self.registry.tracked_mut().push(id);
            }
            Err(e) => tracing::warn!(error = %e, "output send failed"),
        }
    }
}

async fn reply(transport: &impl Transport, chat: i64, text: &str) {
    if let Err(e) = transport.send_text(chat, text).await {
        tracing::warn!(chat, error = %e, "reply failed");
    }
}

async fn answer(transport: &impl Transport, callback_id: &str) {
    if let Err(e) = transport.answer_callback(callback_id).await {
        tracing::warn!(callback_id, error = %e, "callback answer failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};
    use teleterm_core::auth::{REPLY_AUTHENTICATED, REPLY_ENTER_OTP, SecurityMode};
    use teleterm_core::backend::Liveness;
    use teleterm_core::output::OutputMode;
    use teleterm_core::store::{MemoryStore, OTP_TIMEOUT_KEY, SECRET_KEY};
    use teleterm_core::totp::TotpSecret;
    use teleterm_core::types::{Key, KeyboardCaps, KeystrokeEvent, Modifiers, TerminalSession};

    const OWNER: i64 = 42;
    const CHAT: i64 = 4242;
    const RFC_KEY: [u8; 20] = *b"12345678901234567890";

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Sent {
        Text(String),
        Html(i64, String),
        Button(i64, String),
        Deleted(i64),
        Answered(String),
    }

    #[derive(Default)]
    struct TransportLog {
        sent: Vec<Sent>,
        next_id: i64,
    }

    #[derive(Clone, Default)]
    struct FakeTransport(Arc<Mutex<TransportLog>>);

    impl FakeTransport {
        fn take(&self) -> Vec<Sent> {
            std::mem::take(&mut self.0.lock().expect("lock").sent)
        }

        fn next_id(&self) -> i64 {
            let mut log = self.0.lock().expect("lock");
            log.next_id += 1;
            log.next_id + 100
        }

        fn record(&self, sent: Sent) {
            self.0.lock().expect("lock").sent.push(sent);
        }
    }

    impl Transport for FakeTransport {
        async fn send_text(&self, chat: i64, text: &str) -> Result<i64, TransportError> {
            assert_eq!(chat, CHAT);
            self.record(Sent::Text(text.to_string()));
            Ok(self.next_id())
        }

        async fn send_html(&self, _chat: i64, html: &str) -> Result<i64, TransportError> {
            let id = self.next_id();
            self.record(Sent::Html(id, html.to_string()));
            Ok(id)
        }

        async fn send_html_with_button(
            &self,
            _chat: i64,
            html: &str,
            label: &str,
            token: &str,
        ) -> Result<i64, TransportError> {
            assert_eq!(label, REFRESH_LABEL);
            assert_eq!(token, REFRESH_TOKEN);
            let id = self.next_id();
            self.record(Sent::Button(id, html.to_string()));
            Ok(id)
        }

        async fn delete_message(&self, _chat: i64, message_id: i64) -> Result<(), TransportError> {
            self.record(Sent::Deleted(message_id));
            Ok(())
        }

        async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
            self.record(Sent::Answered(callback_id.to_string()));
            Ok(())
        }
    }

    struct Terminal {
        sessions: Vec<TerminalSession>,
        liveness: Liveness,
        screen: Option<String>,
        injected: Vec<Vec<KeystrokeEvent>>,
        fail_inject: bool,
        vanish_on_inject: bool,
    }

    #[derive(Clone)]
    struct FakeBackend(Arc<Mutex<Terminal>>);

    impl FakeBackend {
        fn two_panes() -> Self {
            Self(Arc::new(Mutex::new(Terminal {
                sessions: vec![
                    TerminalSession::new("%0", 100, "main:0.0", "zsh"),
                    TerminalSession::new("%1", 101, "main:0.1", ""),
                ],
                liveness: Liveness::Live,
                screen: Some("$ ls\nCargo.toml\n".to_string()),
                injected: Vec::new(),
                fail_inject: false,
                vanish_on_inject: false,
            })))
        }

        fn with<R>(&self, f: impl FnOnce(&mut Terminal) -> R) -> R {
            f(&mut self.0.lock().expect("lock"))
        }
    }

    impl TerminalBackend for FakeBackend {
        fn list(&self) -> Result<Vec<TerminalSession>, BackendError> {
            Ok(self.with(|t| t.sessions.clone()))
        }

        fn probe(&self, _id: &str, _pid: u32) -> Result<Liveness, BackendError> {
            Ok(self.with(|t| t.liveness.clone()))
        }

        fn capture(&self, _conn: &ConnectionState) -> Result<Option<String>, BackendError> {
            Ok(self.with(|t| t.screen.clone()))
        }

        fn inject(
            &self,
            _conn: &ConnectionState,
            events: &[KeystrokeEvent],
        ) -> Result<(), BackendError> {
            self.with(|t| {
                if t.fail_inject {
                    return Err(BackendError::InjectFailed("target gone".to_string()));
                }
                t.injected.push(events.to_vec());
                if t.vanish_on_inject {
                    t.liveness = Liveness::Gone;
                }
                Ok(())
            })
        }

        fn keyboard(&self) -> KeyboardCaps {
            KeyboardCaps { cmd: false }
        }
    }

    type Manager = SessionManager<FakeBackend, FakeTransport, MemoryStore>;

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).single().expect("valid timestamp")
    }

    fn manager(mode: SecurityMode) -> (Manager, FakeBackend, FakeTransport) {
        let backend = FakeBackend::two_panes();
        let transport = FakeTransport::default();
        let mut store = MemoryStore::new();
        store
            .set(SECRET_KEY, &TotpSecret::from_bytes(RFC_KEY).to_hex())
            .expect("set");
        let manager = SessionManager::new(
            backend.clone(),
            transport.clone(),
            store,
            AuthGate::new(mode),
            OutputOptions::default(),
            Duration::ZERO,
        );
        (manager, backend, transport)
    }

    fn text(sender: i64, body: &str) -> InboundRequest {
        InboundRequest {
            sender,
            chat: CHAT,
            kind: RequestKind::Text(body.to_string()),
        }
    }

    fn press(data: &str) -> InboundRequest {
        InboundRequest {
            sender: OWNER,
            chat: CHAT,
            kind: RequestKind::Callback {
                id: "cb1".to_string(),
                data: data.to_string(),
            },
        }
    }

    async fn send(manager: &mut Manager, body: &str) {
        manager.handle_at(text(OWNER, body), t0()).await.expect("handle");
    }

    const MENU: &str = "Terminal windows:\n.1 main:0.0 - zsh\n.2 main:0.1\n";

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command(".list"), Command::List);
        assert_eq!(parse_command(".LIST"), Command::List);
        assert_eq!(parse_command(".list now"), Command::Keys);
        assert_eq!(parse_command(".Help"), Command::Help);
        assert_eq!(parse_command(".otptimeout 120"), Command::OtpTimeout(120));
        assert_eq!(parse_command(".OTPTIMEOUT   45s"), Command::OtpTimeout(45));
        assert_eq!(parse_command(".otptimeout"), Command::OtpTimeout(0));
        assert_eq!(parse_command(".otptimeout -7"), Command::OtpTimeout(-7));
        assert_eq!(parse_command(".3"), Command::Connect(3));
        assert_eq!(parse_command(".12abc"), Command::Connect(12));
        assert_eq!(parse_command(".x"), Command::Keys);
        assert_eq!(parse_command("ls -la"), Command::Keys);
        assert_eq!(parse_command("."), Command::Keys);
    }

    #[test]
    fn leading_int_saturates() {
        assert_eq!(parse_leading_int("99999999999999999999999"), i64::MAX);
        assert_eq!(parse_leading_int("  +8"), 8);
        assert_eq!(parse_leading_int("abc"), 0);
    }

    #[tokio::test]
    async fn first_sender_owns_and_strangers_are_ignored() {
        let (mut mgr, _backend, transport) = manager(SecurityMode::Weak);
        send(&mut mgr, ".list").await;
        assert_eq!(transport.take(), vec![Sent::Text(MENU.to_string())]);

        mgr.handle_at(text(7, ".list"), t0()).await.expect("handle");
        mgr.handle_at(
            InboundRequest {
                sender: 7,
                ..press(REFRESH_TOKEN)
            },
            t0(),
        )
        .await
        .expect("handle");
        assert!(transport.take().is_empty());
    }

    #[tokio::test]
    async fn strong_mode_requires_code() {
        let (mut mgr, _backend, transport) = manager(SecurityMode::Strong);
        send(&mut mgr, ".list").await;
        send(&mut mgr, "123").await;
        assert_eq!(
            transport.take(),
            vec![
                Sent::Text(REPLY_ENTER_OTP.to_string()),
                Sent::Text(REPLY_ENTER_OTP.to_string()),
            ]
        );

        mgr.handle_at(press(REFRESH_TOKEN), t0()).await.expect("handle");
        assert_eq!(transport.take(), vec![Sent::Answered("cb1".to_string())]);

        let code = TotpSecret::from_bytes(RFC_KEY)
            .code_at(t0().timestamp())
            .expect("code");
        send(&mut mgr, &format!("{code:06}")).await;
        send(&mut mgr, ".list").await;
        assert_eq!(
            transport.take(),
            vec![
                Sent::Text(REPLY_AUTHENTICATED.to_string()),
                Sent::Text(MENU.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn connect_then_output_with_refresh_button() {
        let (mut mgr, _backend, transport) = manager(SecurityMode::Weak);
        send(&mut mgr, ".1").await;
        let sent = transport.take();
        assert_eq!(sent[0], Sent::Text("Connected to main:0.0 - zsh".to_string()));
        let Sent::Button(id, html) = &sent[1] else {
            panic!("expected output with button, got {:?}", sent[1]);
        };
        assert_eq!(html, "<pre>$ ls\nCargo.toml\n</pre>");
        assert_eq!(mgr.registry.tracked().ids(), &[*id]);

        send(&mut mgr, ".2").await;
        let sent = transport.take();
        assert_eq!(sent[0], Sent::Text("Connected to main:0.1".to_string()));
        assert_eq!(mgr.registry.connection().map(|c| c.id.as_str()), Some("%1"));
    }

    #[tokio::test]
    async fn invalid_index_keeps_connection() {
        let (mut mgr, _backend, transport) = manager(SecurityMode::Weak);
        send(&mut mgr, ".2").await;
        let tracked_before = mgr.registry.tracked().ids().to_vec();
        transport.take();

        send(&mut mgr, ".9").await;
        assert_eq!(transport.take(), vec![Sent::Text(REPLY_INVALID_INDEX.to_string())]);
        assert_eq!(mgr.registry.connection().map(|c| c.id.as_str()), Some("%1"));
        assert_eq!(mgr.registry.tracked().ids(), tracked_before.as_slice());

        send(&mut mgr, ".list").await;
        send(&mut mgr, ".3").await;
        assert_eq!(
            transport.take(),
            vec![
                Sent::Text(MENU.to_string()),
                Sent::Text(REPLY_INVALID_INDEX.to_string()),
            ]
        );
        assert!(!mgr.registry.is_connected());
    }

    #[tokio::test]
    async fn text_without_connection_shows_menu() {
        let (mut mgr, backend, transport) = manager(SecurityMode::Weak);
        send(&mut mgr, "ls").await;
        assert_eq!(transport.take(), vec![Sent::Text(MENU.to_string())]);
        assert!(backend.with(|t| t.injected.is_empty()));
    }

    #[tokio::test]
    async fn keystrokes_are_injected_and_view_replaced() {
        let (mut mgr, backend, transport) = manager(SecurityMode::Weak);
        send(&mut mgr, ".1").await;
        let first_view = mgr.registry.tracked().ids().to_vec();
        transport.take();

        backend.with(|t| t.screen = Some("$ ls\nCargo.toml\n$ pwd\n/home\n".to_string()));
        send(&mut mgr, "pwd").await;

        assert_eq!(
            backend.with(|t| t.injected.clone()),
            vec![vec![
                KeystrokeEvent::Literal("pwd".to_string()),
                KeystrokeEvent::key(Key::Enter, Modifiers::NONE),
            ]]
        );
        let sent = transport.take();
        assert_eq!(sent[0], Sent::Deleted(first_view[0]));
        assert!(matches!(&sent[1], Sent::Button(_, html) if html.contains("/home")));
        assert_eq!(sent.len(), 2);
    }

    #[tokio::test]
    async fn ctrl_c_has_no_trailing_enter() {
        let (mut mgr, backend, _transport) = manager(SecurityMode::Weak);
        send(&mut mgr, ".1").await;
        send(&mut mgr, "\u{2764}\u{FE0F}c").await;
        assert_eq!(
            backend.with(|t| t.injected.clone()),
            vec![vec![KeystrokeEvent::key(Key::Char('c'), Modifiers::CTRL)]]
        );
    }

    #[tokio::test]
    async fn gone_session_disconnects_with_menu() {
        let (mut mgr, backend, transport) = manager(SecurityMode::Weak);
        send(&mut mgr, ".1").await;
        transport.take();

        backend.with(|t| t.liveness = Liveness::Gone);
        send(&mut mgr, "ls").await;
        assert_eq!(
            transport.take(),
            vec![Sent::Text(format!("{REPLY_SESSION_CLOSED}\n\n{MENU}"))]
        );
        assert!(!mgr.registry.is_connected());
        assert!(mgr.registry.tracked().is_empty());
        assert!(backend.with(|t| t.injected.is_empty()));
    }

    #[tokio::test]
    async fn session_closed_by_keystrokes_skips_capture() {
        let (mut mgr, backend, transport) = manager(SecurityMode::Weak);
        send(&mut mgr, ".1").await;
        transport.take();

        backend.with(|t| t.vanish_on_inject = true);
        send(&mut mgr, "exit").await;
        assert_eq!(
            backend.with(|t| t.injected.clone()),
            vec![vec![
                KeystrokeEvent::Literal("exit".to_string()),
                KeystrokeEvent::key(Key::Enter, Modifiers::NONE),
            ]]
        );
        assert_eq!(
            transport.take(),
            vec![Sent::Text(format!("{REPLY_SESSION_CLOSED}\n\n{MENU}"))]
        );
        assert!(!mgr.registry.is_connected());
        assert!(mgr.registry.tracked().is_empty());
    }

    #[tokio::test]
    async fn drift_is_adopted_before_output() {
        let (mut mgr, backend, _transport) = manager(SecurityMode::Weak);
        send(&mut mgr, ".1").await;
        backend.with(|t| t.liveness = Liveness::Drifted("%5".to_string()));
        send(&mut mgr, "ls").await;
        assert_eq!(mgr.registry.connection().map(|c| c.id.as_str()), Some("%5"));
        assert_eq!(mgr.registry.connection().map(|c| c.pid), Some(100));
    }

    #[tokio::test]
    async fn inject_failure_is_reported() {
        let (mut mgr, backend, transport) = manager(SecurityMode::Weak);
        send(&mut mgr, ".1").await;
        transport.take();
        backend.with(|t| t.fail_inject = true);
        send(&mut mgr, "ls").await;
        assert_eq!(transport.take(), vec![Sent::Text(REPLY_INJECT_FAILED.to_string())]);
        assert!(mgr.registry.is_connected());
    }

    #[tokio::test]
    async fn refresh_button_resends_view() {
        let (mut mgr, _backend, transport) = manager(SecurityMode::Weak);
        mgr.handle_at(press(REFRESH_TOKEN), t0()).await.expect("handle");
        assert_eq!(transport.take(), vec![Sent::Answered("cb1".to_string())]);

        send(&mut mgr, ".1").await;
        let old = mgr.registry.tracked().ids().to_vec();
        transport.take();

        mgr.handle_at(press(REFRESH_TOKEN), t0()).await.expect("handle");
        let sent = transport.take();
        assert_eq!(sent[0], Sent::Answered("cb1".to_string()));
        assert_eq!(sent[1], Sent::Deleted(old[0]));
        let Sent::Button(_, first_html) = &sent[2] else {
            panic!("expected output, got {:?}", sent[2]);
        };

        // Identical capture yields identical content, with fresh ids.
        let second_old = mgr.registry.tracked().ids().to_vec();
        mgr.handle_at(press(REFRESH_TOKEN), t0()).await.expect("handle");
        let sent = transport.take();
        assert_eq!(sent[1], Sent::Deleted(second_old[0]));
        assert!(matches!(&sent[2], Sent::Button(_, html) if html == first_html));

        mgr.handle_at(press("other"), t0()).await.expect("handle");
        assert_eq!(transport.take(), vec![Sent::Answered("cb1".to_string())]);
    }

    #[tokio::test]
    async fn blank_capture_reports_failure() {
        let (mut mgr, backend, transport) = manager(SecurityMode::Weak);
        backend.with(|t| t.screen = None);
        send(&mut mgr, ".1").await;
        assert_eq!(
            transport.take(),
            vec![
                Sent::Text("Connected to main:0.0 - zsh".to_string()),
                Sent::Text(REPLY_CAPTURE_FAILED.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn split_output_tracks_every_chunk() {
        let (mut mgr, backend, transport) = manager(SecurityMode::Weak);
        mgr.output = OutputOptions {
            visible_lines: 1000,
            mode: OutputMode::Split,
        };
        let screen: String = (0..150).map(|i| format!("{i:04} {}\n", "#".repeat(60))).collect();
        backend.with(|t| t.screen = Some(screen));

        send(&mut mgr, ".1").await;
        let sent = transport.take();
        let outputs: Vec<&Sent> = sent.iter().skip(1).collect();
        assert!(outputs.len() > 1);
        for leading in &outputs[..outputs.len() - 1] {
            assert!(matches!(leading, Sent::Html(..)));
        }
        assert!(matches!(outputs.last(), Some(Sent::Button(..))));
        assert_eq!(mgr.registry.tracked().len(), outputs.len());
    }

    #[tokio::test]
    async fn otp_timeout_is_clamped_and_persisted() {
        let (mut mgr, _backend, transport) = manager(SecurityMode::Weak);
        send(&mut mgr, ".otptimeout 5").await;
        send(&mut mgr, ".OTPTIMEOUT 99999").await;
        send(&mut mgr, ".otptimeout 120").await;
        assert_eq!(
            transport.take(),
            vec![
                Sent::Text("OTP timeout set to 30 seconds.".to_string()),
                Sent::Text("OTP timeout set to 28800 seconds.".to_string()),
                Sent::Text("OTP timeout set to 120 seconds.".to_string()),
            ]
        );
        assert_eq!(mgr.store.get(OTP_TIMEOUT_KEY).expect("get").as_deref(), Some("120"));
        assert_eq!(mgr.auth.otp_timeout_secs(), 120);
    }

    #[tokio::test]
    async fn help_lists_commands() {
        let (mut mgr, _backend, transport) = manager(SecurityMode::Weak);
        send(&mut mgr, ".help").await;
        let sent = transport.take();
        assert_eq!(sent, vec![Sent::Text(HELP_TEXT.to_string())]);
        assert!(HELP_TEXT.contains(".otptimeout"));
        assert!(HELP_TEXT.contains(".list"));
    }
}
