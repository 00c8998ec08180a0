//! teleterm-core: terminal control protocol engine.
//! Data model, backend capability contract, keystroke codec, one-time-password
//! auth gate, session registry and output formatting. No IO beyond the
//! traits implemented by the backend and runtime crates.

pub mod auth;
pub mod backend;
pub mod codec;
pub mod output;
pub mod registry;
pub mod store;
pub mod totp;
pub mod types;

pub use auth::{AuthDecision, AuthError, AuthGate, OwnerCheck, SecurityMode, clamp_otp_timeout};
pub use backend::{BackendError, Liveness, TerminalBackend, resolve_liveness, trim_capture};
pub use codec::{DecodedInput, decode};
pub use output::{MAX_CHUNK_CHARS, MAX_TRACKED_MESSAGES, OutputMode, OutputOptions, TrackedMessages, format_chunks};
pub use registry::{RegistryError, SessionRegistry, format_menu};
pub use store::{KvStore, MemoryStore, StoreError};
pub use totp::{SecretError, TotpSecret};
pub use types::{ConnectionState, Key, KeyboardCaps, KeystrokeEvent, Modifiers, TerminalSession};
