//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "teleterm", about = "Drive a local terminal session from a Telegram chat")]
pub struct Cli {
    /// List every on-screen window, not only known terminal apps (macos backend)
    #[arg(long)]
    pub dangerously_attach_to_any_window: bool,

    /// Disable one-time-password authentication (owner lock only)
    #[arg(long)]
    pub use_weak_security: bool,

    /// SQLite file holding the owner id, TOTP secret and OTP timeout
    #[arg(long, default_value = "./teleterm.sqlite")]
    pub dbfile: PathBuf,

    /// Telegram bot token
    #[arg(long, env = "TELETERM_BOT_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Terminal backend
    #[arg(long, value_enum, default_value_t = BackendChoice::Auto)]
    pub backend: BackendChoice,

    /// tmux socket path (tmux backend)
    #[arg(long)]
    pub tmux_socket: Option<String>,

    /// Delay after injecting keystrokes before capturing, in milliseconds
    #[arg(long, default_value = "2000")]
    pub settle_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendChoice {
    /// macos on macOS, tmux elsewhere
    Auto,
    Tmux,
    Macos,
}

impl BackendChoice {
    pub fn resolve(self) -> BackendChoice {
        match self {
            Self::Auto if cfg!(target_os = "macos") => Self::Macos,
            Self::Auto => Self::Tmux,
            other => other,
        }
    }
}
