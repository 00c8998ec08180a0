//! TmuxCommandRunner trait and TmuxExecutor (sync subprocess wrapper).
//!
//! Arguments are handed to tmux as an argv vector, never through a shell,
//! so pane ids and keystroke text are passed through byte for byte.

use std::process::Command;

use crate::error::TmuxError;

/// Trait for executing tmux commands. Enables mock injection for testing.
pub trait TmuxCommandRunner: Send + Sync {
    /// Run `tmux <args>` and return stdout.
    fn run(&self, args: &[&str]) -> Result<String, TmuxError>;
}

impl<T: TmuxCommandRunner + ?Sized> TmuxCommandRunner for &T {
    fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        (**self).run(args)
    }
}

/// Which tmux server to talk to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServerSocket {
    #[default]
    Default,
    /// `-S <path>`
    Path(String),
    /// `-L <name>`
    Name(String),
}

/// Real tmux executor using `std::process::Command`.
#[derive(Debug, Clone)]
pub struct TmuxExecutor {
    program: String,
    socket: ServerSocket,
}

impl TmuxExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            socket: ServerSocket::Default,
        }
    }

    #[must_use]
    pub fn with_socket_path(mut self, path: impl Into<String>) -> Self {
        self.socket = ServerSocket::Path(path.into());
        self
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_socket_name(mut self, name: impl Into<String>) -> Self {
        self.socket = ServerSocket::Name(name.into());
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        match &self.socket {
            ServerSocket::Default => {}
            ServerSocket::Path(path) => {
                cmd.args(["-S", path]);
            }
            ServerSocket::Name(name) => {
                cmd.args(["-L", name]);
            }
        }
        cmd.args(args);
        cmd
    }
}

impl Default for TmuxExecutor {
    fn default() -> Self {
        Self::new("tmux")
    }
}

impl TmuxCommandRunner for TmuxExecutor {
    fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        let output = self.command(args).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TmuxError::CommandFailed {
                subcommand: args.first().copied().unwrap_or_default().to_string(),
                detail: match output.status.code() {
                    Some(code) => format!("exit code {code}: {}", stderr.trim()),
                    None => format!("terminated by signal: {}", stderr.trim()),
                },
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
