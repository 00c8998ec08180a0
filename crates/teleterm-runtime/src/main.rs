//! teleterm: drive a local terminal session from a Telegram chat.
//! Single-process binary: TOTP setup, backend selection, long-poll loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::Mutex;

use teleterm_core::auth::{AuthGate, SecurityMode};
use teleterm_core::backend::TerminalBackend;
use teleterm_core::totp::TotpSecret;
use teleterm_tmux::{TmuxBackend, TmuxExecutor};

mod cli;
mod config;
mod dispatcher;
mod poll_loop;
mod store;
mod telegram;
mod transport;

use cli::BackendChoice;
use dispatcher::SessionManager;
use store::SqliteStore;
use telegram::TelegramClient;

const TOTP_LABEL: &str = "teleterm";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("TELETERM_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    if args.dangerously_attach_to_any_window {
        println!("DANGER MODE: All windows will be visible.");
    }
    let mode = if args.use_weak_security {
        println!("WARNING: OTP authentication disabled.");
        SecurityMode::Weak
    } else {
        SecurityMode::Strong
    };

    let mut store = SqliteStore::open(&args.dbfile)
        .with_context(|| format!("cannot open database {}", args.dbfile.display()))?;
    let auth = AuthGate::load(mode, &store)?;
    if let Some(secret) = auth
        .ensure_secret(&mut store)
        .context("TOTP secret setup failed")?
    {
        print_totp_setup(&secret);
    }

    let backend = build_backend(&args)?;
    let output = config::output_options_from_env();
    let client = TelegramClient::new(&args.token)?;
    let manager = SessionManager::new(
        backend,
        client.clone(),
        store,
        auth,
        output,
        Duration::from_millis(args.settle_ms),
    );
    let manager = Arc::new(Mutex::new(manager));

    tracing::info!(
        backend = ?args.backend.resolve(),
        visible_lines = output.visible_lines,
        mode = ?output.mode,
        "teleterm starting"
    );
    let poll_handle = tokio::spawn(poll_loop::run_poll_loop(client, manager));

    // Wait for shutdown signal (ctrl-c or SIGTERM)
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
                        _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cannot register SIGTERM handler");
                    ctrl_c.await.ok();
                    tracing::info!("received ctrl-c, shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            tracing::info!("received ctrl-c, shutting down");
        }
    };

    tokio::select! {
        () = shutdown => {}
        _ = poll_handle => {
            tracing::warn!("poll loop exited unexpectedly");
        }
    }

    tracing::info!("teleterm stopped");
    Ok(())
}

fn print_totp_setup(secret: &TotpSecret) {
    println!("\n=== TOTP Setup ===");
    println!("Add this account to an authenticator app:\n");
    println!("  {}", secret.provisioning_uri(TOTP_LABEL));
    println!("\nOr enter this secret manually: {}", secret.to_base32());
    println!("==================\n");
}

fn build_backend(args: &cli::Cli) -> anyhow::Result<Box<dyn TerminalBackend>> {
    match args.backend.resolve() {
        BackendChoice::Macos => build_macos_backend(args.dangerously_attach_to_any_window),
        BackendChoice::Tmux | BackendChoice::Auto => {
            if args.dangerously_attach_to_any_window {
                tracing::warn!("--dangerously-attach-to-any-window has no effect on the tmux backend");
            }
            let mut executor = TmuxExecutor::default();
            if let Some(socket) = &args.tmux_socket {
                executor = executor.with_socket_path(socket.clone());
            }
            Ok(Box::new(TmuxBackend::new(executor)))
        }
    }
}

#[cfg(target_os = "macos")]
fn build_macos_backend(attach_any: bool) -> anyhow::Result<Box<dyn TerminalBackend>> {
    use teleterm_macos::{AccessibilityBackend, MacWindowSystem};

    Ok(Box::new(
        AccessibilityBackend::new(MacWindowSystem::new()).attach_to_any_window(attach_any),
    ))
}

#[cfg(not(target_os = "macos"))]
fn build_macos_backend(_attach_any: bool) -> anyhow::Result<Box<dyn TerminalBackend>> {
    anyhow::bail!("the macos backend is only available on macOS")
}
