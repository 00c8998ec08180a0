//! Telegram long-poll loop. Each update is handled on its own task, which
//! waits for the session-manager lock before doing anything.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use teleterm_core::backend::TerminalBackend;
use teleterm_core::store::KvStore;

use crate::dispatcher::SessionManager;
use crate::telegram::{TelegramClient, Update};

const RETRY_DELAY: Duration = Duration::from_secs(5);

pub type SharedManager<B, S> = Arc<Mutex<SessionManager<B, TelegramClient, S>>>;

pub async fn run_poll_loop<B, S>(client: TelegramClient, manager: SharedManager<B, S>)
where
    B: TerminalBackend + 'static,
    S: KvStore + 'static,
{
    let mut offset = 0;
    loop {
        let updates = match client.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!(error = %e, "getUpdates failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };
        offset = next_offset(offset, &updates);
        for update in updates {
            let update_id = update.update_id;
            let Some(req) = update.into_request() else {
                tracing::debug!(update_id, "skipping update without text or callback");
                continue;
            };
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                manager.lock().await.handle(req).await;
            });
        }
    }
}

/// Acknowledge everything up to the highest update id seen.
fn next_offset(current: i64, updates: &[Update]) -> i64 {
    updates
        .iter()
        .map(|u| u.update_id + 1)
        .fold(current, i64::max)
}
