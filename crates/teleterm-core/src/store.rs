//! Persistent key-value contract used by the auth gate.

use std::collections::HashMap;

use thiserror::Error;

/// Decimal sender id of the owner.
pub const OWNER_KEY: &str = "owner_id";
/// Hex-encoded 20-byte TOTP secret.
pub const SECRET_KEY: &str = "totp_secret";
/// Decimal OTP timeout in seconds.
pub const OTP_TIMEOUT_KEY: &str = "otp_timeout";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Minimal string key-value store.
pub trait KvStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Volatile in-memory store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
