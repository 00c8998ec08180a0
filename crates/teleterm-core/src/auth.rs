//! Owner lock and one-time-password gate with sliding expiration.
//!
//! `Unclaimed → Owned` is persisted through [`KvStore`]. Inside `Owned` the
//! volatile `{Unauthenticated, Authenticated}` sub-state is bypassed in weak
//! security mode.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::store::{KvStore, OTP_TIMEOUT_KEY, OWNER_KEY, SECRET_KEY, StoreError};
use crate::totp::{SecretError, TotpSecret, looks_like_code};

pub const MIN_OTP_TIMEOUT_SECS: u64 = 30;
pub const MAX_OTP_TIMEOUT_SECS: u64 = 28_800;
pub const DEFAULT_OTP_TIMEOUT_SECS: u64 = 300;

pub const REPLY_AUTHENTICATED: &str = "Authenticated.";
pub const REPLY_ENTER_OTP: &str = "Enter OTP code.";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Secret(#[from] SecretError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityMode {
    /// TOTP required.
    Strong,
    /// `--use-weak-security`: owner lock only.
    Weak,
}

/// Outcome of the owner lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerCheck {
    /// Sender just became the owner.
    Claimed,
    Owner,
    /// Not the owner; drop without reply.
    Stranger,
}

impl OwnerCheck {
    pub fn is_owner(self) -> bool {
        !matches!(self, Self::Stranger)
    }
}

/// What the dispatcher must do after the OTP check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// Authenticated; continue processing the request.
    Proceed,
    /// Unauthenticated callback: acknowledge it and stop.
    AcknowledgeCallback,
    /// Unauthenticated text: send this reply and stop.
    Reply(&'static str),
}

/// Clamp a requested timeout into the accepted range.
pub fn clamp_otp_timeout(requested: i64) -> u64 {
    let min = MIN_OTP_TIMEOUT_SECS as i64;
    let max = MAX_OTP_TIMEOUT_SECS as i64;
    requested.clamp(min, max) as u64
}

#[derive(Debug)]
pub struct AuthGate {
    mode: SecurityMode,
    otp_timeout_secs: u64,
    authenticated: bool,
    last_activity: Option<DateTime<Utc>>,
}

impl AuthGate {
    pub fn new(mode: SecurityMode) -> Self {
        Self {
            mode,
            otp_timeout_secs: DEFAULT_OTP_TIMEOUT_SECS,
            authenticated: false,
            last_activity: None,
        }
    }

    /// Build a gate, picking up a persisted timeout if present.
    pub fn load(mode: SecurityMode, store: &dyn KvStore) -> Result<Self, StoreError> {
        let mut gate = Self::new(mode);
        if let Some(raw) = store.get(OTP_TIMEOUT_KEY)? {
            match raw.trim().parse::<i64>() {
                Ok(secs) => gate.otp_timeout_secs = clamp_otp_timeout(secs),
                Err(_) => tracing::warn!(value = %raw, "ignoring unparsable stored otp_timeout"),
            }
        }
        Ok(gate)
    }

    pub fn mode(&self) -> SecurityMode {
        self.mode
    }

    pub fn otp_timeout_secs(&self) -> u64 {
        self.otp_timeout_secs
    }

    /// Generate and persist the secret on first run. Returns the new secret
    /// only when one was created, so the caller can display it once.
    pub fn ensure_secret(&self, store: &mut dyn KvStore) -> Result<Option<TotpSecret>, AuthError> {
        if self.mode == SecurityMode::Weak {
            return Ok(None);
        }
        if store.get(SECRET_KEY)?.is_some() {
            return Ok(None);
        }
        let secret = TotpSecret::generate()?;
        store.set(SECRET_KEY, &secret.to_hex())?;
        tracing::info!("generated new TOTP secret");
        Ok(Some(secret))
    }

    /// Resolve the owner, claiming it for `sender` if unclaimed.
    pub fn check_owner(
        &self,
        store: &mut dyn KvStore,
        sender: i64,
    ) -> Result<OwnerCheck, StoreError> {
        let owner = store
            .get(OWNER_KEY)?
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|&id| id != 0);
        match owner {
            Some(owner) if owner == sender => Ok(OwnerCheck::Owner),
            Some(_) => Ok(OwnerCheck::Stranger),
            None => {
                store.set(OWNER_KEY, &sender.to_string())?;
                tracing::info!(sender, "registered owner");
                Ok(OwnerCheck::Claimed)
            }
        }
    }

    /// Whether the sliding window is still open at `now`. Read-only.
    pub fn is_authenticated(&self, now: DateTime<Utc>) -> bool {
        if self.mode == SecurityMode::Weak {
            return true;
        }
        self.authenticated
            && self.last_activity.is_some_and(|last| {
                now.signed_duration_since(last).num_seconds() <= self.otp_timeout_secs as i64
            })
    }

    /// Run the OTP check for an owner request. Returns `Proceed` and slides
    /// the window forward when authenticated.
    pub fn check(
        &mut self,
        store: &dyn KvStore,
        is_callback: bool,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthDecision, StoreError> {
        if self.mode == SecurityMode::Weak {
            return Ok(AuthDecision::Proceed);
        }
        if self.is_authenticated(now) {
            self.last_activity = Some(now);
            return Ok(AuthDecision::Proceed);
        }

        if self.authenticated {
            tracing::info!("otp session expired");
        }
        self.authenticated = false;
        if is_callback {
            return Ok(AuthDecision::AcknowledgeCallback);
        }
        if looks_like_code(text) && self.verify_code(store, text, now)? {
            self.authenticated = true;
            self.last_activity = Some(now);
            tracing::info!("otp accepted");
            return Ok(AuthDecision::Reply(REPLY_AUTHENTICATED));
        }
        Ok(AuthDecision::Reply(REPLY_ENTER_OTP))
    }

    fn verify_code(
        &self,
        store: &dyn KvStore,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let Some(secret) = store
            .get(SECRET_KEY)?
            .as_deref()
            .and_then(TotpSecret::from_hex)
        else {
            tracing::warn!("no valid TOTP secret stored; rejecting code");
            return Ok(false);
        };
        Ok(secret.verify(code, now.timestamp()))
    }

    /// Clamp, persist and apply a new timeout. Returns the applied value.
    pub fn set_otp_timeout(
        &mut self,
        store: &mut dyn KvStore,
        requested: i64,
    ) -> Result<u64, StoreError> {
        let secs = clamp_otp_timeout(requested);
        store.set(OTP_TIMEOUT_KEY, &secs.to_string())?;
        self.otp_timeout_secs = secs;
        Ok(secs)
    }
}
