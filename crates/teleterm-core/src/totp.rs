//! RFC 6238 time-based one-time passwords (HMAC-SHA1, 30 s step, 6 digits).

use std::fmt;

use hmac::{Hmac, Mac};
use sha1::Sha1;
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;

pub const SECRET_LEN: usize = 20;
pub const STEP_SECS: i64 = 30;
const DIGITS_MODULUS: u32 = 1_000_000;
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secure randomness unavailable: {0}")]
    Randomness(#[from] getrandom::Error),
}

/// Raw shared secret. `Debug` never prints key material.
#[derive(Clone, PartialEq, Eq)]
pub struct TotpSecret([u8; SECRET_LEN]);

impl fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TotpSecret(..)")
    }
}

impl TotpSecret {
    pub fn from_bytes(bytes: [u8; SECRET_LEN]) -> Self {
        Self(bytes)
    }

    /// Draw a fresh secret from the OS CSPRNG.
    pub fn generate() -> Result<Self, SecretError> {
        let mut bytes = [0u8; SECRET_LEN];
        getrandom::getrandom(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Parse the persisted hex form. Anything but exactly 20 bytes is rejected.
    pub fn from_hex(hex_str: &str) -> Option<Self> {
        let bytes = hex::decode(hex_str.trim()).ok()?;
        let bytes: [u8; SECRET_LEN] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn to_base32(&self) -> String {
        base32_encode(&self.0)
    }

    /// `otpauth://` URI understood by authenticator apps.
    pub fn provisioning_uri(&self, label: &str) -> String {
        format!(
            "otpauth://totp/{label}?secret={}&issuer={label}",
            self.to_base32()
        )
    }

    /// Six-digit code for the 30-second window containing `unix_secs`.
    pub fn code_at(&self, unix_secs: i64) -> Option<u32> {
        let step = unix_secs.div_euclid(STEP_SECS);
        hotp(&self.0, u64::try_from(step).ok()?)
    }

    /// Accept `code` if it matches the previous, current or next window.
    pub fn verify(&self, code: &str, unix_secs: i64) -> bool {
        let Ok(expected) = code.parse::<u32>() else {
            return false;
        };
        [-STEP_SECS, 0, STEP_SECS]
            .iter()
            .filter_map(|offset| self.code_at(unix_secs + offset))
            .any(|candidate| candidate == expected)
    }
}

/// RFC 4226 HOTP value truncated to six digits.
pub fn hotp(key: &[u8], counter: u64) -> Option<u32> {
    let mut mac = HmacSha1::new_from_slice(key).ok()?;
    mac.update(&counter.to_be_bytes());
    let hash = mac.finalize().into_bytes();
    let offset = usize::from(hash[hash.len() - 1] & 0x0f);
    let binary = u32::from_be_bytes([
        hash[offset] & 0x7f,
        hash[offset + 1],
        hash[offset + 2],
        hash[offset + 3],
    ]);
    Some(binary % DIGITS_MODULUS)
}

/// RFC 4648 base32 without padding.
pub fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
        buffer &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

/// Exactly six ASCII decimal digits.
pub fn looks_like_code(text: &str) -> bool {
    text.len() == 6 && text.bytes().all(|b| b.is_ascii_digit())
}
