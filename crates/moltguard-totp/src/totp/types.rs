//! Core types for the TOTP authenticator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Defaults
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Default number of digits in a generated code.
pub const DEFAULT_DIGITS: u8 = 6;
/// Default TOTP time step in seconds.
pub const DEFAULT_PERIOD: u32 = 30;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Secret entry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single service secret held in the vault.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretEntry {
    /// Lower-cased service name, unique within a vault.
    pub service_name: String,
    /// Base-32 secret, spaces stripped and upper-cased.
    pub secret: String,
    /// When the secret was (last) added.
    pub added_at: DateTime<Utc>,
}

impl SecretEntry {
    /// Build an entry from raw user input, normalising both fields.
    pub fn new(service_name: &str, secret: &str) -> Self {
        Self {
            service_name: normalise_service_name(service_name),
            secret: normalise_secret(secret),
            added_at: Utc::now(),
        }
    }
}

impl fmt::Debug for SecretEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretEntry")
            .field("service_name", &self.service_name)
            .field("secret", &"<redacted>")
            .field("added_at", &self.added_at)
            .finish()
    }
}

/// Service names are case-insensitive identities, stored lower-cased.
/// Whitespace is significant, as in vaults written by earlier releases.
pub fn normalise_service_name(name: &str) -> String {
    name.to_lowercase()
}

/// Strip spaces and upper-case a base-32 secret.
pub fn normalise_secret(secret: &str) -> String {
    secret.replace(' ', "").to_uppercase()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Generated code result
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A generated TOTP code and how long it stays valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotpResult {
    /// Zero-padded decimal code (e.g. "012345").
    pub code: String,
    /// Seconds until the code expires, always in `[1, period]`.
    pub remaining_seconds: u32,
}

impl fmt::Display for TotpResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (expires in {}s)", self.code, self.remaining_seconds)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Error type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Error kind for this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TotpErrorKind {
    /// A provided or stored secret is not valid base-32.
    InvalidSecret,
    /// The requested service is not in the vault.
    NotFound,
    /// The vault key could not be read, derived or persisted.
    KeyUnavailable,
    /// The vault or key file exists but cannot be decrypted or parsed.
    VaultCorrupt,
    InvalidInput,
    EncryptionFailed,
    StorageError,
    ConfigError,
}

/// Crate-level error.
#[derive(Debug, Clone, thiserror::Error)]
#[error("[{kind:?}] {message}{}", .detail.as_ref().map(|d| format!(" ({})", d)).unwrap_or_default())]
pub struct TotpError {
    pub kind: TotpErrorKind,
    pub message: String,
    pub detail: Option<String>,
}

impl TotpError {
    pub fn new(kind: TotpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is(&self, kind: TotpErrorKind) -> bool {
        self.kind == kind
    }
}

impl From<TotpError> for String {
    fn from(e: TotpError) -> String {
        e.to_string()
    }
}
