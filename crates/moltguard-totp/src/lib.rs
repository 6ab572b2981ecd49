//! # moltguard – TOTP Authenticator
//!
//! Time-based one-time password core with a machine-bound encrypted vault:
//!
//! - **RFC 4226 / 6238** – HMAC-SHA1 counter hashing, dynamic truncation, zero-padded codes
//! - **Key material** – PBKDF2-HMAC-SHA256 over the machine identity, cached in an owner-only key file
//! - **Encrypted vault** – AES-256-GCM by default, legacy repeating-key XOR vaults still readable
//! - **File safety** – atomic replace on every write, advisory lock around read-modify-write
//! - **Commands** – text-returning operations for the CLI and other collaborators

pub mod totp;
