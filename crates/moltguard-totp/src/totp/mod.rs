//! TOTP crate: sub-modules.

pub mod types;
pub mod config;
pub mod core;
pub mod keys;
pub mod crypto;
pub mod storage;
pub mod service;
pub mod commands;

// Re-export top-level items for convenience.
pub use types::*;
pub use config::{CorruptVaultPolicy, VaultConfig, VaultFormat};
pub use keys::{KeyMaterial, VaultKey};
pub use storage::Vault;
pub use service::TotpService;
pub use commands::*;
