//! Vault configuration.
//!
//! Every path the crate touches is derived from an explicit [`VaultConfig`]
//! handed to the constructors, so tests can point a vault at a temporary
//! directory. An optional `config.json` in the directory overrides defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::totp::types::*;

/// Environment variable that overrides the default configuration directory.
pub const HOME_ENV: &str = "MOLTGUARD_HOME";
/// Directory name under `$HOME` used when no override is given.
pub const DEFAULT_DIR_NAME: &str = ".moltbot-security";
/// Optional JSON overrides inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

pub const DEFAULT_KEY_FILE: &str = ".vault_key";
pub const DEFAULT_VAULT_FILE: &str = "totp_vault.enc";
pub const DEFAULT_MACHINE_ID_PATH: &str = "/etc/machine-id";
/// PBKDF2 iteration count for the machine-bound key.
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

/// On-disk encoding used when the vault is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultFormat {
    /// AES-256-GCM, random nonce per save, format byte header.
    #[default]
    Aead,
    /// Repeating-key XOR + base64, for interoperability with old vaults.
    LegacyXor,
}

/// What `load` does when the vault cannot be decrypted or parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptVaultPolicy {
    /// Surface `VaultCorrupt` to the caller.
    #[default]
    Fail,
    /// Log a warning and behave as if the vault were empty. The next
    /// mutation overwrites the unreadable file.
    TreatAsEmpty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Directory holding the key, vault and lock files.
    #[serde(skip)]
    pub config_dir: PathBuf,
    pub key_file: String,
    pub vault_file: String,
    /// Source of the machine identity used to seed the key.
    pub machine_id_path: PathBuf,
    pub kdf_iterations: u32,
    pub format: VaultFormat,
    pub on_corrupt: CorruptVaultPolicy,
    pub digits: u8,
    pub period: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            key_file: DEFAULT_KEY_FILE.to_string(),
            vault_file: DEFAULT_VAULT_FILE.to_string(),
            machine_id_path: PathBuf::from(DEFAULT_MACHINE_ID_PATH),
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            format: VaultFormat::default(),
            on_corrupt: CorruptVaultPolicy::default(),
            digits: DEFAULT_DIGITS,
            period: DEFAULT_PERIOD,
        }
    }
}

impl VaultConfig {
    /// Defaults rooted at `dir`, without reading `config.json`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration for `dir`, applying `config.json` when present.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self, TotpError> {
        let dir = dir.into();
        let path = dir.join(CONFIG_FILE_NAME);
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|e| {
                TotpError::new(
                    TotpErrorKind::ConfigError,
                    format!("Cannot read {}", path.display()),
                )
                .with_detail(e.to_string())
            })?;
            log::debug!("loaded configuration overrides from {}", path.display());
            serde_json::from_str::<VaultConfig>(&raw).map_err(|e| {
                TotpError::new(
                    TotpErrorKind::ConfigError,
                    format!("Invalid {}", path.display()),
                )
                .with_detail(e.to_string())
            })?
        } else {
            VaultConfig::default()
        };
        config.config_dir = dir;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TotpError> {
        if self.key_file.is_empty() || self.vault_file.is_empty() {
            return Err(TotpError::new(
                TotpErrorKind::ConfigError,
                "key_file and vault_file must not be empty",
            ));
        }
        if self.kdf_iterations == 0 {
            return Err(TotpError::new(
                TotpErrorKind::ConfigError,
                "kdf_iterations must be at least 1",
            ));
        }
        if !(1..=10).contains(&self.digits) {
            return Err(TotpError::new(
                TotpErrorKind::ConfigError,
                format!("digits must be between 1 and 10, got {}", self.digits),
            ));
        }
        if self.period == 0 {
            return Err(TotpError::new(
                TotpErrorKind::ConfigError,
                "period must be at least 1 second",
            ));
        }
        Ok(())
    }

    pub fn key_path(&self) -> PathBuf {
        self.config_dir.join(&self.key_file)
    }

    pub fn vault_path(&self) -> PathBuf {
        self.config_dir.join(&self.vault_file)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.config_dir.join(format!("{}.lock", self.vault_file))
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

/// `$MOLTGUARD_HOME`, else `~/.moltbot-security`, else a relative fallback.
pub fn default_config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DIR_NAME))
}
