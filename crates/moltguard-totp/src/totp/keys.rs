//! Machine-bound key material.
//!
//! The vault key is PBKDF2-HMAC-SHA256 over the machine identity with a fixed
//! salt. It is derived once, written to an owner-only key file, and read back
//! verbatim afterwards, so an existing vault stays decryptable across restarts
//! even if the machine identity later changes.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::totp::config::VaultConfig;
use crate::totp::types::*;

/// Derived key length in bytes (256-bit).
pub const KEY_LEN: usize = 32;
/// Fixed PBKDF2 salt. Changing it orphans every vault whose key file is lost.
pub const KDF_SALT: &[u8] = b"moltbot-totp";
/// Seed used when the machine identity cannot be read.
pub const FALLBACK_MACHINE_ID: &str = "moltbot";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Key
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 32-byte symmetric vault key. Wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey([u8; KEY_LEN]);

impl VaultKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultKey(<redacted>)")
    }
}

/// PBKDF2-HMAC-SHA256(seed, [`KDF_SALT`], iterations) → 32 bytes.
pub fn derive_from_seed(seed: &str, iterations: u32) -> VaultKey {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(seed.as_bytes(), KDF_SALT, iterations, &mut key);
    let out = VaultKey(key);
    key.zeroize();
    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Key material
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Loads or derives the vault key and caches it for the life of the instance.
#[derive(Debug)]
pub struct KeyMaterial {
    key_path: PathBuf,
    machine_id_path: PathBuf,
    iterations: u32,
    cached: OnceLock<VaultKey>,
}

impl KeyMaterial {
    pub fn new(config: &VaultConfig) -> Self {
        Self {
            key_path: config.key_path(),
            machine_id_path: config.machine_id_path.clone(),
            iterations: config.kdf_iterations,
            cached: OnceLock::new(),
        }
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Return the vault key, reading the key file or deriving and persisting it.
    pub fn derive(&self) -> Result<&VaultKey, TotpError> {
        if let Some(key) = self.cached.get() {
            return Ok(key);
        }
        let key = self.load_or_create()?;
        Ok(self.cached.get_or_init(|| key))
    }

    fn load_or_create(&self) -> Result<VaultKey, TotpError> {
        match std::fs::read(&self.key_path) {
            Ok(mut bytes) => {
                let result = key_from_file_bytes(&bytes, &self.key_path);
                bytes.zeroize();
                if result.is_ok() {
                    log::debug!("loaded vault key from {}", self.key_path.display());
                }
                result
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let seed = self.machine_seed();
                let key = derive_from_seed(&seed, self.iterations);
                write_key_file(&self.key_path, &key)?;
                log::info!("derived new vault key at {}", self.key_path.display());
                Ok(key)
            }
            Err(e) => Err(TotpError::new(
                TotpErrorKind::KeyUnavailable,
                format!("Cannot read key file {}", self.key_path.display()),
            )
            .with_detail(e.to_string())),
        }
    }

    /// The machine identity used as PBKDF2 input, or the fixed fallback.
    pub fn machine_seed(&self) -> String {
        match std::fs::read_to_string(&self.machine_id_path) {
            Ok(raw) if !raw.trim().is_empty() => raw.trim().to_string(),
            _ => {
                log::debug!(
                    "machine id unavailable at {}, using fallback seed",
                    self.machine_id_path.display()
                );
                FALLBACK_MACHINE_ID.to_string()
            }
        }
    }
}

fn key_from_file_bytes(bytes: &[u8], path: &Path) -> Result<VaultKey, TotpError> {
    let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
        TotpError::new(
            TotpErrorKind::VaultCorrupt,
            format!("Key file {} has the wrong length", path.display()),
        )
        .with_detail(format!("expected {} bytes, found {}", KEY_LEN, bytes.len()))
    })?;
    Ok(VaultKey(arr))
}

/// Atomically replace `path` with the raw key bytes, owner read/write only.
fn write_key_file(path: &Path, key: &VaultKey) -> Result<(), TotpError> {
    let unavailable = |what: &str, e: std::io::Error| {
        TotpError::new(
            TotpErrorKind::KeyUnavailable,
            format!("Cannot {} key file {}", what, path.display()),
        )
        .with_detail(e.to_string())
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| unavailable("create directory for", e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| unavailable("stage", e))?;
    restrict_permissions(tmp.path()).map_err(|e| unavailable("restrict", e))?;
    tmp.write_all(key.as_bytes()).map_err(|e| unavailable("write", e))?;
    tmp.as_file().sync_all().map_err(|e| unavailable("sync", e))?;
    tmp.persist(path).map_err(|e| unavailable("replace", e.error))?;
    Ok(())
}

/// Set 0600 on Unix; a no-op elsewhere.
pub(crate) fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
