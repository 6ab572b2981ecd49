//! Encrypted on-disk vault of service name → TOTP secret.
//!
//! Every operation re-reads the backing file: `load` under a shared advisory
//! lock, `add`/`remove` under an exclusive lock held across the whole
//! read-modify-write. Writes go through a temp file in the same directory and
//! an atomic rename, so readers never observe a torn blob.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Deserializer, Serialize};

use crate::totp::config::{CorruptVaultPolicy, VaultConfig, VaultFormat};
use crate::totp::core;
use crate::totp::crypto;
use crate::totp::keys::{restrict_permissions, KeyMaterial, VaultKey};
use crate::totp::types::*;

/// Decrypted vault contents keyed by lower-cased service name.
pub type SecretMap = BTreeMap<String, SecretEntry>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Serialized document
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Plaintext layout: `{"secrets": {"<name>": {"secret": .., "added": ..}}}`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct VaultDocument {
    #[serde(default)]
    secrets: BTreeMap<String, StoredSecret>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSecret {
    secret: String,
    #[serde(deserialize_with = "deserialize_added")]
    added: DateTime<Utc>,
}

/// Accept RFC 3339 and the naive `isoformat()` timestamps of older vaults.
fn deserialize_added<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

impl VaultDocument {
    fn into_map(self) -> SecretMap {
        self.secrets
            .into_iter()
            .map(|(name, stored)| {
                let entry = SecretEntry {
                    service_name: name.clone(),
                    secret: stored.secret,
                    added_at: stored.added,
                };
                (name, entry)
            })
            .collect()
    }

    fn from_map(map: &SecretMap) -> Self {
        let secrets = map
            .iter()
            .map(|(name, entry)| {
                let stored = StoredSecret {
                    secret: entry.secret.clone(),
                    added: entry.added_at,
                };
                (name.clone(), stored)
            })
            .collect();
        Self { secrets }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Vault
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
pub struct Vault {
    config: VaultConfig,
    keys: KeyMaterial,
}

impl Vault {
    pub fn new(config: VaultConfig) -> Self {
        let keys = KeyMaterial::new(&config);
        Self { config, keys }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn keys(&self) -> &KeyMaterial {
        &self.keys
    }

    pub fn path(&self) -> PathBuf {
        self.config.vault_path()
    }

    // ── Load / save ──────────────────────────────────────────────

    /// Read and decrypt the whole vault. A missing file is an empty vault.
    pub fn load(&self) -> Result<SecretMap, TotpError> {
        let _lock = self.lock(LockMode::Shared)?;
        self.load_unlocked()
    }

    /// Encrypt and atomically replace the vault with `map`.
    pub fn save(&self, map: &SecretMap) -> Result<(), TotpError> {
        let _lock = self.lock(LockMode::Exclusive)?;
        self.save_unlocked(map)
    }

    fn load_unlocked(&self) -> Result<SecretMap, TotpError> {
        let path = self.path();
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("no vault at {}, starting empty", path.display());
                return Ok(SecretMap::new());
            }
            Err(e) => {
                return Err(storage_error(format!("Cannot read vault {}", path.display()), e))
            }
        };
        let key = self.keys.derive()?;
        match decode_document(key, &bytes) {
            Ok(map) => Ok(map),
            Err(err) if self.config.on_corrupt == CorruptVaultPolicy::TreatAsEmpty => {
                log::warn!(
                    "vault {} is unreadable ({}); treating it as empty",
                    path.display(),
                    err
                );
                Ok(SecretMap::new())
            }
            Err(err) => Err(err),
        }
    }

    fn save_unlocked(&self, map: &SecretMap) -> Result<(), TotpError> {
        let key = self.keys.derive()?;
        let plaintext = serde_json::to_vec(&VaultDocument::from_map(map)).map_err(|e| {
            TotpError::new(TotpErrorKind::StorageError, format!("JSON serialise: {}", e))
        })?;
        let blob = crypto::cipher_for(self.config.format).encrypt(key, &plaintext)?;
        write_atomic(&self.path(), &blob)?;
        log::debug!(
            "saved {} entr{} to {} ({:?})",
            map.len(),
            if map.len() == 1 { "y" } else { "ies" },
            self.path().display(),
            self.config.format
        );
        Ok(())
    }

    /// Run `f` over the current map under the exclusive lock and persist the result.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut SecretMap) -> Result<T, TotpError>,
    ) -> Result<T, TotpError> {
        let _lock = self.lock(LockMode::Exclusive)?;
        let mut map = self.load_unlocked()?;
        let out = f(&mut map)?;
        self.save_unlocked(&map)?;
        Ok(out)
    }

    // ── Entry operations ─────────────────────────────────────────

    /// Add or overwrite the secret for `service_name`.
    pub fn add(&self, service_name: &str, secret: &str) -> Result<SecretEntry, TotpError> {
        let entry = SecretEntry::new(service_name, secret);
        if entry.service_name.trim().is_empty() {
            return Err(TotpError::new(
                TotpErrorKind::InvalidInput,
                "Service name must not be empty",
            ));
        }
        core::decode_secret(&entry.secret)?;
        self.mutate(|map| {
            let replaced = map.insert(entry.service_name.clone(), entry.clone()).is_some();
            log::info!(
                "{} secret for '{}'",
                if replaced { "replaced" } else { "added" },
                entry.service_name
            );
            Ok(entry.clone())
        })
    }

    /// Remove `service_name`. Missing entries leave the file untouched.
    pub fn remove(&self, service_name: &str) -> Result<SecretEntry, TotpError> {
        let name = normalise_service_name(service_name);
        let _lock = self.lock(LockMode::Exclusive)?;
        let mut map = self.load_unlocked()?;
        let removed = map.remove(&name).ok_or_else(|| {
            TotpError::new(
                TotpErrorKind::NotFound,
                format!("{} not found in vault", service_name),
            )
        })?;
        self.save_unlocked(&map)?;
        log::info!("removed secret for '{}'", name);
        Ok(removed)
    }

    /// All service names, sorted.
    pub fn list(&self) -> Result<Vec<String>, TotpError> {
        Ok(self.load()?.into_keys().collect())
    }

    /// Case-insensitive lookup.
    pub fn get(&self, service_name: &str) -> Result<Option<SecretEntry>, TotpError> {
        let name = normalise_service_name(service_name);
        Ok(self.load()?.remove(&name))
    }

    /// Move the current vault file aside so a fresh one can be created.
    ///
    /// Returns the backup path, or `None` when there was no vault.
    pub fn reset(&self) -> Result<Option<PathBuf>, TotpError> {
        let _lock = self.lock(LockMode::Exclusive)?;
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let stamp = Utc::now().format("%Y%m%dT%H%M%S").to_string();
        let mut backup = path.with_file_name(format!("{}.corrupt-{}", self.config.vault_file, stamp));
        let mut n = 1;
        while backup.exists() {
            backup = path.with_file_name(format!(
                "{}.corrupt-{}-{}",
                self.config.vault_file, stamp, n
            ));
            n += 1;
        }
        std::fs::rename(&path, &backup).map_err(|e| {
            storage_error(format!("Cannot move vault aside to {}", backup.display()), e)
        })?;
        log::warn!("vault reset; previous contents kept at {}", backup.display());
        Ok(Some(backup))
    }

    // ── Locking ──────────────────────────────────────────────────

    fn lock(&self, mode: LockMode) -> Result<VaultLock, TotpError> {
        let path = self.config.lock_path();
        let file = match self.open_lock_file(mode) {
            Ok(file) => file,
            // Unwritable directory: readers go unlocked, writes are atomic anyway.
            Err(e) if mode == LockMode::Shared && e.kind() == ErrorKind::PermissionDenied => {
                log::debug!(
                    "cannot open {} ({}); reading without a lock",
                    path.display(),
                    e
                );
                return Ok(VaultLock { _file: None });
            }
            Err(e) => {
                return Err(storage_error(format!("Cannot open lock {}", path.display()), e))
            }
        };
        let locked = match mode {
            LockMode::Shared => FileExt::lock_shared(&file),
            LockMode::Exclusive => FileExt::lock_exclusive(&file),
        };
        locked.map_err(|e| storage_error(format!("Cannot lock {}", path.display()), e))?;
        Ok(VaultLock { _file: Some(file) })
    }

    /// Shared locks reuse an existing lock file read-only; otherwise the file
    /// is created owner-only.
    fn open_lock_file(&self, mode: LockMode) -> std::io::Result<File> {
        let path = self.config.lock_path();
        if mode == LockMode::Shared {
            match File::open(&path) {
                Ok(file) => return Ok(file),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        std::fs::create_dir_all(self.config.config_dir())?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;
        restrict_permissions(&path)?;
        Ok(file)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Shared,
    Exclusive,
}

/// Holds the advisory lock; closing the file releases it.
struct VaultLock {
    _file: Option<File>,
}

fn decode_document(key: &VaultKey, bytes: &[u8]) -> Result<SecretMap, TotpError> {
    let (format, plaintext) = crypto::open(key, bytes)?;
    if format == VaultFormat::LegacyXor {
        log::warn!("vault is in the legacy XOR format; it will be rewritten on the next change");
    }
    let doc: VaultDocument = serde_json::from_slice(&plaintext).map_err(|e| {
        TotpError::new(TotpErrorKind::VaultCorrupt, "Vault contents are not valid JSON")
            .with_detail(e.to_string())
    })?;
    Ok(doc.into_map())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), TotpError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .map_err(|e| storage_error(format!("Cannot create {}", dir.display()), e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| storage_error(format!("Cannot stage vault in {}", dir.display()), e))?;
    restrict_permissions(tmp.path())
        .map_err(|e| storage_error("Cannot restrict staged vault".to_string(), e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| storage_error("Cannot write staged vault".to_string(), e))?;
    tmp.persist(path)
        .map_err(|e| storage_error(format!("Cannot replace {}", path.display()), e.error))?;
    Ok(())
}

fn storage_error(msg: String, e: std::io::Error) -> TotpError {
    TotpError::new(TotpErrorKind::StorageError, msg).with_detail(e.to_string())
}
