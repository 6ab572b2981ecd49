//! Vault encryption codecs.
//!
//! - **AEAD** (default): AES-256-GCM with a random 96-bit nonce per save.
//!   File layout: `[FORMAT_AEAD][nonce; 12][ciphertext || tag]`, with the
//!   format byte bound as associated data.
//! - **Legacy XOR**: repeating-key XOR over the plaintext, base64 encoded.
//!   Not a security boundary; kept so vaults written by older releases can
//!   still be opened and migrated.
//!
//! Base64 text never begins with byte `0x02`, which lets [`open`] tell the
//! two formats apart without a header on legacy files.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;

use crate::totp::config::VaultFormat;
use crate::totp::keys::VaultKey;
use crate::totp::types::*;

/// Format byte leading every AEAD vault file.
pub const FORMAT_AEAD: u8 = 0x02;
/// AES-256-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;
/// AES-GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Capability interface
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Turns serialized vault plaintext into file bytes and back.
pub trait VaultCipher {
    fn format(&self) -> VaultFormat;
    fn encrypt(&self, key: &VaultKey, plaintext: &[u8]) -> Result<Vec<u8>, TotpError>;
    fn decrypt(&self, key: &VaultKey, ciphertext: &[u8]) -> Result<Vec<u8>, TotpError>;
}

/// Codec used for writing in the given format.
pub fn cipher_for(format: VaultFormat) -> &'static dyn VaultCipher {
    match format {
        VaultFormat::Aead => &AesGcmCipher,
        VaultFormat::LegacyXor => &LegacyXorCipher,
    }
}

/// Identify which codec produced `file_bytes`.
pub fn detect_format(file_bytes: &[u8]) -> VaultFormat {
    match file_bytes.first() {
        Some(&FORMAT_AEAD) => VaultFormat::Aead,
        _ => VaultFormat::LegacyXor,
    }
}

/// Decrypt file contents in whichever format they were written.
pub fn open(key: &VaultKey, file_bytes: &[u8]) -> Result<(VaultFormat, Vec<u8>), TotpError> {
    let format = detect_format(file_bytes);
    let plaintext = cipher_for(format).decrypt(key, file_bytes)?;
    Ok((format, plaintext))
}

fn corrupt(msg: impl Into<String>) -> TotpError {
    TotpError::new(TotpErrorKind::VaultCorrupt, msg)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  AES-256-GCM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmCipher;

/// Generate a cryptographically random nonce for AES-GCM.
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

impl VaultCipher for AesGcmCipher {
    fn format(&self) -> VaultFormat {
        VaultFormat::Aead
    }

    fn encrypt(&self, key: &VaultKey, plaintext: &[u8]) -> Result<Vec<u8>, TotpError> {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|e| {
            TotpError::new(TotpErrorKind::EncryptionFailed, format!("AES init: {}", e))
        })?;
        let nonce_bytes = generate_nonce();
        let aad = [FORMAT_AEAD];
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload { msg: plaintext, aad: &aad },
            )
            .map_err(|e| {
                TotpError::new(TotpErrorKind::EncryptionFailed, format!("AES encrypt: {}", e))
            })?;

        let mut out = Vec::with_capacity(1 + NONCE_LEN + sealed.len());
        out.push(FORMAT_AEAD);
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, key: &VaultKey, ciphertext: &[u8]) -> Result<Vec<u8>, TotpError> {
        if ciphertext.len() < 1 + NONCE_LEN + TAG_LEN {
            return Err(corrupt(format!(
                "Vault is truncated ({} bytes)",
                ciphertext.len()
            )));
        }
        if ciphertext[0] != FORMAT_AEAD {
            return Err(corrupt(format!(
                "Unknown vault format byte 0x{:02x}",
                ciphertext[0]
            )));
        }
        let (nonce_bytes, sealed) = ciphertext[1..].split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| corrupt(format!("AES init: {}", e)))?;
        let aad = [FORMAT_AEAD];
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), Payload { msg: sealed, aad: &aad })
            .map_err(|_e| corrupt("Decryption failed – wrong key or corrupted data"))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Legacy repeating-key XOR
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyXorCipher;

fn xor_with_key(key: &VaultKey, data: &[u8]) -> Vec<u8> {
    let key = key.as_bytes();
    data.iter()
        .enumerate()
        .map(|(i, b)| b ^ key[i % key.len()])
        .collect()
}

impl VaultCipher for LegacyXorCipher {
    fn format(&self) -> VaultFormat {
        VaultFormat::LegacyXor
    }

    fn encrypt(&self, key: &VaultKey, plaintext: &[u8]) -> Result<Vec<u8>, TotpError> {
        Ok(STANDARD.encode(xor_with_key(key, plaintext)).into_bytes())
    }

    fn decrypt(&self, key: &VaultKey, ciphertext: &[u8]) -> Result<Vec<u8>, TotpError> {
        let text = std::str::from_utf8(ciphertext)
            .map_err(|_| corrupt("Legacy vault is not base64 text"))?;
        let raw = STANDARD
            .decode(text.trim())
            .map_err(|e| corrupt("Legacy vault is not valid base64").with_detail(e.to_string()))?;
        Ok(xor_with_key(key, &raw))
    }
}
