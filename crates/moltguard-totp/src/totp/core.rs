//! Core OTP generation: RFC 4226 (HOTP) truncation driven by RFC 6238 time steps.
//!
//! The hash is fixed at HMAC-SHA1: secrets provisioned into third-party
//! authenticator apps are validated with SHA-1, so switching algorithms
//! would change every code already in use.
//!
//! Everything here is pure; callers supply the timestamp or use the
//! wall-clock wrappers.

use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::totp::types::*;

/// Largest supported code length. 10^10 still exceeds the 31-bit truncated value.
pub const MAX_DIGITS: u8 = 10;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Raw HMAC-OTP (RFC 4226 §5.3)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute an HOTP code for the given raw key bytes and counter.
pub fn hotp_raw(key: &[u8], counter: u64, digits: u8) -> String {
    let digest = hmac_sha1(key, &counter.to_be_bytes());
    truncate(&digest, digits)
}

fn hmac_sha1(key: &[u8], data: &[u8]) -> [u8; 20] {
    let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Dynamic truncation per RFC 4226 §5.3.
fn truncate(digest: &[u8], digits: u8) -> String {
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset],
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]) & 0x7fff_ffff;
    let modulus = 10u64.pow(digits as u32);
    let code = binary as u64 % modulus;
    format!("{:0>width$}", code, width = digits as usize)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Time steps
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute the time-step counter for a given unix timestamp.
pub fn time_step_at(unix_seconds: u64, period: u32) -> u64 {
    unix_seconds / period as u64
}

/// Seconds remaining in the window containing `unix_seconds`, in `[1, period]`.
pub fn seconds_remaining_at(unix_seconds: u64, period: u32) -> u32 {
    let p = period as u64;
    match p - (unix_seconds % p) {
        0 => period,
        r => r as u32,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  TOTP (time-based, RFC 6238)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Generate a TOTP code from a base-32 secret at the current time.
pub fn generate(secret_b32: &str, digits: u8, period: u32) -> Result<TotpResult, TotpError> {
    generate_at(secret_b32, digits, period, current_unix_time())
}

/// Generate a TOTP code at an explicit unix timestamp.
pub fn generate_at(
    secret_b32: &str,
    digits: u8,
    period: u32,
    unix_seconds: u64,
) -> Result<TotpResult, TotpError> {
    check_params(digits, period)?;
    let key = decode_secret(secret_b32)?;
    let counter = time_step_at(unix_seconds, period);
    Ok(TotpResult {
        code: hotp_raw(&key, counter, digits),
        remaining_seconds: seconds_remaining_at(unix_seconds, period),
    })
}

fn check_params(digits: u8, period: u32) -> Result<(), TotpError> {
    if digits == 0 || digits > MAX_DIGITS {
        return Err(TotpError::new(
            TotpErrorKind::InvalidInput,
            format!("digits must be between 1 and {}, got {}", MAX_DIGITS, digits),
        ));
    }
    if period == 0 {
        return Err(TotpError::new(
            TotpErrorKind::InvalidInput,
            "interval must be at least 1 second",
        ));
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Secret helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decode a base-32 secret (spaces ignored, case-insensitive).
///
/// Padding is optional but, when present, may only trail the data. Lengths
/// that no byte string encodes to (1, 3 or 6 mod 8) are rejected, as is an
/// empty secret.
pub fn decode_secret(b32: &str) -> Result<Vec<u8>, TotpError> {
    let cleaned = normalise_secret(b32);
    let data = cleaned.trim_end_matches('=');
    if data.contains('=') {
        return Err(TotpError::new(
            TotpErrorKind::InvalidSecret,
            "Invalid base-32 secret",
        )
        .with_detail("padding inside the secret"));
    }
    if matches!(data.len() % 8, 1 | 3 | 6) {
        return Err(TotpError::new(
            TotpErrorKind::InvalidSecret,
            "Invalid base-32 secret",
        )
        .with_detail(format!("impossible length {}", data.len())));
    }
    let key = base32::decode(base32::Alphabet::Rfc4648 { padding: true }, &pad_base32(data))
        .ok_or_else(|| TotpError::new(TotpErrorKind::InvalidSecret, "Invalid base-32 secret"))?;
    if key.is_empty() {
        return Err(TotpError::new(TotpErrorKind::InvalidSecret, "Secret is empty"));
    }
    Ok(key)
}

/// Pad a base-32 string to a multiple of 8 with '='.
fn pad_base32(s: &str) -> String {
    let remainder = s.len() % 8;
    if remainder == 0 {
        s.to_string()
    } else {
        format!("{}{}", s, "=".repeat(8 - remainder))
    }
}

/// Current unix timestamp in seconds.
pub fn current_unix_time() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── RFC 4226 test vectors (Appendix D) ───────────────────────
    // Secret: "12345678901234567890" (ASCII) → base32: GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ

    const RFC4226_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";
    const DEMO_SECRET: &str = "JBSWY3DPEHPK3PXP";

    #[test]
    fn rfc4226_hotp_vectors() {
        let key = decode_secret(RFC4226_SECRET).unwrap();
        let expected = [
            "755224", "287082", "359152", "969429", "338314",
            "254676", "287922", "162583", "399871", "520489",
        ];
        for (counter, exp) in expected.iter().enumerate() {
            assert_eq!(&hotp_raw(&key, counter as u64, 6), exp, "HOTP mismatch at counter {}", counter);
        }
    }

    // ── RFC 6238 SHA-1 vectors ───────────────────────────────────

    #[test]
    fn rfc6238_totp_sha1() {
        let r = generate_at(RFC4226_SECRET, 8, 30, 59).unwrap();
        assert_eq!(r.code, "94287082");
        assert_eq!(r.remaining_seconds, 1);
    }

    #[test]
    fn rfc6238_totp_large_time() {
        // Leading zero must survive.
        let r = generate_at(RFC4226_SECRET, 8, 30, 1111111109).unwrap();
        assert_eq!(r.code, "07081804");
    }

    #[test]
    fn rfc6238_totp_20000000000() {
        let r = generate_at(RFC4226_SECRET, 8, 30, 20000000000).unwrap();
        assert_eq!(r.code, "65353130");
    }

    #[test]
    fn demo_secret_known_code_at_counter_zero() {
        for t in [0u64, 1, 15, 29] {
            let r = generate_at(DEMO_SECRET, 6, 30, t).unwrap();
            assert_eq!(r.code, "282760");
        }
        let next = generate_at(DEMO_SECRET, 6, 30, 30).unwrap();
        assert_ne!(next.code, "282760");
    }

    #[test]
    fn generation_is_deterministic() {
        let a = generate_at(DEMO_SECRET, 6, 30, 1_700_000_000).unwrap();
        let b = generate_at(DEMO_SECRET, 6, 30, 1_700_000_000).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.code.len(), 6);
        assert!(a.code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn secret_formatting_does_not_change_code() {
        let a = generate_at("JBSWY3DPEHPK3PXP", 6, 30, 1234).unwrap();
        let b = generate_at("jbsw y3dp ehpk 3pxp", 6, 30, 1234).unwrap();
        assert_eq!(a, b);
    }

    // ── Truncation ───────────────────────────────────────────────

    #[test]
    fn truncation_left_pads() {
        // offset 0 (last nibble), window 0x00000025 = 37
        let mut digest = [0u8; 20];
        digest[3] = 0x25;
        assert_eq!(truncate(&digest, 6), "000037");
    }

    #[test]
    fn truncation_clears_sign_bit() {
        let mut digest = [0u8; 20];
        digest[19] = 0x04; // offset 4
        digest[4..8].copy_from_slice(&[0xff, 0xff, 0xff, 0xff]);
        assert_eq!(truncate(&digest, 10), "2147483647");
    }

    // ── Window boundary ──────────────────────────────────────────

    #[test]
    fn remaining_seconds_never_zero() {
        for period in [1u32, 30, 60] {
            for t in 0u64..200 {
                let r = seconds_remaining_at(t, period);
                assert!(r >= 1 && r <= period, "t={} period={} r={}", t, period, r);
            }
        }
        assert_eq!(seconds_remaining_at(0, 30), 30);
        assert_eq!(seconds_remaining_at(29, 30), 1);
        assert_eq!(seconds_remaining_at(30, 30), 30);
    }

    #[test]
    fn time_step_calculation() {
        assert_eq!(time_step_at(0, 30), 0);
        assert_eq!(time_step_at(29, 30), 0);
        assert_eq!(time_step_at(30, 30), 1);
        assert_eq!(time_step_at(59, 30), 1);
    }

    // ── Errors ───────────────────────────────────────────────────

    #[test]
    fn invalid_secret_is_reported() {
        let err = generate_at("not-base32-1", 6, 30, 0).unwrap_err();
        assert_eq!(err.kind, TotpErrorKind::InvalidSecret);
    }

    #[test]
    fn empty_secret_is_invalid() {
        let err = generate_at("   ", 6, 30, 0).unwrap_err();
        assert_eq!(err.kind, TotpErrorKind::InvalidSecret);
    }

    #[test]
    fn bad_parameters_are_rejected() {
        assert_eq!(generate_at(DEMO_SECRET, 0, 30, 0).unwrap_err().kind, TotpErrorKind::InvalidInput);
        assert_eq!(generate_at(DEMO_SECRET, 11, 30, 0).unwrap_err().kind, TotpErrorKind::InvalidInput);
        assert_eq!(generate_at(DEMO_SECRET, 6, 0, 0).unwrap_err().kind, TotpErrorKind::InvalidInput);
    }

    #[test]
    fn unpadded_odd_length_secret_decodes() {
        // 10 chars → padded to 16
        assert!(decode_secret("JBSWY3DPEH").is_ok());
    }

    #[test]
    fn malformed_base32_is_rejected() {
        for bad in ["A", "ABC", "ABCDEFGHI", "AB=CD", "JBSWY3DP=EHPK3PXP"] {
            let err = decode_secret(bad).unwrap_err();
            assert_eq!(err.kind, TotpErrorKind::InvalidSecret, "accepted {:?}", bad);
        }
    }

    #[test]
    fn trailing_padding_is_accepted() {
        assert_eq!(
            decode_secret("JBSWY3DPEH======").unwrap(),
            decode_secret("JBSWY3DPEH").unwrap()
        );
        assert_eq!(decode_secret("MZXW6===").unwrap(), b"foo");
    }
}
