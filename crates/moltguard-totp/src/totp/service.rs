//! High-level orchestrator: owns the vault and code parameters, renders the
//! status lines the command layer returns.

use std::path::Path;

use crate::totp::config::VaultConfig;
use crate::totp::core;
use crate::totp::storage::Vault;
use crate::totp::types::*;

/// Central TOTP service.
#[derive(Debug)]
pub struct TotpService {
    vault: Vault,
    digits: u8,
    period: u32,
}

impl TotpService {
    /// Build a service from a validated configuration.
    pub fn new(config: VaultConfig) -> Result<Self, TotpError> {
        config.validate()?;
        let (digits, period) = (config.digits, config.period);
        Ok(Self::from_vault(Vault::new(config), digits, period))
    }

    /// Load `config.json` from `dir` (if any) and build the service.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, TotpError> {
        Self::new(VaultConfig::load(dir.as_ref())?)
    }

    pub fn from_vault(vault: Vault, digits: u8, period: u32) -> Self {
        Self {
            vault,
            digits,
            period,
        }
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Secrets
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn add_secret(&self, service_name: &str, secret: &str) -> Result<String, TotpError> {
        let entry = self.vault.add(service_name, secret)?;
        Ok(format!("OK: Added 2FA for {}", entry.service_name))
    }

    pub fn remove_secret(&self, service_name: &str) -> Result<String, TotpError> {
        let entry = self.vault.remove(service_name)?;
        Ok(format!("OK: Removed 2FA for {}", entry.service_name))
    }

    pub fn list_services(&self) -> Result<Vec<String>, TotpError> {
        self.vault.list()
    }

    /// Move the vault aside so the next `add` starts a fresh one.
    pub fn reset_vault(&self) -> Result<String, TotpError> {
        Ok(match self.vault.reset()? {
            Some(backup) => format!("OK: Vault reset, previous file kept at {}", backup.display()),
            None => "OK: No vault to reset".to_string(),
        })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Code generation
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn get_code(&self, service_name: &str) -> Result<TotpResult, TotpError> {
        let entry = self.lookup(service_name)?;
        core::generate(&entry.secret, self.digits, self.period)
    }

    pub fn get_code_at(
        &self,
        service_name: &str,
        unix_seconds: u64,
    ) -> Result<TotpResult, TotpError> {
        let entry = self.lookup(service_name)?;
        core::generate_at(&entry.secret, self.digits, self.period, unix_seconds)
    }

    fn lookup(&self, service_name: &str) -> Result<SecretEntry, TotpError> {
        self.vault.get(service_name)?.ok_or_else(|| {
            let name = normalise_service_name(service_name);
            TotpError::new(
                TotpErrorKind::NotFound,
                format!("{} not found. Add with: 2fa add {} <secret>", name, name),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_service(dir: &TempDir) -> TotpService {
        let mut cfg = VaultConfig::in_dir(dir.path());
        cfg.machine_id_path = dir.path().join("machine-id");
        std::fs::write(&cfg.machine_id_path, "service-test-machine").unwrap();
        cfg.kdf_iterations = 1_000;
        TotpService::new(cfg).unwrap()
    }

    // ── Secrets ──────────────────────────────────────────────────

    #[test]
    fn add_reports_normalised_name() {
        let dir = TempDir::new().unwrap();
        let svc = make_service(&dir);
        assert_eq!(
            svc.add_secret("GitHub", "JBSWY3DPEHPK3PXP").unwrap(),
            "OK: Added 2FA for github"
        );
        assert_eq!(svc.list_services().unwrap(), vec!["github"]);
    }

    #[test]
    fn remove_reports_and_errors() {
        let dir = TempDir::new().unwrap();
        let svc = make_service(&dir);
        svc.add_secret("github", "JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(
            svc.remove_secret("github").unwrap(),
            "OK: Removed 2FA for github"
        );
        let err = svc.remove_secret("github").unwrap_err();
        assert_eq!(err.kind, TotpErrorKind::NotFound);
        assert_eq!(err.message, "github not found in vault");
    }

    #[test]
    fn invalid_secret_is_rejected() {
        let dir = TempDir::new().unwrap();
        let svc = make_service(&dir);
        let err = svc.add_secret("github", "not-base32-1").unwrap_err();
        assert_eq!(err.kind, TotpErrorKind::InvalidSecret);
    }

    // ── Code generation ──────────────────────────────────────────

    #[test]
    fn get_code_matches_engine() {
        let dir = TempDir::new().unwrap();
        let svc = make_service(&dir);
        svc.add_secret("github", "jbsw y3dp ehpk 3pxp").unwrap();
        let res = svc.get_code_at("GITHUB", 1_700_000_000).unwrap();
        let expected = core::generate_at("JBSWY3DPEHPK3PXP", 6, 30, 1_700_000_000).unwrap();
        assert_eq!(res, expected);
        assert_eq!(res.code.len(), 6);
        assert_eq!(res.remaining_seconds, 10);
    }

    #[test]
    fn get_code_for_unknown_service_hints_at_add() {
        let dir = TempDir::new().unwrap();
        let svc = make_service(&dir);
        let err = svc.get_code("Slack").unwrap_err();
        assert_eq!(err.kind, TotpErrorKind::NotFound);
        assert_eq!(
            err.message,
            "slack not found. Add with: 2fa add slack <secret>"
        );
    }

    #[test]
    fn configured_digits_are_used() {
        let dir = TempDir::new().unwrap();
        let mut cfg = VaultConfig::in_dir(dir.path());
        cfg.machine_id_path = dir.path().join("absent");
        cfg.kdf_iterations = 1_000;
        cfg.digits = 8;
        let svc = TotpService::new(cfg).unwrap();
        // RFC 6238 SHA-1 seed "12345678901234567890".
        svc.add_secret("rfc", "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ").unwrap();
        assert_eq!(svc.get_code_at("rfc", 59).unwrap().code, "94287082");
    }

    #[test]
    fn live_code_uses_configured_parameters() {
        let dir = TempDir::new().unwrap();
        let mut cfg = VaultConfig::in_dir(dir.path());
        cfg.machine_id_path = dir.path().join("absent");
        cfg.kdf_iterations = 1_000;
        cfg.digits = 8;
        cfg.period = 60;
        let svc = TotpService::new(cfg).unwrap();
        svc.add_secret("github", "JBSWY3DPEHPK3PXP").unwrap();
        let res = svc.get_code("github").unwrap();
        assert_eq!(res.code.len(), 8);
        assert!(res.remaining_seconds >= 1 && res.remaining_seconds <= 60);
    }

    #[test]
    fn truncated_secret_is_never_stored() {
        let dir = TempDir::new().unwrap();
        let svc = make_service(&dir);
        for bad in ["A", "ABC", "ABCDEFGHI", "AB=CD"] {
            let err = svc.add_secret("github", bad).unwrap_err();
            assert_eq!(err.kind, TotpErrorKind::InvalidSecret);
        }
        assert!(svc.list_services().unwrap().is_empty());
    }

    #[test]
    fn new_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let mut cfg = VaultConfig::in_dir(dir.path());
        cfg.period = 0;
        let err = TotpService::new(cfg).unwrap_err();
        assert_eq!(err.kind, TotpErrorKind::ConfigError);
    }

    #[test]
    fn reset_vault_reports_backup() {
        let dir = TempDir::new().unwrap();
        let svc = make_service(&dir);
        assert_eq!(svc.reset_vault().unwrap(), "OK: No vault to reset");
        svc.add_secret("github", "JBSWY3DPEHPK3PXP").unwrap();
        let msg = svc.reset_vault().unwrap();
        assert!(msg.starts_with("OK: Vault reset, previous file kept at "));
        assert!(svc.list_services().unwrap().is_empty());
    }
}
