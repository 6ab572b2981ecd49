//! Text-level command bindings.
//!
//! Thin wrappers over [`TotpService`] for collaborators that exchange plain
//! strings (the CLI, chat command handlers). Every command returns
//! `Result<T, String>`.

use crate::totp::service::TotpService;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Secrets
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn totp_add_secret(svc: &TotpService, service_name: &str, secret: &str) -> Result<String, String> {
    svc.add_secret(service_name, secret).map_err(|e| e.to_string())
}

pub fn totp_remove_secret(svc: &TotpService, service_name: &str) -> Result<String, String> {
    svc.remove_secret(service_name).map_err(|e| e.to_string())
}

pub fn totp_list_services(svc: &TotpService) -> Result<Vec<String>, String> {
    svc.list_services().map_err(|e| e.to_string())
}

pub fn totp_reset_vault(svc: &TotpService) -> Result<String, String> {
    svc.reset_vault().map_err(|e| e.to_string())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Codes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `"<code> (expires in Ns)"` for the service's current window.
pub fn totp_get_code(svc: &TotpService, service_name: &str) -> Result<String, String> {
    svc.get_code(service_name)
        .map(|r| r.to_string())
        .map_err(|e| e.to_string())
}

pub fn totp_get_code_at(
    svc: &TotpService,
    service_name: &str,
    unix_seconds: u64,
) -> Result<String, String> {
    svc.get_code_at(service_name, unix_seconds)
        .map(|r| r.to_string())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::totp::config::VaultConfig;
    use tempfile::TempDir;

    fn make_service(dir: &TempDir) -> TotpService {
        let mut cfg = VaultConfig::in_dir(dir.path());
        cfg.machine_id_path = dir.path().join("machine-id");
        cfg.kdf_iterations = 1_000;
        TotpService::new(cfg).unwrap()
    }

    #[test]
    fn get_code_text_contract() {
        let dir = TempDir::new().unwrap();
        let svc = make_service(&dir);
        totp_add_secret(&svc, "rfc", "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ").unwrap();
        assert_eq!(
            totp_get_code_at(&svc, "rfc", 59).unwrap(),
            "287082 (expires in 1s)"
        );
        let live = totp_get_code(&svc, "rfc").unwrap();
        assert!(live.contains(" (expires in "));
    }

    #[test]
    fn errors_render_kind_and_message() {
        let dir = TempDir::new().unwrap();
        let svc = make_service(&dir);
        let err = totp_remove_secret(&svc, "ghost").unwrap_err();
        assert_eq!(err, "[NotFound] ghost not found in vault");
        let err = totp_add_secret(&svc, "x", "!!!").unwrap_err();
        assert!(err.starts_with("[InvalidSecret]"));
    }

    #[test]
    fn list_and_reset() {
        let dir = TempDir::new().unwrap();
        let svc = make_service(&dir);
        assert!(totp_list_services(&svc).unwrap().is_empty());
        totp_add_secret(&svc, "b", "JBSWY3DPEHPK3PXP").unwrap();
        totp_add_secret(&svc, "a", "JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(totp_list_services(&svc).unwrap(), vec!["a", "b"]);
        assert!(totp_reset_vault(&svc).unwrap().starts_with("OK: Vault reset"));
        assert!(totp_list_services(&svc).unwrap().is_empty());
    }
}
