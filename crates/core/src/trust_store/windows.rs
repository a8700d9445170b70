//! Windows trust store: imports into `Cert:\LocalMachine\Root` (CA) and
//! `Cert:\LocalMachine\My` (client identity, packaged as PKCS#12).
//!
//! Not wired into the default agent build; kept as a stub behind
//! `cfg(windows)` until a PowerShell/WinAPI import path is implemented.

use std::path::PathBuf;

use super::{TrustStoreError, TrustStoreInstaller};

pub struct WindowsTrustStore;

impl TrustStoreInstaller for WindowsTrustStore {
    fn install_root_ca(&self, _root_ca_pem: &[u8]) -> Result<PathBuf, TrustStoreError> {
        Err(TrustStoreError::Refresh {
            command: "Import-Certificate".to_string(),
            detail: "Windows trust store import is not implemented".to_string(),
        })
    }

    fn install_client_identity(
        &self,
        _serial_hex: &str,
        _certificate_pem: &[u8],
        _private_key_pem: &[u8],
    ) -> Result<(), TrustStoreError> {
        Err(TrustStoreError::Refresh {
            command: "Import-PfxCertificate".to_string(),
            detail: "Windows client identity import is not implemented".to_string(),
        })
    }

    fn remove_client_identity(&self, _serial_hex: &str) -> Result<(), TrustStoreError> {
        Err(TrustStoreError::Refresh {
            command: "Remove-Item Cert:\\LocalMachine\\My".to_string(),
            detail: "Windows client identity removal is not implemented".to_string(),
        })
    }
}
