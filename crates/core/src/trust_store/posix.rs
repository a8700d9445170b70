//! POSIX trust store: drops PEM files under the distro's CA directory and
//! the client identity under a private directory, then re-runs the distro's
//! trust-bundle refresh tool.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, warn};

use super::{TrustStoreError, TrustStoreInstaller};

const ROOT_CA_FILENAME: &str = "google-guest-agent-root-ca.crt";

pub struct PosixTrustStore {
    /// Directory the root CA PEM is dropped into before the refresh tool
    /// picks it up, e.g. `/usr/local/share/ca-certificates` (Debian/Ubuntu)
    /// or `/etc/pki/ca-trust/source/anchors` (RHEL/Fedora).
    ca_source_dir: PathBuf,
    /// Directory client identity PEM pairs are written to, consumed by
    /// other processes on the VM that need to present the mTLS identity.
    client_identity_dir: PathBuf,
    refresh_command: RefreshCommand,
}

enum RefreshCommand {
    UpdateCaCertificates,
    UpdateCaTrust,
}

impl PosixTrustStore {
    pub fn debian_like(client_identity_dir: impl Into<PathBuf>) -> Self {
        Self {
            ca_source_dir: PathBuf::from("/usr/local/share/ca-certificates"),
            client_identity_dir: client_identity_dir.into(),
            refresh_command: RefreshCommand::UpdateCaCertificates,
        }
    }

    pub fn rhel_like(client_identity_dir: impl Into<PathBuf>) -> Self {
        Self {
            ca_source_dir: PathBuf::from("/etc/pki/ca-trust/source/anchors"),
            client_identity_dir: client_identity_dir.into(),
            refresh_command: RefreshCommand::UpdateCaTrust,
        }
    }

    /// Picks the Debian or RHEL layout based on which refresh binary is on
    /// `PATH`, falling back to the Debian layout (matches the upstream
    /// guest agent's own detection order).
    pub fn detect(client_identity_dir: impl Into<PathBuf>) -> Self {
        let client_identity_dir = client_identity_dir.into();
        if which("update-ca-trust") {
            Self::rhel_like(client_identity_dir)
        } else {
            Self::debian_like(client_identity_dir)
        }
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), TrustStoreError> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|source| TrustStoreError::Write {
            path: path.display().to_string(),
            source,
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|source| TrustStoreError::Write {
            path: path.display().to_string(),
            source,
        })?;
        use std::io::Write as _;
        tmp.write_all(contents).map_err(|source| TrustStoreError::Write {
            path: path.display().to_string(),
            source,
        })?;
        tmp.persist(path).map_err(|e| TrustStoreError::Write {
            path: path.display().to_string(),
            source: e.error,
        })?;
        Ok(())
    }
}

impl TrustStoreInstaller for PosixTrustStore {
    fn install_root_ca(&self, root_ca_pem: &[u8]) -> Result<PathBuf, TrustStoreError> {
        let path = self.ca_source_dir.join(ROOT_CA_FILENAME);
        self.write_atomic(&path, root_ca_pem)?;

        let (binary, args): (&str, &[&str]) = match self.refresh_command {
            RefreshCommand::UpdateCaCertificates => ("update-ca-certificates", &[]),
            RefreshCommand::UpdateCaTrust => ("update-ca-trust", &["extract"]),
        };
        run_refresh(binary, args)?;

        // Also write the fixed path other processes on the VM read the root
        // CA from, independent of the OS updater's own source directory.
        let fixed_path = crate::paths::root_ca_path();
        self.write_atomic(&fixed_path, root_ca_pem)?;

        debug!(path = %fixed_path.display(), "installed root CA");
        Ok(fixed_path)
    }

    fn install_client_identity(
        &self,
        serial_hex: &str,
        certificate_pem: &[u8],
        private_key_pem: &[u8],
    ) -> Result<(), TrustStoreError> {
        std::fs::create_dir_all(&self.client_identity_dir).map_err(|source| TrustStoreError::Write {
            path: self.client_identity_dir.display().to_string(),
            source,
        })?;
        let cert_path = self.client_identity_dir.join(format!("{serial_hex}.crt"));
        let key_path = self.client_identity_dir.join(format!("{serial_hex}.key"));
        self.write_atomic(&cert_path, certificate_pem)?;
        self.write_atomic(&key_path, private_key_pem)?;

        // The fixed client-key path is the credential bundle's cert PEM
        // concatenated with its private key PEM, matching the wire bundle's
        // own layout, so anything chaining it to the root only needs one
        // file.
        let mut combined = Vec::with_capacity(certificate_pem.len() + private_key_pem.len());
        combined.extend_from_slice(certificate_pem);
        combined.extend_from_slice(private_key_pem);
        let fixed_key_path = crate::paths::client_key_path();
        self.write_atomic(&fixed_key_path, &combined)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o644);
            for path in [&key_path, &fixed_key_path] {
                let _ = std::fs::set_permissions(path, perms.clone());
            }
        }
        Ok(())
    }

    fn remove_client_identity(&self, serial_hex: &str) -> Result<(), TrustStoreError> {
        let cert_path = self.client_identity_dir.join(format!("{serial_hex}.crt"));
        let key_path = self.client_identity_dir.join(format!("{serial_hex}.key"));
        for path in [&cert_path, &key_path] {
            if let Err(source) = std::fs::remove_file(path) {
                if source.kind() != std::io::ErrorKind::NotFound {
                    return Err(TrustStoreError::Write {
                        path: path.display().to_string(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}

fn run_refresh(binary: &str, args: &[&str]) -> Result<(), TrustStoreError> {
    let mut command = Command::new(binary);
    command.args(args);
    let binary = binary.to_string();
    let args_owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();

    tokio::task::block_in_place(|| {
        tokio::runtime::Handle::current().block_on(async {
            crate::process::run_checked(&binary, command)
                .await
                .map_err(|e| TrustStoreError::Refresh {
                    command: format!("{binary} {}", args_owned.join(" ")),
                    detail: e.to_string(),
                })
        })
    })?;
    Ok(())
}

fn which(binary: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| dir.join(binary).is_file())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debian_layout_targets_the_debian_ca_directory() {
        let store = PosixTrustStore::debian_like("/tmp/identity");
        assert_eq!(store.ca_source_dir, Path::new("/usr/local/share/ca-certificates"));
    }
}
