//! Trust store installation: writes the root CA and, once available,
//! the client certificate into the OS trust/identity stores so other
//! processes on the VM can rely on them for mTLS.

#[cfg(unix)]
mod posix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use posix::PosixTrustStore;
#[cfg(windows)]
pub use windows::WindowsTrustStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrustStoreError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to refresh the system trust store via {command}: {detail}")]
    Refresh { command: String, detail: String },
    #[error("crypto error while packaging trust material: {0}")]
    Crypto(#[from] crate::crypto::CryptoError),
}

/// Installs the root CA certificate and the per-instance mTLS client
/// identity into whatever trust/identity store the platform exposes.
///
/// Implementations must be idempotent: running `install_root_ca` twice with
/// the same bytes must not duplicate entries or fail.
pub trait TrustStoreInstaller: Send + Sync {
    /// Writes `root_ca_pem` as a trusted root and refreshes the OS trust
    /// bundle. Returns the path the certificate was written to, used later
    /// for chain verification.
    fn install_root_ca(&self, root_ca_pem: &[u8]) -> Result<std::path::PathBuf, TrustStoreError>;

    /// Installs the mTLS client identity (certificate + private key) so
    /// local processes can present it, keyed by certificate serial so a
    /// later rotation can remove the previous serial cleanly.
    fn install_client_identity(
        &self,
        serial_hex: &str,
        certificate_pem: &[u8],
        private_key_pem: &[u8],
    ) -> Result<(), TrustStoreError>;

    /// Removes a previously installed client identity by serial, used by
    /// the credential job's rotation cleanup.
    fn remove_client_identity(&self, serial_hex: &str) -> Result<(), TrustStoreError>;
}
