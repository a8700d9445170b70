//! TPM sealing adapter: load the endorsement key and unseal an
//! `ImportBlob` to recover the symmetric DEK used by the credential job.
//!
//! Opaque at the boundary: the core never inspects `ImportBlob` contents,
//! only hands it to a `TpmUnsealer` and gets raw key bytes back.

use thiserror::Error;
use zeroize::Zeroizing;

use crate::metadata::ImportBlob;

#[derive(Debug, Error)]
pub enum TpmError {
    #[error("failed to open TPM context: {0}")]
    Open(String),
    #[error("failed to load TPM endorsement key: {0}")]
    LoadEndorsementKey(String),
    #[error("failed to import/unseal TPM blob: {0}")]
    Import(String),
    #[error("TPM operations are not supported on this platform")]
    Unsupported,
}

/// A sealed data encryption key. `Drop`s via `Zeroizing`; callers must not
/// persist it.
pub type Dek = Zeroizing<Vec<u8>>;

pub trait TpmUnsealer: Send + Sync {
    /// Unseals `blob` against this VM's ECC endorsement key, returning the
    /// recovered DEK. Any failure (context open, key load, import) is fatal
    /// to the credential job run that invoked it.
    fn unseal(&self, blob: &ImportBlob) -> Result<Dek, TpmError>;
}

/// Production unsealer for Linux hosts with a TPM2 resource manager
/// reachable over the stable kernel ABI (`/dev/tpmrm0`).
#[cfg(target_os = "linux")]
pub mod linux {
    use super::{Dek, ImportBlob, TpmError, TpmUnsealer};
    use tss_esapi::{
        abstraction::ek,
        interface_types::algorithm::AsymmetricAlgorithm,
        structures::{EncryptedSecret, Private, Public, SymmetricDefinitionObject},
        Context, TctiNameConf,
    };

    /// Unseals against the platform's resource-managed TPM2 device
    /// (`TCTI=device:/dev/tpmrm0` by convention; overridable via the
    /// standard `TPM2TOOLS_TCTI`/`TCTI` environment variables).
    pub struct Tpm2Unsealer {
        tcti: TctiNameConf,
    }

    impl Tpm2Unsealer {
        pub fn new() -> Result<Self, TpmError> {
            let tcti = TctiNameConf::from_environment_variable()
                .map_err(|e| TpmError::Open(e.to_string()))?;
            Ok(Self { tcti })
        }
    }

    impl TpmUnsealer for Tpm2Unsealer {
        fn unseal(&self, blob: &ImportBlob) -> Result<Dek, TpmError> {
            let mut context =
                Context::new(self.tcti.clone()).map_err(|e| TpmError::Open(e.to_string()))?;

            let ek_handle = ek::create_ek_object(&mut context, AsymmetricAlgorithm::Ecc, None)
                .map_err(|e| TpmError::LoadEndorsementKey(e.to_string()))?;

            let public = Public::unmarshall(&blob.public_area)
                .map_err(|e| TpmError::Import(format!("malformed publicArea: {e}")))?;
            let duplicate = Private::try_from(blob.duplicate.clone())
                .map_err(|e| TpmError::Import(e.to_string()))?;
            let encrypted_seed = EncryptedSecret::try_from(blob.encrypted_seed.clone())
                .map_err(|e| TpmError::Import(e.to_string()))?;

            // TPM2_Import: wraps `duplicate` under the EK using
            // `encrypted_seed` as the inner symmetric-key seed, producing a
            // private blob the EK can then load. Unsealing an ImportBlob
            // means running this step, not just handing the raw wire
            // `duplicate` bytes straight to `load`.
            let imported_private = context
                .import(
                    ek_handle,
                    None,
                    public.clone(),
                    duplicate,
                    encrypted_seed,
                    SymmetricDefinitionObject::Null,
                )
                .map_err(|e| TpmError::Import(e.to_string()))?;

            let loaded = context
                .load(ek_handle, imported_private, public)
                .map_err(|e| TpmError::Import(e.to_string()))?;

            let unsealed = context
                .unseal(loaded.into())
                .map_err(|e| TpmError::Import(e.to_string()))?;

            Ok(Dek::new(unsealed.to_vec()))
        }
    }
}

/// Stub unsealer for non-Linux builds; always returns `Unsupported` since no
/// TPM ABI is available to call into.
#[derive(Debug, Default)]
pub struct UnsupportedUnsealer;

impl TpmUnsealer for UnsupportedUnsealer {
    fn unseal(&self, _blob: &ImportBlob) -> Result<Dek, TpmError> {
        Err(TpmError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_unsealer_always_errors() {
        let unsealer = UnsupportedUnsealer;
        let blob = ImportBlob {
            duplicate: vec![],
            encrypted_seed: vec![],
            public_area: vec![],
        };
        assert!(matches!(unsealer.unseal(&blob), Err(TpmError::Unsupported)));
    }
}
