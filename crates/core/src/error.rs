use thiserror::Error;

use crate::config::ConfigError;
use crate::credential_job::CredentialJobError;
use crate::crypto::CryptoError;
use crate::firmware::FirmwareError;
use crate::hostname::HostnameError;
use crate::managers::ManagerError;
use crate::metadata::MetadataError;
use crate::scheduler::SchedulerError;
use crate::tpm::TpmError;
use crate::trust_store::TrustStoreError;

/// Top-level error composed from every reconciliation subsystem.
///
/// Individual components return their own narrow error type; this enum only
/// exists at crate boundaries (the scheduler, the reconciliation loop, the
/// binary entrypoint) where several subsystems' failures need to flow
/// through one `Result`.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Firmware(#[from] FirmwareError),
    #[error(transparent)]
    Tpm(#[from] TpmError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    TrustStore(#[from] TrustStoreError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    CredentialJob(#[from] CredentialJobError),
    #[error(transparent)]
    Manager(#[from] ManagerError),
    #[error(transparent)]
    Hostname(#[from] HostnameError),
}
