//! Credential bootstrap job: orchestrates the firmware root CA read,
//! TPM unseal, AES-GCM decrypt, chain verification, and atomic trust-store
//! install with overlap-based rotation.

use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::crypto::{self, CryptoError};
use crate::firmware::{FirmwareError, FirmwareVariableReader, ROOT_CA_VAR_GUID, ROOT_CA_VAR_NAME};
use crate::metadata::{Descriptor, GuestCredentialsResponse, MetadataClient, MetadataError};
use crate::paths::CREDENTIALS_METADATA_KEY;
use crate::scheduler::{anyhow_like, Job};
use crate::tpm::{TpmError, TpmUnsealer};
use crate::trust_store::{TrustStoreError, TrustStoreInstaller};

pub const ROTATION_INTERVAL: Duration = Duration::from_secs(48 * 60 * 60);

#[derive(Debug, Error)]
pub enum CredentialJobError {
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
    #[error("credentials response was not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// `{ rootCaPem, clientCertPem, clientKeyPem, serial }`.
#[derive(Debug, Clone)]
pub struct CredentialBundle {
    pub root_ca_pem: Vec<u8>,
    pub client_cert_pem: Vec<u8>,
    pub client_key_pem: Vec<u8>,
    pub serial: String,
}

pub struct CredentialJob {
    metadata: std::sync::Arc<MetadataClient>,
    firmware: Box<dyn FirmwareVariableReader>,
    tpm: Box<dyn TpmUnsealer>,
    trust_store: Box<dyn TrustStoreInstaller>,
    config: Config,
    /// Previous root CA / client cert serials, retained in memory for
    /// rotation cleanup.
    previous_root_serial: Mutex<Option<String>>,
    previous_client_serial: Mutex<Option<String>>,
}

impl CredentialJob {
    pub fn new(
        metadata: std::sync::Arc<MetadataClient>,
        firmware: Box<dyn FirmwareVariableReader>,
        tpm: Box<dyn TpmUnsealer>,
        trust_store: Box<dyn TrustStoreInstaller>,
        config: Config,
    ) -> Self {
        Self {
            metadata,
            firmware,
            tpm,
            trust_store,
            config,
            previous_root_serial: Mutex::new(None),
            previous_client_serial: Mutex::new(None),
        }
    }

    /// Three-tier override: instance attribute, then project attribute
    /// (folded together by `Descriptor::enable_https_mds_setup`), then the
    /// config file; first definition wins.
    async fn should_enable_inner(&self) -> bool {
        match self.metadata.get_key(CREDENTIALS_METADATA_KEY, &[]).await {
            Ok(_) => {}
            Err(error) => {
                warn!(%error, "credentials metadata key did not respond, job disabled");
                return false;
            }
        }

        if let Some(enabled) = self.latest_descriptor().await.enable_https_mds_setup() {
            return enabled;
        }

        self.config.mds.disable_https_mds_setup != Some(true)
    }

    /// Fetches the current descriptor for the enablement check. A fetch or
    /// decode failure falls through to the config-file tier, the same as an
    /// attribute simply not being set.
    async fn latest_descriptor(&self) -> Descriptor {
        match self.metadata.get_key("", &[]).await {
            Ok(body) => serde_json::from_str(&body).unwrap_or_default(),
            Err(error) => {
                warn!(%error, "failed to fetch descriptor for enablement check");
                Descriptor::default()
            }
        }
    }

    /// Runs the full bootstrap/rotation sequence once, returning the new
    /// bundle. Fatal errors (TPM open/load, firmware absence, root-CA parse,
    /// signature verify) propagate; the scheduler keeps the job scheduled
    /// regardless.
    pub async fn run_once(&self) -> Result<CredentialBundle, CredentialJobError> {
        // Step 1: read + parse the root CA.
        let root_ca_raw = self.firmware.read_variable(ROOT_CA_VAR_NAME, ROOT_CA_VAR_GUID)?;
        let root_ca_der = crypto::parse_single_certificate(&root_ca_raw)?;
        let root_ca_pem = crypto::encode_certificate(&root_ca_der).into_bytes();
        let new_root_serial = crypto::serial_hex(&root_ca_der)?;

        // Step 2: install the root CA. Written unconditionally on every run
        // since the on-disk path is a fixed filename the installer
        // overwrites in place; only the serial is tracked here, for logging
        // when the firmware variable actually changed underneath us.
        self.trust_store.install_root_ca(&root_ca_pem)?;
        let previous_root_serial = self
            .previous_root_serial
            .lock()
            .expect("mutex poisoned")
            .replace(new_root_serial.clone());
        if previous_root_serial.as_deref().is_some_and(|s| s != new_root_serial) {
            info!(previous = ?previous_root_serial, new = new_root_serial, "root CA serial changed");
        }

        // Step 3: fetch + decode the credentials response.
        let response_json = self.metadata.get_key(CREDENTIALS_METADATA_KEY, &[]).await?;
        let response: GuestCredentialsResponse = serde_json::from_str(&response_json)?;

        // Step 4: unseal the DEK. Never persisted (Dek drops via Zeroizing).
        let dek = self.tpm.unseal(&response.key_import_blob)?;

        // Step 5: decrypt -> client cert PEM || EC private key PEM.
        let plaintext = crypto::decrypt_aes_gcm(&dek, &response.encrypted_credentials)?;
        let bundle = crypto::parse_bundle(&plaintext)?;
        let client_cert_der = bundle
            .certificates
            .first()
            .ok_or_else(|| CryptoError::Pem("decrypted bundle had no certificate".to_string()))?;
        let client_key_der = bundle
            .private_keys
            .first()
            .ok_or_else(|| CryptoError::Pem("decrypted bundle had no private key".to_string()))?;

        // Step 6: verify the chain to the just-installed root CA.
        crypto::verify_client_chain(client_cert_der, &root_ca_der)?;

        // Step 7: capture previous serial, then atomically write + install.
        let previous_client_serial = self.previous_client_serial.lock().expect("mutex poisoned").clone();
        let new_serial = crypto::serial_hex(client_cert_der)?;
        let client_cert_pem = crypto::encode_certificate(client_cert_der).into_bytes();
        let client_key_pem = crypto::encode_ec_private_key(client_key_der).into_bytes();

        self.trust_store
            .install_client_identity(&new_serial, &client_cert_pem, &client_key_pem)?;

        // Step 8: only after a verified, successful install, drop the old one.
        if let Some(previous) = previous_client_serial {
            if previous != new_serial {
                if let Err(error) = self.trust_store.remove_client_identity(&previous) {
                    warn!(%error, serial = previous, "failed to remove previous client identity (best-effort)");
                }
            }
        }
        *self.previous_client_serial.lock().expect("mutex poisoned") = Some(new_serial.clone());

        info!(serial = new_serial, "credential rotation complete");

        Ok(CredentialBundle {
            root_ca_pem,
            client_cert_pem,
            client_key_pem,
            serial: new_serial,
        })
    }
}

#[async_trait::async_trait]
impl Job for CredentialJob {
    fn id(&self) -> &str {
        "credential-bootstrap"
    }

    fn interval(&self) -> (Duration, bool) {
        (ROTATION_INTERVAL, true)
    }

    async fn should_enable(&self, _token: &CancellationToken) -> bool {
        self.should_enable_inner().await
    }

    async fn run(&self, _token: &CancellationToken) -> (bool, Option<anyhow_like::Error>) {
        match self.run_once().await {
            Ok(_) => (true, None),
            Err(error) => (true, Some(Box::new(error))),
        }
    }
}
