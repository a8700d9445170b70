//! Cryptographic primitives: PEM parsing, X.509 chain verification
//! against a root pool, AES-GCM decryption, and Windows PKCS#12 packaging.

mod aesgcm;
#[cfg(windows)]
mod pkcs12;
mod pem;
mod x509;

pub use aesgcm::decrypt as decrypt_aes_gcm;
pub use pem::{encode_certificate, encode_ec_private_key, parse_bundle, parse_single_certificate, PemBundle};
#[cfg(windows)]
pub use pkcs12::package as package_pkcs12;
pub use x509::{serial_hex, verify_client_chain};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("PEM error: {0}")]
    Pem(String),
    #[error("X.509 error: {0}")]
    X509(String),
    #[error("AES-GCM error: {0}")]
    AesGcm(String),
    #[cfg(windows)]
    #[error("PKCS#12 error: {0}")]
    Pkcs12(String),
}
