//! PKCS#12 packaging for the Windows certificate store import path:
//! packages the client certificate and private key as PKCS#12 for import
//! into `Cert:\LocalMachine\My`.
//!
//! Not exercised on POSIX hosts; `windows_trust_store_install` is the only
//! caller. Uses `openssl`'s PKCS#12 builder rather than hand-rolling ASN.1,
//! since the in-process store import needs a real, Windows-importable
//! archive, not just a byte format we can parse back ourselves.

#![cfg(windows)]

use openssl::ec::EcKey;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::PKey;
use openssl::x509::X509;
use zeroize::Zeroizing;

use super::CryptoError;

/// Builds a password-protected PKCS#12 archive from a DER certificate and
/// matching DER (SEC1) EC private key. The password is ephemeral: it only
/// needs to survive the in-process hand-off to the Windows import call.
pub fn package(cert_der: &[u8], ec_private_key_der: &[u8], password: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let cert = X509::from_der(cert_der).map_err(|e| CryptoError::Pkcs12(e.to_string()))?;
    let ec_key =
        EcKey::private_key_from_der(ec_private_key_der).map_err(|e| CryptoError::Pkcs12(e.to_string()))?;
    let pkey = PKey::from_ec_key(ec_key).map_err(|e| CryptoError::Pkcs12(e.to_string()))?;

    let archive = Pkcs12::builder()
        .name("guest-mtls-credential")
        .pkey(&pkey)
        .cert(&cert)
        .build2(password)
        .map_err(|e| CryptoError::Pkcs12(e.to_string()))?;

    let der = archive
        .to_der()
        .map_err(|e| CryptoError::Pkcs12(e.to_string()))?;
    Ok(Zeroizing::new(der))
}
