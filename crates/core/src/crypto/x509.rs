//! X.509 verification against a root pool.
//!
//! Only what the credential job needs: does `leaf` chain to `root` with a
//! client-auth-compatible key usage.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use x509_parser::certificate::X509Certificate;

use super::CryptoError;

pub fn verify_client_chain(leaf_der: &[u8], root_der: &[u8]) -> Result<(), CryptoError> {
    let (_, leaf) = x509_parser::parse_x509_certificate(leaf_der)
        .map_err(|e| CryptoError::X509(e.to_string()))?;
    let (_, root) = x509_parser::parse_x509_certificate(root_der)
        .map_err(|e| CryptoError::X509(e.to_string()))?;

    if leaf.issuer() != root.subject() {
        return Err(CryptoError::X509(
            "client certificate issuer does not match root CA subject".to_string(),
        ));
    }

    leaf.verify_signature(Some(root.public_key()))
        .map_err(|e| CryptoError::X509(format!("signature verification failed: {e}")))?;

    if !within_validity(&leaf) {
        return Err(CryptoError::X509(
            "client certificate is expired or not yet valid".to_string(),
        ));
    }

    if !has_client_auth_key_usage(&leaf) {
        return Err(CryptoError::X509(
            "client certificate is missing a client-auth-compatible key usage".to_string(),
        ));
    }

    Ok(())
}

fn within_validity(cert: &X509Certificate<'_>) -> bool {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs() as i64;
    cert.validity.not_before.timestamp() <= now && now <= cert.validity.not_after.timestamp()
}

fn has_client_auth_key_usage(cert: &X509Certificate<'_>) -> bool {
    let digital_signature_or_key_agreement = cert
        .key_usage()
        .ok()
        .flatten()
        .map(|ku| ku.value.digital_signature() || ku.value.key_agreement())
        .unwrap_or(true); // absent key-usage extension: don't block on it

    let extended_key_usage_ok = cert
        .extended_key_usage()
        .ok()
        .flatten()
        .map(|eku| eku.value.client_auth || eku.value.any)
        .unwrap_or(true);

    digital_signature_or_key_agreement && extended_key_usage_ok
}

/// Returns the certificate's serial number as a lowercase hex string, used
/// for rotation cleanup tracking.
pub fn serial_hex(der: &[u8]) -> Result<String, CryptoError> {
    let (_, cert) =
        x509_parser::parse_x509_certificate(der).map_err(|e| CryptoError::X509(e.to_string()))?;
    Ok(hex::encode(cert.raw_serial()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_der_bytes_fail_to_parse_rather_than_panic() {
        let bogus = [0u8, 1, 2, 3];
        assert!(verify_client_chain(&bogus, &bogus).is_err());
    }
}
