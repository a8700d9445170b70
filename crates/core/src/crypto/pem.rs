//! PEM parsing helpers.

use rustls_pemfile::Item;

use super::CryptoError;

/// One or more concatenated PEM blocks, split by type. Mirrors the
/// credential bundle's "cert PEM concatenated with EC private key PEM"
/// layout.
#[derive(Debug, Default, Clone)]
pub struct PemBundle {
    pub certificates: Vec<Vec<u8>>,
    pub private_keys: Vec<Vec<u8>>,
}

pub fn parse_bundle(pem_bytes: &[u8]) -> Result<PemBundle, CryptoError> {
    let mut reader = std::io::Cursor::new(pem_bytes);
    let mut bundle = PemBundle::default();
    for item in rustls_pemfile::read_all(&mut reader) {
        match item.map_err(|e| CryptoError::Pem(e.to_string()))? {
            Item::X509Certificate(der) => bundle.certificates.push(der.to_vec()),
            Item::Pkcs8Key(der) | Item::Sec1Key(der) | Item::Pkcs1Key(der) => {
                bundle.private_keys.push(der.to_vec())
            }
            _ => {}
        }
    }
    if bundle.certificates.is_empty() && bundle.private_keys.is_empty() {
        return Err(CryptoError::Pem("no PEM blocks found".to_string()));
    }
    Ok(bundle)
}

pub fn parse_single_certificate(pem_bytes: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let bundle = parse_bundle(pem_bytes)?;
    bundle
        .certificates
        .into_iter()
        .next()
        .ok_or_else(|| CryptoError::Pem("expected exactly one certificate".to_string()))
}

pub fn encode_certificate(der: &[u8]) -> String {
    pem_encode("CERTIFICATE", der)
}

pub fn encode_ec_private_key(der: &[u8]) -> String {
    pem_encode("EC PRIVATE KEY", der)
}

fn pem_encode(label: &str, der: &[u8]) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use std::fmt::Write as _;

    const LINE_LEN: usize = 64;
    let encoded = STANDARD.encode(der);
    let mut out = String::new();
    let _ = writeln!(out, "-----BEGIN {label}-----");
    for chunk in encoded.as_bytes().chunks(LINE_LEN) {
        let _ = writeln!(out, "{}", std::str::from_utf8(chunk).expect("base64 is ASCII"));
    }
    let _ = writeln!(out, "-----END {label}-----");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_small_certificate_like_blob() {
        let der = b"not-a-real-certificate-but-stable-bytes";
        let pem = encode_certificate(der);
        let bundle = parse_bundle(pem.as_bytes()).unwrap();
        assert_eq!(bundle.certificates[0], der);
    }
}
