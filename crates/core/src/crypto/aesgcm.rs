//! AES-GCM decryption of the encrypted credential bundle: decrypts
//! `encryptedCredentials` using AES-GCM with the DEK and no associated data.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use zeroize::Zeroizing;

use super::CryptoError;

const NONCE_LEN: usize = 12;

/// `ciphertext` is `nonce (12 bytes) || AES-GCM ciphertext+tag`, the layout
/// the metadata service emits for `encryptedCredentials`.
pub fn decrypt(dek: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if ciphertext.len() < NONCE_LEN {
        return Err(CryptoError::AesGcm(
            "ciphertext shorter than the nonce prefix".to_string(),
        ));
    }
    let (nonce_bytes, body) = ciphertext.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher =
        Aes256Gcm::new_from_slice(dek).map_err(|e| CryptoError::AesGcm(e.to_string()))?;
    let plaintext = cipher
        .decrypt(nonce, body)
        .map_err(|_| CryptoError::AesGcm("decryption failed: bad key or corrupt ciphertext".to_string()))?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_gcm::aead::generic_array::GenericArray;

    #[test]
    fn round_trips_a_plaintext_blob() {
        let key = [7u8; 32];
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&key));
        let nonce_bytes = [1u8; NONCE_LEN];
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher.encrypt(nonce, b"hello credentials".as_ref()).unwrap();

        let mut framed = nonce_bytes.to_vec();
        framed.extend_from_slice(&ciphertext);

        let plaintext = decrypt(&key, &framed).unwrap();
        assert_eq!(&plaintext[..], b"hello credentials");
    }

    #[test]
    fn rejects_truncated_ciphertext() {
        assert!(decrypt(&[0u8; 32], &[1, 2, 3]).is_err());
    }
}
