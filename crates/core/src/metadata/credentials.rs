//! Wire shapes for `instance/credentials/certs`.

use serde::{Deserialize, Serialize};

/// TPM-wrapped key material. Opaque to everything except the TPM adapter;
/// fields are raw bytes exactly as received from the metadata server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportBlob {
    #[serde(with = "hex_bytes")]
    pub duplicate: Vec<u8>,
    #[serde(rename = "encryptedSeed", with = "hex_bytes")]
    pub encrypted_seed: Vec<u8>,
    #[serde(rename = "publicArea", with = "hex_bytes")]
    pub public_area: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuestCredentialsResponse {
    #[serde(rename = "encryptedCredentials", with = "hex_bytes")]
    pub encrypted_credentials: Vec<u8>,
    #[serde(rename = "keyImportBlob")]
    pub key_import_blob: ImportBlob,
}

/// The metadata server encodes binary fields as hex strings inside the JSON
/// envelope; this module adapts that to `Vec<u8>` at the serde boundary.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
