//! Firmware variable reader: read a named firmware variable as raw
//! bytes, using the POSIX efivars layout.

use std::path::{Path, PathBuf};

use thiserror::Error;

pub const ROOT_CA_VAR_NAME: &str = "InstanceRootCACertificate";
pub const ROOT_CA_VAR_GUID: &str = "8be4df61-93ca-11d2-aa0d-00e098032b8c";

#[derive(Debug, Error)]
pub enum FirmwareError {
    #[error("firmware variable `{name}` not present at `{path}`: {source}")]
    NotFound {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("firmware variable `{name}` is malformed: payload shorter than the 4-byte attribute prefix")]
    Truncated { name: String },
}

/// Abstraction over the platform-specific firmware variable store so the
/// credential job never branches on platform directly.
pub trait FirmwareVariableReader: Send + Sync {
    fn read_variable(&self, name: &str, guid: &str) -> Result<Vec<u8>, FirmwareError>;
}

/// POSIX backing store: `/sys/firmware/efi/efivars/<Name>-<GUID>`. The first
/// four bytes are EFI variable attribute flags and must be stripped.
#[derive(Debug, Clone)]
pub struct EfiVarsReader {
    root: PathBuf,
}

impl EfiVarsReader {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/sys/firmware/efi/efivars"),
        }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn variable_path(&self, name: &str, guid: &str) -> PathBuf {
        self.root.join(format!("{name}-{guid}"))
    }
}

impl Default for EfiVarsReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FirmwareVariableReader for EfiVarsReader {
    fn read_variable(&self, name: &str, guid: &str) -> Result<Vec<u8>, FirmwareError> {
        let path = self.variable_path(name, guid);
        let raw = std::fs::read(&path).map_err(|source| FirmwareError::NotFound {
            name: name.to_string(),
            path: path.clone(),
            source,
        })?;
        strip_attribute_prefix(&raw, name)
    }
}

fn strip_attribute_prefix(raw: &[u8], name: &str) -> Result<Vec<u8>, FirmwareError> {
    if raw.len() < 4 {
        return Err(FirmwareError::Truncated {
            name: name.to_string(),
        });
    }
    Ok(raw[4..].to_vec())
}

/// Reads the root CA firmware variable straight from an arbitrary file path,
/// bypassing the `<Name>-<GUID>` naming convention. Used in tests and by
/// deployments that mount the variable at a fixed path.
pub fn read_raw_variable_file(path: &Path) -> Result<Vec<u8>, FirmwareError> {
    let raw = std::fs::read(path).map_err(|source| FirmwareError::NotFound {
        name: path.display().to_string(),
        path: path.to_path_buf(),
        source,
    })?;
    strip_attribute_prefix(&raw, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_four_byte_attribute_prefix() {
        let raw = [0u8, 0, 0, 0, b'h', b'i'];
        let stripped = strip_attribute_prefix(&raw, "x").unwrap();
        assert_eq!(stripped, b"hi");
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let raw = [0u8, 1, 2];
        assert!(strip_attribute_prefix(&raw, "x").is_err());
    }

    #[test]
    fn variable_path_uses_name_dash_guid_convention() {
        let reader = EfiVarsReader::with_root("/tmp/efivars");
        let path = reader.variable_path(ROOT_CA_VAR_NAME, ROOT_CA_VAR_GUID);
        assert_eq!(
            path,
            PathBuf::from(format!(
                "/tmp/efivars/{ROOT_CA_VAR_NAME}-{ROOT_CA_VAR_GUID}"
            ))
        );
    }
}
