//! Layered INI-style configuration.
//!
//! Two files are merged: distro defaults, then user overrides. Both are
//! optional — a missing file degrades to an empty section set rather than
//! an error.

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },
}

fn bool_key(ini: &Ini, section: &str, key: &str) -> Option<bool> {
    ini.get_from(Some(section), key).and_then(|v| match v {
        "1" | "true" | "True" | "yes" => Some(true),
        "0" | "false" | "False" | "no" => Some(false),
        _ => None,
    })
}

fn string_key(ini: &Ini, section: &str, key: &str) -> Option<String> {
    ini.get_from(Some(section), key).map(str::to_string)
}

/// `[MDS]` section: whether the credential bootstrap job runs, and
/// whether it also mirrors credentials into the OS-native trust store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MdsSection {
    pub disable_https_mds_setup: Option<bool>,
    pub enable_native_store: Option<bool>,
}

/// `[Unstable]` section: command monitor and hostname/FQDN toggles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnstableSection {
    pub command_monitor_enabled: bool,
    pub command_pipe_path: Option<String>,
    pub command_pipe_mode: String,
    pub command_pipe_group: String,
    pub command_request_timeout: String,
    pub set_hostname: bool,
    pub set_fqdn: bool,
    pub fqdn_as_hostname: bool,
    pub additional_aliases: Vec<String>,
}

impl Default for UnstableSection {
    fn default() -> Self {
        Self {
            command_monitor_enabled: false,
            command_pipe_path: None,
            command_pipe_mode: "0770".to_string(),
            command_pipe_group: "-1".to_string(),
            command_request_timeout: "10s".to_string(),
            set_hostname: false,
            set_fqdn: false,
            fqdn_as_hostname: false,
            additional_aliases: Vec::new(),
        }
    }
}

/// `[wsfc]` section: Windows Server Failover Cluster health-probe addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WsfcSection {
    pub enabled: bool,
    pub port: Option<u16>,
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountManagerSection {
    pub disable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressManagerSection {
    pub disable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticsSection {
    pub enable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub mds: MdsSection,
    pub unstable_present: bool,
    pub unstable: UnstableSection,
    pub wsfc: WsfcSection,
    pub account_manager: AccountManagerSection,
    pub address_manager: AddressManagerSection,
    pub diagnostics: DiagnosticsSection,
}

impl Config {
    /// Loads distro defaults, then layers user overrides on top. A missing
    /// file at either path is treated as an empty document, not an error.
    pub fn load(distro_defaults: &Path, user_overrides: &Path) -> Result<Self, ConfigError> {
        let base = load_ini_best_effort(distro_defaults)?;
        let overrides = load_ini_best_effort(user_overrides)?;
        Ok(Self::from_layers(&base, &overrides))
    }

    fn from_layers(base: &Ini, overrides: &Ini) -> Self {
        let mut cfg = Config::default();
        cfg.unstable = UnstableSection::default();

        cfg.mds.disable_https_mds_setup =
            first_bool(overrides, base, "MDS", "DisableHTTPSMdsSetup");
        cfg.mds.enable_native_store =
            first_bool(overrides, base, "MDS", "HTTPSMDSEnableNativeStore");

        cfg.unstable_present = base.section(Some("Unstable")).is_some()
            || overrides.section(Some("Unstable")).is_some();
        if let Some(v) = first_bool(overrides, base, "Unstable", "CommandMonitorEnabled") {
            cfg.unstable.command_monitor_enabled = v;
        }
        cfg.unstable.command_pipe_path =
            first_string(overrides, base, "Unstable", "CommandPipePath");
        if let Some(v) = first_string(overrides, base, "Unstable", "CommandPipeMode") {
            cfg.unstable.command_pipe_mode = v;
        }
        if let Some(v) = first_string(overrides, base, "Unstable", "CommandPipeGroup") {
            cfg.unstable.command_pipe_group = v;
        }
        if let Some(v) = first_string(overrides, base, "Unstable", "CommandRequestTimeout") {
            cfg.unstable.command_request_timeout = v;
        }
        if let Some(v) = first_bool(overrides, base, "Unstable", "SetHostname") {
            cfg.unstable.set_hostname = v;
        }
        if let Some(v) = first_bool(overrides, base, "Unstable", "SetFqdn") {
            cfg.unstable.set_fqdn = v;
        }
        if let Some(v) = first_bool(overrides, base, "Unstable", "FqdnAsHostname") {
            cfg.unstable.fqdn_as_hostname = v;
        }
        if let Some(v) = first_string(overrides, base, "Unstable", "AdditionalAliases") {
            cfg.unstable.additional_aliases =
                v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
        }

        if let Some(v) = first_bool(overrides, base, "wsfc", "enabled") {
            cfg.wsfc.enabled = v;
        }
        cfg.wsfc.port = first_string(overrides, base, "wsfc", "port")
            .and_then(|p| p.parse::<u16>().ok());
        if let Some(v) = first_string(overrides, base, "wsfc", "addresses") {
            cfg.wsfc.addresses =
                v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
        }

        if let Some(v) = first_bool(overrides, base, "accountManager", "disable") {
            cfg.account_manager.disable = v;
        }
        if let Some(v) = first_bool(overrides, base, "addressManager", "disable") {
            cfg.address_manager.disable = v;
        }
        if let Some(v) = first_bool(overrides, base, "diagnostics", "enable") {
            cfg.diagnostics.enable = v;
        }

        cfg
    }
}

fn first_bool(overrides: &Ini, base: &Ini, section: &str, key: &str) -> Option<bool> {
    bool_key(overrides, section, key).or_else(|| bool_key(base, section, key))
}

fn first_string(overrides: &Ini, base: &Ini, section: &str, key: &str) -> Option<String> {
    string_key(overrides, section, key).or_else(|| string_key(base, section, key))
}

fn load_ini_best_effort(path: &Path) -> Result<Ini, ConfigError> {
    match Ini::load_from_file(path) {
        Ok(ini) => Ok(ini),
        Err(ini::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
            Ok(Ini::new())
        }
        Err(source) => Err(ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_ini(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn missing_files_yield_defaults() {
        let cfg = Config::load(Path::new("/nonexistent/a.cfg"), Path::new("/nonexistent/b.cfg"))
            .unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn user_overrides_win_over_distro_defaults() {
        let distro = write_ini("[MDS]\nDisableHTTPSMdsSetup=true\n");
        let user = write_ini("[MDS]\nDisableHTTPSMdsSetup=false\n");
        let cfg = Config::load(distro.path(), user.path()).unwrap();
        assert_eq!(cfg.mds.disable_https_mds_setup, Some(false));
    }

    #[test]
    fn falls_back_to_distro_when_user_silent_on_key() {
        let distro = write_ini("[wsfc]\nenabled=true\n");
        let user = write_ini("[wsfc]\nport=59998\n");
        let cfg = Config::load(distro.path(), user.path()).unwrap();
        assert!(cfg.wsfc.enabled);
        assert_eq!(cfg.wsfc.port, Some(59998));
    }

    #[test]
    fn wsfc_addresses_and_aliases_split_on_comma() {
        let user = write_ini(
            "[wsfc]\naddresses=10.0.0.1, 10.0.0.2\n[Unstable]\nAdditionalAliases=a,b, c\n",
        );
        let cfg = Config::load(Path::new("/nonexistent"), user.path()).unwrap();
        assert_eq!(cfg.wsfc.addresses, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(cfg.unstable.additional_aliases, vec!["a", "b", "c"]);
    }
}
