//! Hostname / FQDN reconciler: atomic hosts-file rewrite plus the OS
//! hostname/syslog-restart flow.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

use crate::paths::{HOSTS_GOOGLE_SUFFIX, HOSTS_NEWLINE, METADATA_HOSTS_ENTRY};

#[derive(Debug, Error)]
pub enum HostnameError {
    #[error("refusing to set hostname to the disallowed value {0:?}")]
    Disallowed(String),
    #[error("failed to set OS hostname: {0}")]
    SetHostname(String),
    #[error("failed to restart syslog: {0}")]
    RestartSyslog(String),
    #[error("failed to read or write hosts file {path}: {source}")]
    HostsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Status codes for `agent.hostname.reconfigurehostname`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconfigureStatus {
    Ok = 0,
    HostnameFailed = 1,
    FqdnFailed = 2,
    BothFailed = 3,
}

pub struct ReconfigureOutcome {
    pub status: ReconfigureStatus,
    pub status_message: String,
    pub hostname: String,
    pub fqdn: String,
}

const DISALLOWED: [&str; 2] = ["", "metadata.google.internal"];

pub struct HostnameReconciler {
    state: Mutex<State>,
    hosts_path: PathBuf,
    set_hostname_enabled: bool,
    set_fqdn_enabled: bool,
    fqdn_as_hostname: bool,
    additional_aliases: Vec<String>,
}

#[derive(Default)]
struct State {
    hostname: String,
    fqdn: String,
}

impl HostnameReconciler {
    pub fn new(
        hosts_path: PathBuf,
        set_hostname_enabled: bool,
        set_fqdn_enabled: bool,
        fqdn_as_hostname: bool,
        additional_aliases: Vec<String>,
    ) -> Self {
        Self {
            state: Mutex::new(State::default()),
            hosts_path,
            set_hostname_enabled,
            set_fqdn_enabled,
            fqdn_as_hostname,
            additional_aliases,
        }
    }

    /// Idempotent reconfigure operation. Serializes against other concurrent
    /// reconfigure calls via the internal mutex — concurrent command-monitor
    /// calls are safe but sequential.
    pub async fn reconfigure(
        &self,
        hostname: &str,
        fqdn: &str,
        interface_addrs: &[String],
    ) -> ReconfigureOutcome {
        let mut guard = self.state.lock().await;

        if DISALLOWED.contains(&hostname) || (self.set_fqdn_enabled && DISALLOWED.contains(&fqdn)) {
            let message = format!(
                "hostname or fqdn is disallowed: hostname={hostname:?} fqdn={fqdn:?}"
            );
            return ReconfigureOutcome {
                status: ReconfigureStatus::BothFailed,
                status_message: message,
                hostname: hostname.to_string(),
                fqdn: fqdn.to_string(),
            };
        }

        let wanted_hostname = if self.fqdn_as_hostname { fqdn } else { hostname };

        let hostname_result = if self.set_hostname_enabled {
            self.set_os_hostname(wanted_hostname).await
        } else {
            Ok(())
        };

        let fqdn_result = if self.set_fqdn_enabled {
            self.write_hosts(fqdn, hostname, interface_addrs)
        } else {
            Ok(())
        };

        guard.hostname = hostname.to_string();
        guard.fqdn = fqdn.to_string();

        let (status, message) = match (&hostname_result, &fqdn_result) {
            (Ok(()), Ok(())) => (ReconfigureStatus::Ok, String::new()),
            (Err(h), Ok(())) => (ReconfigureStatus::HostnameFailed, h.to_string()),
            (Ok(()), Err(f)) => (ReconfigureStatus::FqdnFailed, f.to_string()),
            (Err(h), Err(f)) => (ReconfigureStatus::BothFailed, format!("{h}; {f}")),
        };

        ReconfigureOutcome {
            status,
            status_message: message,
            hostname: hostname.to_string(),
            fqdn: fqdn.to_string(),
        }
    }

    async fn set_os_hostname(&self, hostname: &str) -> Result<(), HostnameError> {
        #[cfg(unix)]
        {
            nix::unistd::sethostname(hostname).map_err(|e| HostnameError::SetHostname(e.to_string()))?;
        }
        #[cfg(not(unix))]
        {
            let _ = hostname;
        }
        self.restart_syslog().await
    }

    async fn restart_syslog(&self) -> Result<(), HostnameError> {
        if try_restart(&["nmcli", "general", "reload"]).await.is_ok() {
            return Ok(());
        }
        if try_restart(&["systemctl", "restart", "rsyslog"]).await.is_ok() {
            return Ok(());
        }
        try_restart(&["pkill", "-HUP", "syslogd"])
            .await
            .map_err(HostnameError::RestartSyslog)
    }

    /// `writeHosts` contract: drop prior Google-added lines, append the
    /// fixed metadata entry, then one line per non-loopback interface
    /// address, overwriting the file atomically while preserving
    /// mode/ownership.
    fn write_hosts(&self, fqdn: &str, hostname: &str, interface_addrs: &[String]) -> Result<(), HostnameError> {
        let existing = std::fs::read_to_string(&self.hosts_path).unwrap_or_default();
        let preserved: Vec<&str> = existing
            .lines()
            .filter(|line| !line.trim_end().ends_with(HOSTS_GOOGLE_SUFFIX) && !line.trim().is_empty())
            .collect();

        let mut out = String::new();
        for line in &preserved {
            out.push_str(line);
            out.push_str(HOSTS_NEWLINE);
        }
        out.push_str(METADATA_HOSTS_ENTRY);
        out.push_str(HOSTS_NEWLINE);

        for addr in interface_addrs {
            if is_loopback(addr) {
                continue;
            }
            let ip_only = addr.split('/').next().unwrap_or(addr);
            let mut line = format!("{ip_only} {fqdn} {hostname}");
            for alias in &self.additional_aliases {
                line.push(' ');
                line.push_str(alias);
            }
            line.push(' ');
            line.push_str(HOSTS_GOOGLE_SUFFIX);
            out.push_str(&line);
            out.push_str(HOSTS_NEWLINE);
        }

        write_atomic_preserving_metadata(&self.hosts_path, out.as_bytes())
    }
}

async fn try_restart(argv: &[&str]) -> Result<(), String> {
    let mut command = crate::process::command_on_path(argv[0]);
    command.args(&argv[1..]);
    crate::process::run_checked(argv[0], command)
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}

fn is_loopback(addr: &str) -> bool {
    let ip_only = addr.split('/').next().unwrap_or(addr);
    ip_only == "127.0.0.1" || ip_only == "::1" || ip_only.starts_with("127.")
}

fn write_atomic_preserving_metadata(path: &Path, contents: &[u8]) -> Result<(), HostnameError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let previous_metadata = std::fs::metadata(path).ok();

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|source| HostnameError::HostsFile {
        path: path.to_path_buf(),
        source,
    })?;
    use std::io::Write as _;
    tmp.write_all(contents).map_err(|source| HostnameError::HostsFile {
        path: path.to_path_buf(),
        source,
    })?;

    #[cfg(unix)]
    if let Some(metadata) = &previous_metadata {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(metadata.permissions().mode()));
    }

    tmp.persist(path).map_err(|e| HostnameError::HostsFile {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn reconciler_for(path: PathBuf) -> HostnameReconciler {
        HostnameReconciler::new(path, false, true, false, Vec::new())
    }

    #[tokio::test]
    async fn disallowed_fqdn_is_rejected_regardless_of_hostname() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let reconciler = reconciler_for(tmp.path().to_path_buf());
        let outcome = reconciler
            .reconfigure("vm1", "metadata.google.internal", &[])
            .await;
        assert_eq!(outcome.status, ReconfigureStatus::BothFailed);
    }

    #[tokio::test]
    async fn write_hosts_is_idempotent_and_drops_loopback() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "10.9.9.9 old-custom-entry").unwrap();
        let reconciler = reconciler_for(tmp.path().to_path_buf());

        let addrs = vec![
            "10.0.0.10/16".to_string(),
            "127.0.0.1/8".to_string(),
            "::1/128".to_string(),
        ];

        reconciler
            .reconfigure("vm1", "vm1.example.internal", &addrs)
            .await;
        let first = std::fs::read_to_string(tmp.path()).unwrap();

        reconciler
            .reconfigure("vm1", "vm1.example.internal", &addrs)
            .await;
        let second = std::fs::read_to_string(tmp.path()).unwrap();

        assert_eq!(first, second);
        assert!(first.contains("old-custom-entry"));
        assert!(first.contains(METADATA_HOSTS_ENTRY));
        assert!(!first.contains("127.0.0.1 vm1.example.internal"));
        assert!(first.contains("10.0.0.10/16 vm1.example.internal vm1"));
    }
}
