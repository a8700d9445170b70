//! Platform-specific filesystem layout: credential paths, command-monitor
//! socket path, and the hosts file location.

use std::path::PathBuf;

#[cfg(unix)]
pub fn root_ca_path() -> PathBuf {
    PathBuf::from("/run/google-mds-mtls/root.crt")
}

#[cfg(unix)]
pub fn client_key_path() -> PathBuf {
    PathBuf::from("/run/google-mds-mtls/client.key")
}

#[cfg(unix)]
pub fn command_socket_path() -> PathBuf {
    PathBuf::from("/run/google-guest-agent/commands.sock")
}

#[cfg(unix)]
pub fn hosts_file_path() -> PathBuf {
    PathBuf::from("/etc/hosts")
}

#[cfg(unix)]
pub fn address_registry_dir() -> PathBuf {
    PathBuf::from("/var/lib/google-guest-agent/addresses")
}

#[cfg(unix)]
pub const HOSTS_NEWLINE: &str = "\n";

#[cfg(windows)]
pub fn root_ca_path() -> PathBuf {
    program_data().join("Google").join("Compute Engine").join("mds-mtls-root.crt")
}

#[cfg(windows)]
pub fn client_key_path() -> PathBuf {
    program_data().join("Google").join("Compute Engine").join("mds-mtls-client.key")
}

#[cfg(windows)]
pub fn client_pfx_path() -> PathBuf {
    let mut name = client_key_path().into_os_string();
    name.push(".pfx");
    PathBuf::from(name)
}

#[cfg(windows)]
pub fn command_pipe_path() -> &'static str {
    r"\\.\pipe\google-guest-agent-commands"
}

#[cfg(windows)]
pub fn hosts_file_path() -> PathBuf {
    PathBuf::from(r"C:\Windows\System32\Drivers\etc\hosts")
}

#[cfg(windows)]
pub fn address_registry_dir() -> PathBuf {
    program_data().join("Google").join("Compute Engine").join("addresses")
}

#[cfg(windows)]
pub const HOSTS_NEWLINE: &str = "\r\n";

#[cfg(windows)]
fn program_data() -> PathBuf {
    std::env::var_os("ProgramData")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(r"C:\ProgramData"))
}

pub const METADATA_HOSTS_ENTRY: &str = "169.254.169.254 metadata.google.internal # Added by Google";
pub const HOSTS_GOOGLE_SUFFIX: &str = "# Added by Google";

pub const CREDENTIALS_METADATA_KEY: &str = "instance/credentials/certs";
