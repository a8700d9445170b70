//! Address manager: installs/removes secondary (forwarded) IP addresses per
//! interface, tracked against a registry so the agent only ever touches IPs
//! it itself added.

use std::collections::HashSet;
use std::time::Duration;

use tracing::warn;

use crate::metadata::Descriptor;

use super::{Manager, ManagerError};

/// `compareIPs`:
/// - `toAdd = mdFwdIPs \ cfgIPs`
/// - `toRm = (regFwdIPs ∩ cfgIPs) \ mdFwdIPs`
pub fn compare_ips(
    registered: &HashSet<String>,
    from_metadata: &HashSet<String>,
    configured: &HashSet<String>,
) -> (Vec<String>, Vec<String>) {
    let mut to_add: Vec<String> = from_metadata.difference(configured).cloned().collect();
    let mut to_remove: Vec<String> = registered
        .intersection(configured)
        .filter(|ip| !from_metadata.contains(*ip))
        .cloned()
        .collect();
    to_add.sort();
    to_remove.sort();
    (to_add, to_remove)
}

/// Re-applies forwarded IPs on a ~70s tick even without a metadata diff.
const REAPPLY_TIMEOUT: Duration = Duration::from_secs(70);

pub struct AddressManager {
    last_applied: std::sync::Mutex<std::time::Instant>,
    config_disabled: bool,
}

impl Default for AddressManager {
    fn default() -> Self {
        Self::new(false)
    }
}

impl AddressManager {
    pub fn new(config_disabled: bool) -> Self {
        Self {
            last_applied: std::sync::Mutex::new(std::time::Instant::now() - REAPPLY_TIMEOUT),
            config_disabled,
        }
    }

    fn due_for_reapply(&self) -> bool {
        let last = *self.last_applied.lock().expect("mutex poisoned");
        last.elapsed() >= REAPPLY_TIMEOUT
    }
}

#[async_trait::async_trait]
impl Manager for AddressManager {
    fn name(&self) -> &'static str {
        "address"
    }

    fn diff(&self, old: &Descriptor, new: &Descriptor) -> bool {
        old.instance.network_interfaces != new.instance.network_interfaces
    }

    fn disabled(&self, descriptor: &Descriptor) -> bool {
        self.config_disabled || descriptor.disable_address_manager().unwrap_or(false)
    }

    fn timeout(&self) -> bool {
        self.due_for_reapply()
    }

    async fn set(&self, descriptor: &Descriptor) -> Result<(), ManagerError> {
        for interface in &descriptor.instance.network_interfaces {
            let from_metadata: HashSet<String> = interface.forwarded_ips.iter().cloned().collect();
            let mut registered = read_registry(&interface.mac);
            let configured = read_configured(&interface.mac).await;

            let (to_add, to_remove) = compare_ips(&registered, &from_metadata, &configured);

            for ip in &to_add {
                match add_ip(&interface.mac, ip).await {
                    Ok(()) => {
                        registered.insert(ip.clone());
                    }
                    Err(error) => {
                        warn!(mac = %interface.mac, ip, %error, "failed to add forwarded IP, continuing");
                    }
                }
            }
            for ip in &to_remove {
                match remove_ip(&interface.mac, ip).await {
                    Ok(()) => {
                        registered.remove(ip);
                    }
                    Err(error) => {
                        warn!(mac = %interface.mac, ip, %error, "failed to remove forwarded IP, continuing");
                    }
                }
            }

            if !to_add.is_empty() || !to_remove.is_empty() {
                if let Err(error) = write_registry(&interface.mac, &registered) {
                    warn!(mac = %interface.mac, %error, "failed to persist forwarded-IP registry");
                }
            }
        }
        *self.last_applied.lock().expect("mutex poisoned") = std::time::Instant::now();
        Ok(())
    }
}

/// Sanitizes a MAC address into a filename-safe registry key.
fn registry_file_name(mac: &str) -> String {
    mac.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        + ".json"
}

fn registry_path(mac: &str) -> std::path::PathBuf {
    crate::paths::address_registry_dir().join(registry_file_name(mac))
}

/// Reads the on-disk, per-MAC forwarded-IP registry. A missing or
/// unreadable registry reads as empty rather than an error — the agent has
/// simply never recorded ownership of any IP on that interface yet.
fn read_registry(mac: &str) -> HashSet<String> {
    let path = registry_path(mac);
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str::<Vec<String>>(&contents)
            .map(|ips| ips.into_iter().collect())
            .unwrap_or_default(),
        Err(_) => HashSet::new(),
    }
}

/// Atomically rewrites the per-MAC registry file with the current set of
/// agent-owned IPs.
fn write_registry(mac: &str, ips: &HashSet<String>) -> std::io::Result<()> {
    let dir = crate::paths::address_registry_dir();
    std::fs::create_dir_all(&dir)?;
    let mut sorted: Vec<&String> = ips.iter().collect();
    sorted.sort();
    let body = serde_json::to_string(&sorted)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    use std::io::Write as _;
    tmp.write_all(body.as_bytes())?;
    tmp.persist(registry_path(mac))
        .map_err(|e| e.error)?;
    Ok(())
}

/// Queries the interface's actually-configured addresses via `ip addr show`,
/// so `compare_ips`'s `registered ∩ configured` only ever removes an IP the
/// agent both owns and still sees applied to the interface.
async fn read_configured(mac: &str) -> HashSet<String> {
    let mut command = crate::process::command_on_path("ip");
    command.args(["-o", "addr", "show", "dev", mac]);
    match crate::process::run("ip addr show", command).await {
        Ok(output) if output.status.success() => parse_configured_addrs(&String::from_utf8_lossy(&output.stdout)),
        Ok(output) => {
            warn!(mac, status = %output.status, "ip addr show failed, treating interface as unconfigured");
            HashSet::new()
        }
        Err(error) => {
            warn!(mac, %error, "failed to query configured addresses");
            HashSet::new()
        }
    }
}

/// Parses `ip -o addr show` output lines of the form
/// `2: eth0    inet 10.0.0.5/24 brd ... scope global eth0` into the set of
/// `inet`/`inet6` CIDR strings.
fn parse_configured_addrs(output: &str) -> HashSet<String> {
    let mut addrs = HashSet::new();
    for line in output.lines() {
        let mut fields = line.split_whitespace();
        while let Some(field) = fields.next() {
            if field == "inet" || field == "inet6" {
                if let Some(addr) = fields.next() {
                    addrs.insert(addr.to_string());
                }
            }
        }
    }
    addrs
}

async fn add_ip(mac: &str, ip: &str) -> Result<(), ManagerError> {
    let mut command = crate::process::command_on_path("ip");
    command.args(["addr", "add", ip, "dev", mac]);
    crate::process::run_checked("ip addr add", command)
        .await
        .map_err(|e| ManagerError::Address(e.to_string()))?;
    Ok(())
}

async fn remove_ip(mac: &str, ip: &str) -> Result<(), ManagerError> {
    let mut command = crate::process::command_on_path("ip");
    command.args(["addr", "del", ip, "dev", mac]);
    crate::process::run_checked("ip addr del", command)
        .await
        .map_err(|e| ManagerError::Address(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn example_one_add_only() {
        let (add, rm) = compare_ips(&set(&["1.2.3.4"]), &set(&["1.2.3.4"]), &set(&[]));
        assert_eq!(add, vec!["1.2.3.4".to_string()]);
        assert!(rm.is_empty());
    }

    #[test]
    fn example_two_remove_only() {
        let (add, rm) = compare_ips(&set(&["1.2.3.4"]), &set(&[]), &set(&["1.2.3.4"]));
        assert!(add.is_empty());
        assert_eq!(rm, vec!["1.2.3.4".to_string()]);
    }

    #[test]
    fn example_three_no_op() {
        let (add, rm) = compare_ips(&set(&[]), &set(&["1.2.3.4"]), &set(&["1.2.3.4"]));
        assert!(add.is_empty());
        assert!(rm.is_empty());
    }

    #[test]
    fn parses_inet_and_inet6_lines_from_ip_addr_show() {
        let output = "2: eth0    inet 10.0.0.5/24 brd 10.0.0.255 scope global eth0\\       valid_lft forever preferred_lft forever\n2: eth0    inet6 fe80::1/64 scope link\n";
        let addrs = parse_configured_addrs(output);
        assert_eq!(addrs, set(&["10.0.0.5/24", "fe80::1/64"]));
    }

    #[test]
    fn registry_file_name_sanitizes_mac_separators() {
        assert_eq!(registry_file_name("aa:bb:cc:dd:ee:ff"), "aa_bb_cc_dd_ee_ff.json");
    }
}
