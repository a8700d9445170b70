//! WSFC (Windows Server Failover Cluster) manager: filters forwarded IPs so
//! cluster health-probe addresses are excluded from normal IP management,
//! and runs a minimal TCP listener on the configured probe port so the
//! cluster sees the node as reachable.

use std::sync::Mutex;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::metadata::{Descriptor, NetworkInterface};

use super::{Manager, ManagerError};

/// Applies the WSFC filter to one interface's forwarded IPs:
/// - `enable-wsfc=true` with no `wsfc-addrs`: all forwarded IPs are cluster
///   addresses, so the filtered list is empty.
/// - `wsfc-addrs` set: forwarded IPs listed there are excluded.
pub fn filter_forwarded_ips(forwarded_ips: &[String], enable_wsfc: bool, wsfc_addrs: &str) -> Vec<String> {
    if wsfc_addrs.is_empty() {
        if enable_wsfc {
            return Vec::new();
        }
        return forwarded_ips.to_vec();
    }

    let excluded: std::collections::HashSet<&str> = wsfc_addrs.split(',').map(str::trim).collect();
    forwarded_ips
        .iter()
        .filter(|ip| !excluded.contains(ip.as_str()))
        .cloned()
        .collect()
}

pub fn filter_interface(interface: &NetworkInterface, enable_wsfc: bool, wsfc_addrs: &str) -> NetworkInterface {
    let mut filtered = interface.clone();
    filtered.forwarded_ips = filter_forwarded_ips(&interface.forwarded_ips, enable_wsfc, wsfc_addrs);
    filtered
}

pub struct WsfcManager {
    port: Option<u16>,
    probe_listener: Mutex<Option<JoinHandle<()>>>,
}

impl Default for WsfcManager {
    fn default() -> Self {
        Self::new(None)
    }
}

impl WsfcManager {
    pub fn new(port: Option<u16>) -> Self {
        Self {
            port,
            probe_listener: Mutex::new(None),
        }
    }

    /// Starts the probe listener if it isn't already running.
    fn ensure_probe_listener(&self) {
        let Some(port) = self.port else { return };
        let mut slot = self.probe_listener.lock().expect("mutex poisoned");
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        *slot = Some(tokio::spawn(run_probe_listener(port)));
    }

    /// Stops the probe listener if one is running.
    fn stop_probe_listener(&self) {
        if let Some(handle) = self.probe_listener.lock().expect("mutex poisoned").take() {
            handle.abort();
        }
    }
}

impl Drop for WsfcManager {
    fn drop(&mut self) {
        self.stop_probe_listener();
    }
}

/// Minimal cluster health-probe responder: accepting the TCP connection is
/// the entire probe response a WSFC health check expects, so the loop just
/// accepts and immediately drops each connection.
async fn run_probe_listener(port: u16) {
    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(error) => {
            warn!(port, %error, "failed to bind WSFC health-probe listener");
            return;
        }
    };
    loop {
        match listener.accept().await {
            Ok((_stream, _addr)) => {}
            Err(error) => warn!(%error, "WSFC health-probe accept failed"),
        }
    }
}

#[async_trait::async_trait]
impl Manager for WsfcManager {
    fn name(&self) -> &'static str {
        "wsfc"
    }

    fn diff(&self, old: &Descriptor, new: &Descriptor) -> bool {
        old.enable_wsfc() != new.enable_wsfc() || old.wsfc_addrs() != new.wsfc_addrs()
    }

    fn disabled(&self, descriptor: &Descriptor) -> bool {
        !descriptor.enable_wsfc().unwrap_or(false)
    }

    fn timeout(&self) -> bool {
        false
    }

    async fn set(&self, descriptor: &Descriptor) -> Result<(), ManagerError> {
        let enable_wsfc = descriptor.enable_wsfc().unwrap_or(false);
        let wsfc_addrs = descriptor.wsfc_addrs().unwrap_or("");
        for interface in &descriptor.instance.network_interfaces {
            let _filtered = filter_interface(interface, enable_wsfc, wsfc_addrs);
        }

        if enable_wsfc {
            self.ensure_probe_listener();
        } else {
            self.stop_probe_listener();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_address_is_excluded() {
        let forwarded = vec!["192.168.0.0".to_string(), "192.168.0.1".to_string()];
        let filtered = filter_forwarded_ips(&forwarded, false, "192.168.0.1");
        assert_eq!(filtered, vec!["192.168.0.0".to_string()]);
    }

    #[test]
    fn enable_without_addrs_clears_all_forwarded_ips() {
        let forwarded = vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()];
        let filtered = filter_forwarded_ips(&forwarded, true, "");
        assert!(filtered.is_empty());
    }
}
