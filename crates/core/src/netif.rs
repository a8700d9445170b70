//! Local network-interface address enumeration, used to derive the
//! hosts-file address list from the VM's actual configured interfaces
//! rather than from cloud-reported forwarded IPs.

#[cfg(unix)]
pub fn local_interface_addrs() -> Vec<String> {
    use nix::ifaddrs::getifaddrs;
    use nix::net::if_::InterfaceFlags;

    let addrs = match getifaddrs() {
        Ok(addrs) => addrs,
        Err(error) => {
            tracing::warn!(%error, "failed to enumerate local network interfaces");
            return Vec::new();
        }
    };

    addrs
        .filter(|ifaddr| !ifaddr.flags.contains(InterfaceFlags::IFF_LOOPBACK))
        .filter_map(|ifaddr| {
            let address = ifaddr.address?;
            if let Some(sin) = address.as_sockaddr_in() {
                Some(sin.ip().to_string())
            } else if let Some(sin6) = address.as_sockaddr_in6() {
                Some(sin6.ip().to_string())
            } else {
                None
            }
        })
        .collect()
}

#[cfg(not(unix))]
pub fn local_interface_addrs() -> Vec<String> {
    Vec::new()
}
