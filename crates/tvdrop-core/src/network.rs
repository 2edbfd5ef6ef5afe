//! Local address discovery for the advertised URL.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// IPv4 addresses of the non-loopback, non-link-local interfaces.
///
/// Private (LAN) addresses are listed first.
#[must_use]
pub fn local_ipv4_addrs() -> Vec<Ipv4Addr> {
    let Ok(interfaces) = if_addrs::get_if_addrs() else {
        return Vec::new();
    };

    let mut addrs: Vec<Ipv4Addr> = interfaces
        .into_iter()
        .filter(|iface| !iface.is_loopback())
        .filter_map(|iface| match iface.ip() {
            IpAddr::V4(ip) if is_reachable(ip) => Some(ip),
            _ => None,
        })
        .collect();

    addrs.sort_by_key(|ip| !ip.is_private());
    addrs.dedup();
    addrs
}

/// Best guess at the address other devices on the LAN can reach us on.
///
/// Falls back to the address of the default route when interface
/// enumeration finds nothing.
#[must_use]
pub fn local_ipv4() -> Option<Ipv4Addr> {
    local_ipv4_addrs().into_iter().next().or_else(default_route_ipv4)
}

/// URL clients should open, `http://localhost:{port}` when no LAN address
/// is known.
#[must_use]
pub fn advertised_url(lan_ip: Option<Ipv4Addr>, port: u16) -> String {
    match lan_ip {
        Some(ip) => format!("http://{ip}:{port}"),
        None => format!("http://localhost:{port}"),
    }
}

/// Host name shown to clients, `"TvDrop"` if it cannot be read.
#[must_use]
pub fn device_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "TvDrop".to_string())
}

fn is_reachable(ip: Ipv4Addr) -> bool {
    !ip.is_loopback() && !ip.is_link_local() && !ip.is_unspecified()
}

// No packets are sent; connecting a UDP socket only selects a route.
fn default_route_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if is_reachable(ip) => Some(ip),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses_are_usable() {
        for ip in local_ipv4_addrs() {
            assert!(!ip.is_loopback());
            assert!(!ip.is_link_local());
        }
    }

    #[test]
    fn test_advertised_url_shape() {
        assert_eq!(
            advertised_url(Some(Ipv4Addr::new(192, 168, 1, 20)), 8080),
            "http://192.168.1.20:8080"
        );
        assert_eq!(advertised_url(None, 9000), "http://localhost:9000");
    }

    #[test]
    fn test_device_name_not_empty() {
        assert!(!device_name().is_empty());
    }

    #[test]
    fn test_is_reachable() {
        assert!(is_reachable(Ipv4Addr::new(192, 168, 1, 20)));
        assert!(!is_reachable(Ipv4Addr::new(169, 254, 3, 4)));
        assert!(!is_reachable(Ipv4Addr::LOCALHOST));
    }
}
