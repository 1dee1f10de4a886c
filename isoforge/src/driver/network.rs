//! vmnet DHCP files: guest lease lookup and host address discovery.

use std::net::{IpAddr, Ipv4Addr};

/// One `lease <ip> { ... }` block of a dhcpd lease file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub ip: IpAddr,
    pub mac: Option<String>,
}

pub fn parse_leases(contents: &str) -> Vec<Lease> {
    let mut leases = Vec::new();
    let mut current: Option<Lease> = None;

    for line in contents.lines() {
        let line = line.trim().trim_end_matches(';');
        let mut words = line.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("lease"), Some(ip), Some("{")) => {
                current = ip.parse().ok().map(|ip| Lease { ip, mac: None });
            }
            (Some("hardware"), Some("ethernet"), Some(mac)) => {
                if let Some(lease) = current.as_mut() {
                    lease.mac = Some(mac.to_lowercase());
                }
            }
            (Some("}"), _, _) => {
                if let Some(lease) = current.take() {
                    leases.push(lease);
                }
            }
            _ => {}
        }
    }

    leases
}

/// Most recent lease handed to `mac`. Lease files are append-only, so the
/// last matching block wins.
pub fn find_lease_ip(contents: &str, mac: &str) -> Option<IpAddr> {
    let mac = mac.to_lowercase();
    parse_leases(contents)
        .into_iter()
        .rev()
        .find(|lease| lease.mac.as_deref() == Some(mac.as_str()))
        .map(|lease| lease.ip)
}

/// Host side address of a vmnet network: first address of the subnet the
/// DHCP server is configured for.
pub fn host_ip_from_dhcpd_conf(contents: &str) -> Option<IpAddr> {
    contents.lines().find_map(|line| {
        let mut words = line.split_whitespace();
        match (words.next(), words.next(), words.next(), words.next()) {
            (Some("subnet"), Some(subnet), Some("netmask"), Some(mask)) => {
                let subnet: Ipv4Addr = subnet.parse().ok()?;
                let mask: Ipv4Addr = mask.trim_end_matches('{').parse().ok()?;
                let network = u32::from(subnet) & u32::from(mask);
                Some(IpAddr::V4(Ipv4Addr::from(network + 1)))
            }
            _ => None,
        }
    })
}
