//! IPv4 address helpers for UDP device discovery
//!
//! The device is found by broadcasting a hostname query on every local
//! subnet, so we need each interface's directed broadcast address.

use crate::error::Result;
use if_addrs::IfAddr;
use std::net::Ipv4Addr;

/// Directed broadcast address of the subnet `address` lives in
///
/// `192.168.1.42` with mask `255.255.255.0` gives `192.168.1.255`.
#[inline]
pub fn broadcast_address(address: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    let ip = u32::from(address);
    let mask = u32::from(netmask);
    Ipv4Addr::from((ip & mask) | !mask)
}

/// Every IPv4 address bound to a local interface, with its netmask
pub fn local_ipv4_interfaces() -> Result<Vec<(Ipv4Addr, Ipv4Addr)>> {
    let interfaces = if_addrs::get_if_addrs()?;
    Ok(interfaces
        .into_iter()
        .filter_map(|iface| match iface.addr {
            IfAddr::V4(v4) => Some((v4.ip, v4.netmask)),
            IfAddr::V6(_) => None,
        })
        .collect())
}

/// Discovery targets: the limited broadcast address plus each local subnet's
/// directed broadcast address, without duplicates
pub fn broadcast_addresses() -> Result<Vec<Ipv4Addr>> {
    Ok(collect_broadcast_addresses(local_ipv4_interfaces()?))
}

fn collect_broadcast_addresses(
    interfaces: impl IntoIterator<Item = (Ipv4Addr, Ipv4Addr)>,
) -> Vec<Ipv4Addr> {
    let mut addresses = vec![Ipv4Addr::BROADCAST];
    for (ip, mask) in interfaces {
        let broadcast = broadcast_address(ip, mask);
        if !addresses.contains(&broadcast) {
            addresses.push(broadcast);
        }
    }
    addresses
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_c_broadcast() {
        assert_eq!(
            broadcast_address(
                Ipv4Addr::new(192, 168, 1, 42),
                Ipv4Addr::new(255, 255, 255, 0)
            ),
            Ipv4Addr::new(192, 168, 1, 255)
        );
    }

    #[test]
    fn test_non_octet_mask() {
        assert_eq!(
            broadcast_address(
                Ipv4Addr::new(10, 0, 17, 3),
                Ipv4Addr::new(255, 255, 240, 0)
            ),
            Ipv4Addr::new(10, 0, 31, 255)
        );
    }

    #[test]
    fn test_host_mask_and_empty_mask() {
        let ip = Ipv4Addr::new(172, 16, 5, 9);
        assert_eq!(broadcast_address(ip, Ipv4Addr::BROADCAST), ip);
        assert_eq!(
            broadcast_address(ip, Ipv4Addr::UNSPECIFIED),
            Ipv4Addr::BROADCAST
        );
    }

    #[test]
    fn test_collect_deduplicates() {
        let mask = Ipv4Addr::new(255, 255, 255, 0);
        let addresses = collect_broadcast_addresses(vec![
            (Ipv4Addr::new(192, 168, 1, 10), mask),
            (Ipv4Addr::new(192, 168, 1, 11), mask),
            (Ipv4Addr::new(127, 0, 0, 1), Ipv4Addr::new(255, 0, 0, 0)),
        ]);
        assert_eq!(
            addresses,
            vec![
                Ipv4Addr::BROADCAST,
                Ipv4Addr::new(192, 168, 1, 255),
                Ipv4Addr::new(127, 255, 255, 255),
            ]
        );
    }

    #[test]
    fn test_local_enumeration_always_includes_limited_broadcast() {
        // Interface listing depends on the host; only the fixed entry is guaranteed
        if let Ok(addresses) = broadcast_addresses() {
            assert_eq!(addresses[0], Ipv4Addr::BROADCAST);
        }
    }
}
