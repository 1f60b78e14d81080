//! Address ranges that outbound fetches must never reach.

use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    sync::LazyLock,
};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};

static BLOCKED_V4: &[(Ipv4Addr, u8)] = &[
    (Ipv4Addr::new(0, 0, 0, 0), 8),         // "this network", includes 0.0.0.0
    (Ipv4Addr::new(10, 0, 0, 0), 8),        // RFC 1918
    (Ipv4Addr::new(100, 64, 0, 0), 10),     // CGNAT / shared address space
    (Ipv4Addr::new(127, 0, 0, 0), 8),       // loopback
    (Ipv4Addr::new(169, 254, 0, 0), 16),    // link-local
    (Ipv4Addr::new(172, 16, 0, 0), 12),     // RFC 1918
    (Ipv4Addr::new(192, 0, 0, 0), 24),      // IETF protocol assignments
    (Ipv4Addr::new(192, 168, 0, 0), 16),    // RFC 1918
    (Ipv4Addr::new(255, 255, 255, 255), 32), // broadcast
];

static BLOCKED_V6: &[(Ipv6Addr, u8)] = &[
    (Ipv6Addr::UNSPECIFIED, 128),
    (Ipv6Addr::LOCALHOST, 128),
    (Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 0), 7),  // unique local
    (Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 10), // link-local
];

static BLOCKED: LazyLock<Vec<IpNet>> = LazyLock::new(|| {
    let v4 = BLOCKED_V4
        .iter()
        .filter_map(|(addr, len)| Ipv4Net::new(*addr, *len).ok())
        .map(IpNet::V4);
    let v6 = BLOCKED_V6
        .iter()
        .filter_map(|(addr, len)| Ipv6Net::new(*addr, *len).ok())
        .map(IpNet::V6);
    v4.chain(v6).collect()
});

/// The full blocked-range table.
#[must_use]
pub fn blocked_ranges() -> &'static [IpNet] {
    &BLOCKED
}

/// Returns `true` if the address lies in a range the proxy refuses to fetch
/// from. IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) are judged by their
/// embedded IPv4 address.
#[must_use]
pub fn is_blocked_ip(ip: &IpAddr) -> bool {
    let ip = match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => *ip,
        },
        IpAddr::V4(_) => *ip,
    };
    BLOCKED.iter().any(|net| net.contains(&ip))
}

/// Check if an IP is covered by an allowlist entry.
#[must_use]
pub fn is_allowlisted(ip: &IpAddr, allowlist: &[IpNet]) -> bool {
    allowlist.iter().any(|net| net.contains(ip))
}
