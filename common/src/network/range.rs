use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use pnet::ipnetwork::IpNetwork;

use crate::error::ReconError;

/// Largest block that is expanded address by address.
pub const MAX_BLOCK_HOSTS: u128 = 65_536;

/// An inclusive range of addresses of one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostRange {
    pub first: IpAddr,
    pub last: IpAddr,
}

impl HostRange {
    pub fn new(first: IpAddr, last: IpAddr) -> Self {
        Self { first, last }
    }

    pub fn len(&self) -> u128 {
        to_u128(self.last).saturating_sub(to_u128(self.first)) + 1
    }

    pub fn is_empty(&self) -> bool {
        to_u128(self.last) < to_u128(self.first)
    }

    pub fn to_iter(&self) -> impl Iterator<Item = IpAddr> {
        let is_v4 = self.first.is_ipv4();
        (to_u128(self.first)..=to_u128(self.last)).map(move |n| from_u128(n, is_v4))
    }
}

/// The addresses of `network` that can be handed out to hosts.
///
/// Blocks of more than two addresses lose their network and broadcast
/// address; a block of exactly two keeps both and a /32 (/128) keeps its one.
pub fn usable_range(network: &IpNetwork) -> HostRange {
    let (base, host_bits, is_v4): (u128, u32, bool) = match network {
        IpNetwork::V4(net) => (
            u32::from(net.network()) as u128,
            32 - net.prefix() as u32,
            true,
        ),
        IpNetwork::V6(net) => (u128::from(net.network()), 128 - net.prefix() as u32, false),
    };

    let last_offset: u128 = if host_bits >= 128 {
        u128::MAX
    } else {
        (1u128 << host_bits) - 1
    };

    let (first, last) = if last_offset >= 2 {
        (base + 1, base + last_offset - 1)
    } else {
        (base, base + last_offset)
    };

    HostRange::new(from_u128(first, is_v4), from_u128(last, is_v4))
}

/// Expands a block into its usable addresses, refusing blocks too large to scan.
pub fn expand(network: &IpNetwork) -> Result<Vec<IpAddr>, ReconError> {
    let range = usable_range(network);
    if range.len() > MAX_BLOCK_HOSTS {
        return Err(ReconError::invalid(format!(
            "block {network} holds {} addresses, at most {MAX_BLOCK_HOSTS} can be expanded",
            range.len()
        )));
    }
    Ok(range.to_iter().collect())
}

fn to_u128(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u32::from(v4) as u128,
        IpAddr::V6(v6) => u128::from(v6),
    }
}

fn from_u128(n: u128, is_v4: bool) -> IpAddr {
    if is_v4 {
        IpAddr::V4(Ipv4Addr::from(n as u32))
    } else {
        IpAddr::V6(Ipv6Addr::from(n))
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> IpNetwork {
        s.parse().unwrap()
    }

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn slash_30_drops_network_and_broadcast() {
        let hosts = expand(&net("10.0.0.0/30")).unwrap();
        assert_eq!(hosts, vec![v4(10, 0, 0, 1), v4(10, 0, 0, 2)]);
    }

    #[test]
    fn slash_31_keeps_both_addresses() {
        let hosts = expand(&net("10.0.0.4/31")).unwrap();
        assert_eq!(hosts, vec![v4(10, 0, 0, 4), v4(10, 0, 0, 5)]);
    }

    #[test]
    fn slash_32_is_the_address_itself() {
        let hosts = expand(&net("192.168.1.7/32")).unwrap();
        assert_eq!(hosts, vec![v4(192, 168, 1, 7)]);
    }

    #[test]
    fn host_bits_in_block_are_ignored() {
        let hosts = expand(&net("192.168.1.77/24")).unwrap();
        assert_eq!(hosts.len(), 254);
        assert_eq!(hosts.first(), Some(&v4(192, 168, 1, 1)));
        assert_eq!(hosts.last(), Some(&v4(192, 168, 1, 254)));
    }

    #[test]
    fn ipv6_blocks_expand_the_same_way() {
        let hosts = expand(&net("2001:db8::/126")).unwrap();
        let expected: Vec<IpAddr> = vec!["2001:db8::1".parse().unwrap(), "2001:db8::2".parse().unwrap()];
        assert_eq!(hosts, expected);
    }

    #[test]
    fn oversized_blocks_are_rejected() {
        assert!(expand(&net("10.0.0.0/8")).is_err());
        assert!(expand(&net("::/0")).is_err());
        assert_eq!(usable_range(&net("10.0.0.0/16")).len(), 65_534);
    }
}
