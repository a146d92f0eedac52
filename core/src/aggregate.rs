use std::collections::BTreeMap;
use std::net::IpAddr;

use sonda_common::models::{DiscoveredHosts, ReconResult, ServiceRecord};
use sonda_common::network::target::Target;
use sonda_common::warning::Warnings;

/// Merges the stage outputs of one run into its [`ReconResult`].
///
/// Services are sorted by host then port, keeping the first record of any
/// repeated pair. Records for hosts that were never discovered are dropped.
pub fn aggregate(
    target: &Target,
    discovered: DiscoveredHosts,
    services: Vec<ServiceRecord>,
    warnings: Warnings,
) -> ReconResult {
    let mut unique: BTreeMap<(IpAddr, u16), ServiceRecord> = BTreeMap::new();
    for record in services {
        if discovered.hosts.contains(&record.host) {
            unique.entry((record.host, record.port)).or_insert(record);
        }
    }

    ReconResult {
        target: target.raw().to_string(),
        kind: target.kind(),
        hosts: discovered.hosts.into_iter().collect(),
        subdomains: discovered.subdomains.into_iter().collect(),
        services: unique.into_values().collect(),
        warnings,
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
    use sonda_common::network::target::TargetKind;
    use sonda_common::warning::{Stage, Warning};
    use std::collections::BTreeSet;
    use std::net::Ipv4Addr;

    fn v4(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn sorts_and_dedups_services() {
        let target: Target = "10.0.0.0/30".parse().unwrap();
        let discovered = DiscoveredHosts::from_hosts([v4(2), v4(1)]);
        let services = vec![
            ServiceRecord::new(v4(2), 80, "http", None),
            ServiceRecord::new(v4(1), 443, "https", None),
            ServiceRecord::new(v4(1), 22, "ssh", Some("OpenSSH 9.6".into())),
            ServiceRecord::new(v4(1), 22, "ssh", None),
            ServiceRecord::new(v4(9), 22, "ssh", None),
        ];

        let result = aggregate(&target, discovered, services, Warnings::new());

        assert_eq!(result.kind, TargetKind::AddressBlock);
        assert_eq!(result.hosts, vec![v4(1), v4(2)]);
        let pairs: Vec<(IpAddr, u16)> = result.services.iter().map(|s| (s.host, s.port)).collect();
        assert_eq!(pairs, vec![(v4(1), 22), (v4(1), 443), (v4(2), 80)]);
        assert_eq!(result.services[0].version.as_deref(), Some("OpenSSH 9.6"));
    }

    #[test]
    fn empty_discovery_is_a_successful_result() {
        let target: Target = "example.com".parse().unwrap();
        let warnings = Warnings::from(vec![Warning::new(Stage::HostDiscovery, "enumeration found no subdomains")]);

        let result = aggregate(&target, DiscoveredHosts::default(), Vec::new(), warnings);

        assert!(result.hosts.is_empty());
        assert!(result.services.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.to_report().total_hosts, 0);
    }

    #[test]
    fn keeps_subdomains_in_order() {
        let target: Target = "example.com".parse().unwrap();
        let discovered = DiscoveredHosts {
            hosts: BTreeSet::from([v4(1)]),
            subdomains: BTreeSet::from(["www.example.com".to_string(), "api.example.com".to_string()]),
        };

        let result = aggregate(&target, discovered, Vec::new(), Warnings::new());

        assert_eq!(result.subdomains, vec!["api.example.com", "www.example.com"]);
    }
}
