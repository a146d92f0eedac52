//! # Scan Target Model
//!
//! Defines the possible inputs for a reconnaissance run.
//!
//! A target string is classified into one of:
//! * A single IP address (e.g., `192.168.1.10`, `::1`).
//! * A CIDR block (e.g., `10.0.0.0/24`).
//! * A domain name (e.g., `example.com`), whose subdomains get enumerated.
//!
//! [`classify`] only decides the kind. [`Target`]'s `FromStr` additionally
//! validates the input and is what the boundary layers use.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use pnet::ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::error::ReconError;

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Which discovery strategy a target calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    SingleAddress,
    AddressBlock,
    DomainName,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetKind::SingleAddress => "single address",
            TargetKind::AddressBlock => "address block",
            TargetKind::DomainName => "domain name",
        };
        f.write_str(name)
    }
}

/// Classifies a raw target string.
///
/// * A literal address without a slash is a [`TargetKind::SingleAddress`].
/// * Anything parsing as `address/prefix` is a [`TargetKind::AddressBlock`].
/// * Everything else is treated as a [`TargetKind::DomainName`].
///
/// Never fails; rejecting garbage is the job of [`Target::from_str`].
pub fn classify(input: &str) -> TargetKind {
    let s = input.trim();

    if !s.contains('/') && s.parse::<IpAddr>().is_ok() {
        return TargetKind::SingleAddress;
    }

    // `IpNetwork` also accepts bare addresses as /32, so require the slash.
    if s.contains('/') && s.parse::<IpNetwork>().is_ok() {
        return TargetKind::AddressBlock;
    }

    TargetKind::DomainName
}

/// The classified scope of a target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Scan exactly this host.
    Address(IpAddr),
    /// Scan the hosts of a network block.
    Block(IpNetwork),
    /// Enumerate and scan the subdomains of a domain.
    Domain(String),
}

/// A validated, classified scan subject. Immutable once parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    raw: String,
    scope: Scope,
}

impl Target {
    /// The trimmed input the target was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn kind(&self) -> TargetKind {
        match self.scope {
            Scope::Address(_) => TargetKind::SingleAddress,
            Scope::Block(_) => TargetKind::AddressBlock,
            Scope::Domain(_) => TargetKind::DomainName,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Target {
    type Err = ReconError;

    /// Parses and validates a target.
    ///
    /// Supported formats:
    /// * **Host**: single IPv4/IPv6 address (e.g., "192.168.1.5").
    /// * **CIDR**: "Network/Prefix" (e.g., "192.168.1.0/24").
    /// * **Domain**: a syntactically valid host name (e.g., "example.com").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(ReconError::invalid("target must not be empty"));
        }

        let scope = match classify(raw) {
            TargetKind::SingleAddress => Scope::Address(parse_addr(raw)?),
            TargetKind::AddressBlock => Scope::Block(parse_cidr(raw)?),
            TargetKind::DomainName => Scope::Domain(parse_domain(raw)?),
        };

        Ok(Target {
            raw: raw.to_string(),
            scope,
        })
    }
}

/// Normalizes `s` to a lowercase host name, or `None` if it is not a valid one.
pub fn normalize_hostname(s: &str) -> Option<String> {
    parse_domain(s.trim()).ok()
}

fn parse_addr(s: &str) -> Result<IpAddr, ReconError> {
    s.parse::<IpAddr>()
        .map_err(|e| ReconError::invalid(format!("invalid address '{s}': {e}")))
}

fn parse_cidr(s: &str) -> Result<IpNetwork, ReconError> {
    s.parse::<IpNetwork>()
        .map_err(|e| ReconError::invalid(format!("invalid CIDR block '{s}': {e}")))
}

/// Validates a domain name and normalizes it to lowercase without a trailing dot.
fn parse_domain(s: &str) -> Result<String, ReconError> {
    if s.contains('/') {
        return Err(ReconError::invalid(format!("invalid CIDR block '{s}'")));
    }

    let name = s.strip_suffix('.').unwrap_or(s).to_ascii_lowercase();
    if name.is_empty() || name.len() > MAX_DOMAIN_LEN {
        return Err(ReconError::invalid(format!("invalid domain name '{s}'")));
    }

    let labels: Vec<&str> = name.split('.').collect();
    if labels.iter().any(|label| !is_valid_label(label)) {
        return Err(ReconError::invalid(format!("invalid domain name '{s}'")));
    }

    // A numeric top-level label is a mistyped address, not a domain.
    if let Some(tld) = labels.last()
        && tld.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ReconError::invalid(format!("invalid address '{s}'")));
    }

    Ok(name)
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
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
    use std::net::Ipv4Addr;

    #[test]
    fn classify_distinguishes_all_kinds() {
        assert_eq!(classify("192.168.1.10"), TargetKind::SingleAddress);
        assert_eq!(classify("  ::1 "), TargetKind::SingleAddress);
        assert_eq!(classify("10.0.0.0/30"), TargetKind::AddressBlock);
        assert_eq!(classify("2001:db8::/120"), TargetKind::AddressBlock);
        assert_eq!(classify("example.com"), TargetKind::DomainName);

        // Not a valid block, so it falls through to the domain branch.
        assert_eq!(classify("10.0.0.1/33"), TargetKind::DomainName);
    }

    #[test]
    fn classify_is_idempotent() {
        for input in ["10.1.2.3", "10.0.0.0/8", "sub.example.org", "", "???"] {
            assert_eq!(classify(input), classify(input));
        }
    }

    #[test]
    fn test_from_str_full_parsing() {
        let host: Target = "192.168.1.10".parse().unwrap();
        assert_eq!(
            host.scope(),
            &Scope::Address(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)))
        );
        assert_eq!(host.kind(), TargetKind::SingleAddress);

        let block: Target = " 10.0.0.0/30 ".parse().unwrap();
        assert_eq!(block.kind(), TargetKind::AddressBlock);
        assert_eq!(block.raw(), "10.0.0.0/30");

        let domain: Target = "Api.Example.COM.".parse().unwrap();
        assert_eq!(domain.scope(), &Scope::Domain("api.example.com".into()));

        // Invalid
        assert!("".parse::<Target>().is_err());
        assert!("   ".parse::<Target>().is_err());
        assert!("10.0.0.1/33".parse::<Target>().is_err());
        assert!("10.0.0.256".parse::<Target>().is_err());
        assert!("http://example.com".parse::<Target>().is_err());
        assert!("exa mple.com".parse::<Target>().is_err());
        assert!("-bad.example.com".parse::<Target>().is_err());
        assert!("a..b".parse::<Target>().is_err());
    }

    #[test]
    fn invalid_targets_are_client_errors() {
        let err = "".parse::<Target>().unwrap_err();
        assert!(err.is_client_error());
    }
}
