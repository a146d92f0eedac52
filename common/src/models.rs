//! # Result Models
//!
//! * [`PortMap`]: open ports per host, produced by port discovery.
//! * [`ServiceRecord`]: one fingerprinted open port.
//! * [`DiscoveredHosts`]: output of host discovery.
//! * [`ReconResult`]: the aggregate of one run, and [`ReconReport`], its wire shape.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::network::target::TargetKind;
use crate::warning::{Warning, Warnings};

/// Confirmed open TCP ports, keyed by host.
pub type PortMap = BTreeMap<IpAddr, BTreeSet<u16>>;

/// The fingerprinted service behind one open port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub host: IpAddr,
    pub port: u16,
    /// Short protocol tag such as `http` or `ssh`.
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ServiceRecord {
    pub fn new(host: IpAddr, port: u16, service: impl Into<String>, version: Option<String>) -> Self {
        Self {
            host,
            port,
            service: service.into(),
            version,
        }
    }
}

/// Hosts selected for scanning, plus the subdomains they were resolved from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredHosts {
    pub hosts: BTreeSet<IpAddr>,
    pub subdomains: BTreeSet<String>,
}

impl DiscoveredHosts {
    pub fn from_hosts(hosts: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            hosts: hosts.into_iter().collect(),
            subdomains: BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Everything one reconnaissance run found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconResult {
    pub target: String,
    pub kind: TargetKind,
    /// Unique, ascending.
    pub hosts: Vec<IpAddr>,
    /// Resolved subdomains, only populated for domain targets.
    pub subdomains: Vec<String>,
    /// Sorted by host, then port. At most one record per pair.
    pub services: Vec<ServiceRecord>,
    pub warnings: Warnings,
}

impl ReconResult {
    pub fn to_report(&self) -> ReconReport {
        ReconReport {
            target: self.target.clone(),
            kind: self.kind,
            hosts: self.hosts.clone(),
            subdomains: self.subdomains.clone(),
            services: self.services.clone(),
            total_hosts: self.hosts.len(),
            error: self.warnings.render(),
            warnings: self.warnings.iter().cloned().collect(),
        }
    }
}

/// JSON shape of a [`ReconResult`], used by the HTTP boundary and the webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconReport {
    pub target: String,
    pub kind: TargetKind,
    pub hosts: Vec<IpAddr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subdomains: Vec<String>,
    pub services: Vec<ServiceRecord>,
    pub total_hosts: usize,
    /// Rendered warnings. Absent when nothing went wrong.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
