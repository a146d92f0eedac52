//! # Host Discovery
//!
//! Turns a classified [`Target`] into the set of hosts that get port scanned.
//!
//! * **Single address**: the address itself, no engine is called.
//! * **Address block**: expanded locally or probed with the host-probe engine,
//!   depending on the configured [`BlockStrategy`].
//! * **Domain**: subdomains from the passive (and optional active) enumeration
//!   engines, resolved through the [`Resolver`].

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use pnet::ipnetwork::IpNetwork;
use tracing::{debug, info};

use sonda_common::config::{BlockStrategy, EngineSpec, ReconConfig, TARGET_VAR};
use sonda_common::error::ReconError;
use sonda_common::models::DiscoveredHosts;
use sonda_common::network::range;
use sonda_common::network::target::{self, Scope, Target};
use sonda_common::warning::{Stage, Warning, Warnings};

use crate::engine::{EngineError, EngineOutput, EngineRunner, ExitState, Invocation};
use crate::resolver::Resolver;

pub struct HostDiscoverer {
    runner: Arc<dyn EngineRunner>,
    resolver: Arc<dyn Resolver>,
    config: Arc<ReconConfig>,
}

impl HostDiscoverer {
    pub fn new(
        runner: Arc<dyn EngineRunner>,
        resolver: Arc<dyn Resolver>,
        config: Arc<ReconConfig>,
    ) -> Self {
        Self {
            runner,
            resolver,
            config,
        }
    }

    /// Finds the hosts in scope for `target`, deduplicated.
    ///
    /// Finding nothing is a valid outcome and only adds a warning. Errors are
    /// reserved for a discovery engine that cannot be started at all.
    pub async fn discover(
        &self,
        target: &Target,
        warnings: &mut Warnings,
    ) -> Result<DiscoveredHosts, ReconError> {
        let discovered = match target.scope() {
            Scope::Address(addr) => DiscoveredHosts::from_hosts([*addr]),
            Scope::Block(network) => match self.config.block_strategy {
                BlockStrategy::Expand => DiscoveredHosts::from_hosts(range::expand(network)?),
                BlockStrategy::Probe => self.probe_block(target, network, warnings).await?,
            },
            Scope::Domain(domain) => self.discover_domain(domain, warnings).await?,
        };

        info!(
            "Host discovery selected {} host(s) for {} '{}'",
            discovered.hosts.len(),
            target.kind(),
            target
        );
        Ok(discovered)
    }

    async fn probe_block(
        &self,
        target: &Target,
        network: &IpNetwork,
        warnings: &mut Warnings,
    ) -> Result<DiscoveredHosts, ReconError> {
        let output = self
            .run_engine(&self.config.probe_engine, target.raw())
            .await
            .map_err(|e| ReconError::fatal(Stage::HostDiscovery, e))?;

        let hosts: BTreeSet<IpAddr> = output
            .lines()
            .filter_map(|line| line.parse::<IpAddr>().ok())
            .filter(|addr| network.contains(*addr))
            .collect();

        match output.exit {
            ExitState::Success => {}
            ExitState::Failed(_) if !hosts.is_empty() => {
                debug!("Host probe ended with {}, keeping its output", output.exit);
            }
            exit => warnings.push(Warning::for_host(
                Stage::HostDiscovery,
                network,
                format!("host probe ended with {exit}"),
            )),
        }

        if hosts.is_empty() {
            warnings.push(Warning::for_host(
                Stage::HostDiscovery,
                network,
                "no responsive hosts found in block",
            ));
        }

        Ok(DiscoveredHosts::from_hosts(hosts))
    }

    async fn discover_domain(
        &self,
        domain: &str,
        warnings: &mut Warnings,
    ) -> Result<DiscoveredHosts, ReconError> {
        let passive = self.run_engine(&self.config.passive_engine, domain);

        let (passive, active) = match &self.config.active_engine {
            Some(active) => {
                let (passive, active) = tokio::join!(passive, self.run_engine(active, domain));
                (passive, Some(active))
            }
            None => (passive.await, None),
        };

        let passive = passive.map_err(|e| ReconError::fatal(Stage::HostDiscovery, e))?;
        let mut candidates = self.collect_candidates(domain, &passive, "subdomain enumeration", warnings);

        match active {
            Some(Ok(output)) => {
                candidates.extend(self.collect_candidates(domain, &output, "active enumeration", warnings));
            }
            Some(Err(e)) => warnings.push(Warning::for_host(Stage::HostDiscovery, domain, e.to_string())),
            None => {}
        }

        if candidates.is_empty() {
            warnings.push(Warning::for_host(
                Stage::HostDiscovery,
                domain,
                "enumeration found no subdomains",
            ));
            return Ok(DiscoveredHosts::default());
        }

        info!("Resolving {} candidate subdomain(s) of {domain}", candidates.len());
        let discovered = self.resolve_candidates(candidates, warnings).await;

        if discovered.is_empty() {
            warnings.push(Warning::for_host(
                Stage::HostDiscovery,
                domain,
                "no subdomain resolved to a usable address",
            ));
        }

        Ok(discovered)
    }

    fn collect_candidates(
        &self,
        domain: &str,
        output: &EngineOutput,
        engine: &str,
        warnings: &mut Warnings,
    ) -> BTreeSet<String> {
        if !output.is_success() {
            warnings.push(Warning::for_host(
                Stage::HostDiscovery,
                domain,
                format!("{engine} ended with {}", output.exit),
            ));
        }
        parse_candidates(domain, &output.text)
    }

    async fn resolve_candidates(
        &self,
        candidates: BTreeSet<String>,
        warnings: &mut Warnings,
    ) -> DiscoveredHosts {
        let resolver = self.resolver.clone();
        let mut lookups: Vec<_> = stream::iter(candidates)
            .map(|name| {
                let resolver = resolver.clone();
                async move {
                    let result = resolver.resolve(&name).await;
                    (name, result)
                }
            })
            .buffer_unordered(self.config.dns_concurrency.max(1))
            .collect()
            .await;
        lookups.sort_by(|a, b| a.0.cmp(&b.0));

        let mut discovered = DiscoveredHosts::default();
        for (name, result) in lookups {
            let addrs = match result {
                Ok(addrs) => addrs,
                Err(e) => {
                    warnings.push(Warning::for_host(
                        Stage::HostDiscovery,
                        &name,
                        format!("failed to resolve: {e}"),
                    ));
                    continue;
                }
            };

            let usable: Vec<IpAddr> = addrs
                .into_iter()
                .filter(|addr| addr.is_ipv4() || self.config.include_ipv6)
                .collect();
            if usable.is_empty() {
                debug!("{name} has no usable address, skipping");
                continue;
            }

            discovered.hosts.extend(usable);
            discovered.subdomains.insert(name);
        }
        discovered
    }

    async fn run_engine(&self, spec: &EngineSpec, target: &str) -> Result<EngineOutput, EngineError> {
        let args = spec.render_args(&[(TARGET_VAR, target)]);
        let invocation = Invocation::new(&spec.program, args).with_timeout(self.config.discovery_timeout);
        self.runner.run(invocation).await
    }
}

/// Hostnames in `text` that belong to `domain`, one per line.
///
/// Lines that are not host names (banners, errors on stderr) and names outside
/// the domain are dropped.
pub fn parse_candidates(domain: &str, text: &str) -> BTreeSet<String> {
    let suffix = format!(".{domain}");
    text.lines()
        .filter_map(target::normalize_hostname)
        .filter(|name| name == domain || name.ends_with(&suffix))
        .collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
