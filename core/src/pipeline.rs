use std::sync::Arc;

use tokio::time::timeout;
use tracing::{Instrument, info, info_span};

use sonda_common::config::ReconConfig;
use sonda_common::error::ReconError;
use sonda_common::models::{PortMap, ReconResult};
use sonda_common::network::ports::PortSpec;
use sonda_common::network::target::Target;
use sonda_common::warning::Warnings;

use crate::aggregate::aggregate;
use crate::discovery::HostDiscoverer;
use crate::engine::{EngineRunner, ProcessRunner};
use crate::network::banner::BannerGrabber;
use crate::resolver::{Resolver, SystemResolver};
use crate::scanner::ports::PortDiscoverer;
use crate::scanner::version::VersionScanner;

/// Runs discovery, port discovery and version scanning for one target.
///
/// Holds no state between runs, so one pipeline can serve concurrent requests.
pub struct ReconPipeline {
    config: Arc<ReconConfig>,
    discoverer: HostDiscoverer,
    ports: PortDiscoverer,
    versions: VersionScanner,
}

impl ReconPipeline {
    /// A pipeline that launches real engine processes and uses the system resolver.
    pub fn new(config: ReconConfig) -> Self {
        Self::with_backends(config, Arc::new(ProcessRunner), Arc::new(SystemResolver))
    }

    pub fn with_backends(config: ReconConfig, runner: Arc<dyn EngineRunner>, resolver: Arc<dyn Resolver>) -> Self {
        let config = Arc::new(config);

        let discoverer = HostDiscoverer::new(runner.clone(), resolver, config.clone());
        let ports = PortDiscoverer::new(runner.clone(), config.port_engine.clone(), config.port_scan_timeout);
        let mut versions = VersionScanner::new(
            runner,
            config.version_engine.clone(),
            config.host_scan_timeout,
            config.max_parallel_hosts,
        );
        if config.banner_grab {
            versions = versions.with_banners(BannerGrabber::new(config.banner_timeout));
        }

        Self {
            config,
            discoverer,
            ports,
            versions,
        }
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    /// Full reconnaissance of `target`.
    ///
    /// `ports` restricts port discovery to an explicit list, otherwise the
    /// engine's top ports are scanned.
    pub async fn run(&self, target: &Target, ports: Option<&PortSpec>) -> Result<ReconResult, ReconError> {
        self.bounded(self.run_stages(target, ports)).await
    }

    /// Host discovery only. The result carries hosts and subdomains, no services.
    pub async fn discover(&self, target: &Target) -> Result<ReconResult, ReconError> {
        self.bounded(async {
            let mut warnings = Warnings::new();
            let discovered = self
                .discoverer
                .discover(target, &mut warnings)
                .instrument(info_span!("host_discovery"))
                .await?;
            Ok(aggregate(target, discovered, Vec::new(), warnings))
        })
        .await
    }

    async fn bounded<F>(&self, run: F) -> Result<ReconResult, ReconError>
    where
        F: Future<Output = Result<ReconResult, ReconError>>,
    {
        match self.config.pipeline_timeout {
            Some(limit) => timeout(limit, run)
                .await
                .map_err(|_elapsed| ReconError::DeadlineExceeded(limit))?,
            None => run.await,
        }
    }

    async fn run_stages(&self, target: &Target, ports: Option<&PortSpec>) -> Result<ReconResult, ReconError> {
        info!("Starting reconnaissance of {target} ({})", target.kind());
        let mut warnings = Warnings::new();

        let discovered = self
            .discoverer
            .discover(target, &mut warnings)
            .instrument(info_span!("host_discovery"))
            .await?;

        if discovered.is_empty() {
            info!("No hosts in scope, skipping port discovery");
            return Ok(aggregate(target, discovered, Vec::new(), warnings));
        }

        let open: PortMap = self
            .ports
            .discover_ports(&discovered.hosts, ports, &mut warnings)
            .instrument(info_span!("port_discovery"))
            .await?;

        let report = self
            .versions
            .fingerprint(&open)
            .instrument(info_span!("version_scan"))
            .await;
        warnings.extend(report.warnings);

        let result = aggregate(target, discovered, report.records, warnings);
        info!(
            "Reconnaissance of {target} finished: {} host(s), {} service(s)",
            result.hosts.len(),
            result.services.len()
        );
        Ok(result)
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
