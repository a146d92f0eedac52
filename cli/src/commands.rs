pub mod discover;
pub mod scan;
pub mod serve;

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use sonda_common::config::{BlockStrategy, EngineSpec, ReconConfig};
use sonda_common::network::ports::PortSpec;
use sonda_common::network::target::Target;

#[derive(Parser)]
#[command(name = "sonda")]
#[command(version, about = "Network reconnaissance orchestrator.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover hosts, open ports and services of a target
    #[command(alias = "s")]
    Scan {
        /// IP address, CIDR block or domain name
        target: Target,
        /// Ports to scan, e.g. "22,80,8000-8100" (default: engine top ports)
        #[arg(short, long)]
        ports: Option<PortSpec>,
        /// Print the report as JSON instead of a tree
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        options: ReconOptions,
    },
    /// Only discover the hosts in scope of a target
    #[command(alias = "d")]
    Discover {
        target: Target,
        #[command(flatten)]
        options: ReconOptions,
    },
    /// Accept reconnaissance requests over HTTP
    Serve {
        /// Listening port
        #[arg(long, env = "PORT", default_value_t = 8080)]
        port: u16,
        /// Receives every finished report as a JSON POST. Falls back to `N8N_ENDPOINT`
        #[arg(long, env = "WEBHOOK_URL")]
        webhook_url: Option<String>,
        #[command(flatten)]
        options: ReconOptions,
    },
}

/// Pipeline settings shared by every command.
#[derive(Args, Debug, Clone)]
pub struct ReconOptions {
    /// How address blocks become hosts: "expand" or "probe"
    #[arg(long, default_value = "expand")]
    pub block_strategy: BlockStrategy,
    /// Keep IPv6 addresses resolved from subdomains
    #[arg(long)]
    pub include_ipv6: bool,
    /// Read SSH and HTTP banners directly before running the version engine
    #[arg(long)]
    pub banner_grab: bool,
    /// Version-scan timeout per host
    #[arg(long, value_name = "SECS", default_value_t = 45)]
    pub host_timeout: u64,
    /// Abort the whole run after this long
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,
    /// Version-scan engines allowed to run at once
    #[arg(long, default_value_t = 32)]
    pub max_parallel: usize,
    /// Passive subdomain enumeration command
    #[arg(long, value_name = "CMD")]
    pub passive_engine: Option<EngineSpec>,
    /// Additional subdomain enumeration command, run alongside the passive one
    #[arg(long, value_name = "CMD")]
    pub active_engine: Option<EngineSpec>,
    /// Service fingerprinting command
    #[arg(long, value_name = "CMD")]
    pub version_engine: Option<EngineSpec>,
}

impl ReconOptions {
    pub fn to_config(&self) -> ReconConfig {
        let defaults = ReconConfig::default();
        ReconConfig {
            passive_engine: self.passive_engine.clone().unwrap_or(defaults.passive_engine),
            active_engine: self.active_engine.clone(),
            version_engine: self.version_engine.clone().unwrap_or(defaults.version_engine),
            block_strategy: self.block_strategy,
            include_ipv6: self.include_ipv6,
            banner_grab: self.banner_grab,
            host_scan_timeout: Duration::from_secs(self.host_timeout.max(1)),
            pipeline_timeout: self.deadline.map(Duration::from_secs),
            max_parallel_hosts: self.max_parallel.max(1),
            ..defaults
        }
    }
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
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
    use clap::CommandFactory;

    #[test]
    fn command_line_is_well_formed() {
        CommandLine::command().debug_assert();
    }

    #[test]
    fn scan_flags_map_onto_config() {
        let cli = CommandLine::try_parse_from([
            "sonda",
            "scan",
            "10.0.0.0/24",
            "--ports",
            "22,80",
            "--block-strategy",
            "probe",
            "--deadline",
            "600",
            "--version-engine",
            "nmap -sV -p {ports} {host}",
        ])
        .unwrap();

        let Commands::Scan { target, ports, options, .. } = cli.command else {
            panic!("expected the scan command");
        };
        let config = options.to_config();

        assert_eq!(target.raw(), "10.0.0.0/24");
        assert_eq!(ports.unwrap().as_str(), "22,80");
        assert_eq!(config.block_strategy, BlockStrategy::Probe);
        assert_eq!(config.pipeline_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.version_engine.args, vec!["-sV", "-p", "{ports}", "{host}"]);
        assert_eq!(config.passive_engine, ReconConfig::default().passive_engine);
    }

    #[test]
    fn invalid_target_is_rejected_by_the_parser() {
        assert!(CommandLine::try_parse_from(["sonda", "scan", "10.0.0.1/33"]).is_err());
    }
}
