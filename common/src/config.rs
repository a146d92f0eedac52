use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Placeholder replaced by the raw target (domain or block).
pub const TARGET_VAR: &str = "{target}";
/// Placeholder replaced by a single host address.
pub const HOST_VAR: &str = "{host}";
/// Placeholder replaced by a comma separated port list.
pub const PORTS_VAR: &str = "{ports}";

/// How an address block turns into hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockStrategy {
    /// Every usable address of the block, without liveness probing.
    #[default]
    Expand,
    /// Only the addresses the host-probe engine reports as responsive.
    Probe,
}

impl FromStr for BlockStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "expand" => Ok(BlockStrategy::Expand),
            "probe" => Ok(BlockStrategy::Probe),
            _ => Err(format!("unknown block strategy '{s}' (expected 'expand' or 'probe')")),
        }
    }
}

/// Command line of an external engine, with placeholders in its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl EngineSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Arguments with every `(placeholder, value)` pair substituted.
    pub fn render_args(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter()
                    .fold(arg.clone(), |acc, (key, value)| acc.replace(key, value))
            })
            .collect()
    }
}

impl fmt::Display for EngineSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl FromStr for EngineSpec {
    type Err = String;

    /// Parses a whitespace separated command line such as
    /// `subfinder -d {target} -silent`. No shell quoting is supported.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| "engine command must not be empty".to_string())?;
        Ok(EngineSpec::new(program, words))
    }
}

/// The port-discovery engine needs different arguments depending on whether
/// an explicit port list was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortEngineSpec {
    /// Base command. Hosts are streamed to its stdin.
    pub engine: EngineSpec,
    /// Appended when no port list was requested.
    pub default_ports_args: Vec<String>,
    /// Appended with `{ports}` substituted when a port list was requested.
    pub port_list_args: Vec<String>,
}

impl Default for PortEngineSpec {
    fn default() -> Self {
        Self {
            engine: EngineSpec::new("naabu", ["-silent", "-l", "-"]),
            default_ports_args: vec!["-top-ports".into(), "100".into()],
            port_list_args: vec!["-p".into(), PORTS_VAR.into()],
        }
    }
}

/// Settings of one reconnaissance pipeline.
#[derive(Debug, Clone)]
pub struct ReconConfig {
    /// Passive subdomain enumeration, run for domain targets.
    pub passive_engine: EngineSpec,
    /// Optional active intelligence engine, unioned with the passive results.
    pub active_engine: Option<EngineSpec>,
    /// Liveness probing for blocks when [`BlockStrategy::Probe`] is selected.
    pub probe_engine: EngineSpec,
    pub port_engine: PortEngineSpec,
    /// Service/version fingerprinting, run once per host.
    pub version_engine: EngineSpec,

    pub block_strategy: BlockStrategy,
    /// Keep IPv6 addresses resolved from subdomains.
    pub include_ipv6: bool,
    /// Grab banners directly for well-known ports before falling back to the engine.
    pub banner_grab: bool,

    pub discovery_timeout: Duration,
    pub port_scan_timeout: Duration,
    pub host_scan_timeout: Duration,
    pub banner_timeout: Duration,
    /// Upper bound on the whole run. `None` means unbounded.
    pub pipeline_timeout: Option<Duration>,

    /// Version-scan engine processes allowed to run at once.
    pub max_parallel_hosts: usize,
    pub dns_concurrency: usize,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            passive_engine: EngineSpec::new("subfinder", ["-d", TARGET_VAR, "-silent"]),
            active_engine: None,
            probe_engine: EngineSpec::new("naabu", ["-silent", "-sn", "-host", TARGET_VAR]),
            port_engine: PortEngineSpec::default(),
            version_engine: EngineSpec::new("nmap", ["-sV", "-Pn", "-p", PORTS_VAR, HOST_VAR]),
            block_strategy: BlockStrategy::Expand,
            include_ipv6: false,
            banner_grab: false,
            discovery_timeout: Duration::from_secs(300),
            port_scan_timeout: Duration::from_secs(600),
            host_scan_timeout: Duration::from_secs(45),
            banner_timeout: Duration::from_secs(3),
            pipeline_timeout: None,
            max_parallel_hosts: 32,
            dns_concurrency: 50,
        }
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
