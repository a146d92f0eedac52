use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use sonda_common::config::{PORTS_VAR, PortEngineSpec};
use sonda_common::error::ReconError;
use sonda_common::models::PortMap;
use sonda_common::network::ports::PortSpec;
use sonda_common::warning::{Stage, Warning, Warnings};

use crate::engine::{EngineRunner, ExitState, Invocation};

/// Finds open TCP ports with a fast port-discovery engine.
pub struct PortDiscoverer {
    runner: Arc<dyn EngineRunner>,
    engine: PortEngineSpec,
    timeout: Duration,
}

impl PortDiscoverer {
    pub fn new(runner: Arc<dyn EngineRunner>, engine: PortEngineSpec, timeout: Duration) -> Self {
        Self {
            runner,
            engine,
            timeout,
        }
    }

    /// Scans `hosts` for open ports in a single engine invocation.
    ///
    /// Hosts are streamed to the engine's stdin one per line. Without `ports`
    /// the engine's default top ports are scanned. An engine that finds
    /// nothing, or fails without output, yields an empty map.
    pub async fn discover_ports(
        &self,
        hosts: &BTreeSet<IpAddr>,
        ports: Option<&PortSpec>,
        warnings: &mut Warnings,
    ) -> Result<PortMap, ReconError> {
        if hosts.is_empty() {
            return Err(ReconError::invalid("no hosts to scan for open ports"));
        }

        let spec = &self.engine.engine;
        let mut args = spec.args.clone();
        match ports {
            Some(ports) => args.extend(
                self.engine
                    .port_list_args
                    .iter()
                    .map(|arg| arg.replace(PORTS_VAR, ports.as_str())),
            ),
            None => args.extend(self.engine.default_ports_args.iter().cloned()),
        }

        let stdin: String = hosts.iter().map(|host| format!("{host}\n")).collect();
        let invocation = Invocation::new(&spec.program, args)
            .with_stdin(stdin)
            .with_timeout(self.timeout);

        info!("Scanning {} host(s) for open ports", hosts.len());
        let output = self
            .runner
            .run(invocation)
            .await
            .map_err(|e| ReconError::fatal(Stage::PortDiscovery, e))?;

        let open = parse_open_ports(&output.text, hosts, ports);
        let total: usize = open.values().map(BTreeSet::len).sum();

        match output.exit {
            ExitState::Success => {}
            ExitState::Failed(_) if total > 0 => {
                debug!("{} ended with {}, keeping its output", spec.program, output.exit);
            }
            ExitState::Failed(_) => warnings.push(Warning::new(
                Stage::PortDiscovery,
                format!("{} ended with {} and reported no open ports", spec.program, output.exit),
            )),
            ExitState::TimedOut => warnings.push(Warning::new(
                Stage::PortDiscovery,
                format!(
                    "{} timed out after {:?}, kept {total} open port(s) found so far",
                    spec.program, self.timeout
                ),
            )),
        }

        info!("Found {total} open port(s) on {} host(s)", open.len());
        Ok(open)
    }
}

#[derive(Deserialize)]
struct JsonHit {
    ip: Option<String>,
    host: Option<String>,
    port: u32,
}

/// Extracts `(host, port)` pairs from port-discovery output.
///
/// Accepts `host:port` lines, `[v6-host]:port` lines and JSON lines carrying
/// `ip`/`host` and `port`. Pairs for hosts that were not scanned, or ports
/// outside the requested `ports`, are dropped.
pub fn parse_open_ports(text: &str, hosts: &BTreeSet<IpAddr>, ports: Option<&PortSpec>) -> PortMap {
    let mut open = PortMap::new();
    for (host, port) in text.lines().filter_map(parse_port_line) {
        if !hosts.contains(&host) {
            continue;
        }
        if ports.is_some_and(|spec| !spec.contains(port)) {
            continue;
        }
        open.entry(host).or_default().insert(port);
    }
    open
}

fn parse_port_line(line: &str) -> Option<(IpAddr, u16)> {
    let line = line.trim();
    if line.starts_with('{') {
        let hit: JsonHit = serde_json::from_str(line).ok()?;
        let host = hit
            .ip
            .as_deref()
            .and_then(|ip| ip.parse::<IpAddr>().ok())
            .or_else(|| hit.host.as_deref().and_then(|h| h.parse::<IpAddr>().ok()))?;
        return Some((host, valid_port(hit.port)?));
    }

    let (host, port) = line.rsplit_once(':')?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host: IpAddr = host.parse().ok()?;
    let port: u32 = port.parse().ok()?;
    Some((host, valid_port(port)?))
}

fn valid_port(port: u32) -> Option<u16> {
    u16::try_from(port).ok().filter(|port| *port > 0)
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
    use crate::engine::EngineOutput;
    use crate::testing::ScriptedRunner;
    use std::net::Ipv4Addr;

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    fn hosts(list: &[IpAddr]) -> BTreeSet<IpAddr> {
        list.iter().copied().collect()
    }

    fn discoverer(runner: ScriptedRunner) -> (PortDiscoverer, Arc<ScriptedRunner>) {
        let runner = Arc::new(runner);
        let discoverer = PortDiscoverer::new(runner.clone(), PortEngineSpec::default(), Duration::from_secs(5));
        (discoverer, runner)
    }

    #[test]
    fn parses_text_and_json_lines_skipping_garbage() {
        let scanned = hosts(&[v4(10, 0, 0, 1), v4(10, 0, 0, 2), "2001:db8::1".parse().unwrap()]);
        let text = "\
10.0.0.1:22
10.0.0.1:80
10.0.0.1:80
[2001:db8::1]:443
{\"ip\":\"10.0.0.2\",\"port\":8080,\"protocol\":\"tcp\"}
{\"host\":\"10.0.0.2\",\"port\":0}
10.0.0.9:22
10.0.0.2:http
10.0.0.2:70000
[INF] Found 3 ports
10.0.0.1:22:33
";
        let open = parse_open_ports(text, &scanned, None);

        assert_eq!(open[&v4(10, 0, 0, 1)], BTreeSet::from([22, 80]));
        assert_eq!(open[&v4(10, 0, 0, 2)], BTreeSet::from([8080]));
        assert_eq!(open[&"2001:db8::1".parse::<IpAddr>().unwrap()], BTreeSet::from([443]));
        assert!(!open.contains_key(&v4(10, 0, 0, 9)));
    }

    #[test]
    fn ports_outside_the_request_are_dropped() {
        let scanned = hosts(&[v4(10, 0, 0, 1)]);
        let spec: PortSpec = "22,8000-8100".parse().unwrap();
        let open = parse_open_ports("10.0.0.1:22\n10.0.0.1:80\n10.0.0.1:8080\n", &scanned, Some(&spec));
        assert_eq!(open[&v4(10, 0, 0, 1)], BTreeSet::from([22, 8080]));
    }

    #[tokio::test]
    async fn streams_hosts_in_one_invocation() {
        let (discoverer, runner) = discoverer(ScriptedRunner::new().on("naabu", EngineOutput::success("10.0.0.1:22\n10.0.0.2:443\n")));
        let scanned = hosts(&[v4(10, 0, 0, 1), v4(10, 0, 0, 2)]);
        let mut warnings = Warnings::new();

        let open = discoverer.discover_ports(&scanned, None, &mut warnings).await.unwrap();

        assert_eq!(open.len(), 2);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].stdin.as_deref(), Some("10.0.0.1\n10.0.0.2\n"));
        assert_eq!(calls[0].args, vec!["-silent", "-l", "-", "-top-ports", "100"]);
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn explicit_ports_replace_top_ports() {
        let (discoverer, runner) = discoverer(ScriptedRunner::new().on("naabu", EngineOutput::success("")));
        let spec: PortSpec = "22, 80".parse().unwrap();

        discoverer
            .discover_ports(&hosts(&[v4(10, 0, 0, 1)]), Some(&spec), &mut Warnings::new())
            .await
            .unwrap();

        assert_eq!(runner.calls()[0].args, vec!["-silent", "-l", "-", "-p", "22,80"]);
    }

    #[tokio::test]
    async fn failing_engine_with_output_is_tolerated() {
        let output = EngineOutput::new("10.0.0.1:22\n", ExitState::Failed(Some(1)));
        let (discoverer, _) = discoverer(ScriptedRunner::new().on("naabu", output));
        let mut warnings = Warnings::new();

        let open = discoverer
            .discover_ports(&hosts(&[v4(10, 0, 0, 1)]), None, &mut warnings)
            .await
            .unwrap();

        assert_eq!(open[&v4(10, 0, 0, 1)], BTreeSet::from([22]));
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn failing_engine_without_output_collapses_to_empty() {
        let output = EngineOutput::new("", ExitState::Failed(Some(2)));
        let (discoverer, _) = discoverer(ScriptedRunner::new().on("naabu", output));
        let mut warnings = Warnings::new();

        let open = discoverer
            .discover_ports(&hosts(&[v4(10, 0, 0, 1)]), None, &mut warnings)
            .await
            .unwrap();

        assert!(open.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[tokio::test]
    async fn no_open_ports_is_silent() {
        let (discoverer, _) = discoverer(ScriptedRunner::new().on("naabu", EngineOutput::success("")));
        let mut warnings = Warnings::new();

        let open = discoverer
            .discover_ports(&hosts(&[v4(10, 0, 0, 1)]), None, &mut warnings)
            .await
            .unwrap();

        assert!(open.is_empty());
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn empty_host_set_is_invalid_input() {
        let (discoverer, runner) = discoverer(ScriptedRunner::new());

        let err = discoverer
            .discover_ports(&BTreeSet::new(), None, &mut Warnings::new())
            .await
            .unwrap_err();

        assert!(err.is_client_error());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_engine_is_fatal() {
        let (discoverer, _) = discoverer(ScriptedRunner::new().missing("naabu"));

        let err = discoverer
            .discover_ports(&hosts(&[v4(10, 0, 0, 1)]), None, &mut Warnings::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ReconError::StageFatal { stage: Stage::PortDiscovery, .. }));
    }
}
