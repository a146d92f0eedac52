use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info};

use sonda_common::config::{EngineSpec, HOST_VAR, PORTS_VAR};
use sonda_common::models::{PortMap, ServiceRecord};
use sonda_common::warning::{Stage, Warning};

use crate::engine::{EngineRunner, ExitState, Invocation};
use crate::network::banner::BannerGrabber;

/// Slack on top of the per-host timeout before a task is abandoned.
pub const KILL_GRACE: Duration = Duration::from_secs(2);

/// What the version scan produced over all hosts.
#[derive(Debug, Default)]
pub struct FingerprintReport {
    /// Sorted by host, then port. At most one record per pair.
    pub records: Vec<ServiceRecord>,
    /// Sorted by host.
    pub warnings: Vec<Warning>,
    /// Host tasks started.
    pub dispatched: usize,
    /// Host tasks that reported back.
    pub completed: usize,
}

struct HostOutcome {
    host: IpAddr,
    records: Vec<ServiceRecord>,
    warning: Option<Warning>,
}

impl HostOutcome {
    fn failed(host: IpAddr, message: String) -> Self {
        Self {
            host,
            records: Vec::new(),
            warning: Some(Warning::for_host(Stage::VersionScan, host, message)),
        }
    }
}

/// Runs the version engine once per host, all hosts concurrently.
pub struct VersionScanner {
    runner: Arc<dyn EngineRunner>,
    engine: EngineSpec,
    host_timeout: Duration,
    max_parallel: usize,
    banner: Option<Arc<BannerGrabber>>,
}

impl VersionScanner {
    pub fn new(runner: Arc<dyn EngineRunner>, engine: EngineSpec, host_timeout: Duration, max_parallel: usize) -> Self {
        Self {
            runner,
            engine,
            host_timeout,
            max_parallel: max_parallel.max(1),
            banner: None,
        }
    }

    /// Tries a direct banner grab on well-known ports before the engine.
    pub fn with_banners(mut self, grabber: BannerGrabber) -> Self {
        self.banner = Some(Arc::new(grabber));
        self
    }

    /// Fingerprints every open port in `open`.
    ///
    /// Spawns one task per host and returns once every task has reported or
    /// been abandoned. A slow or failing host only costs its own records.
    ///
    /// A host's budget starts when it gets one of the `max_parallel` slots, so
    /// the whole call takes at most `ceil(hosts / max_parallel)` times the
    /// per-host timeout plus [`KILL_GRACE`].
    pub async fn fingerprint(&self, open: &PortMap) -> FingerprintReport {
        let targets: Vec<(IpAddr, BTreeSet<u16>)> = open
            .iter()
            .filter(|(_, ports)| !ports.is_empty())
            .map(|(host, ports)| (*host, ports.clone()))
            .collect();

        if targets.is_empty() {
            return FingerprintReport::default();
        }

        info!("Fingerprinting services on {} host(s)", targets.len());
        let permits = Arc::new(Semaphore::new(self.max_parallel));
        let (tx, mut rx) = mpsc::channel::<HostOutcome>(targets.len());
        let guard = self.host_timeout + KILL_GRACE;
        let dispatched = targets.len();

        for (host, ports) in targets {
            let tx = tx.clone();
            let permits = permits.clone();
            let runner = self.runner.clone();
            let engine = self.engine.clone();
            let banner = self.banner.clone();
            let host_timeout = self.host_timeout;

            tokio::spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => {
                        let deadline = Instant::now() + host_timeout;
                        let scan = scan_host(runner, &engine, banner, host, ports, deadline);
                        match timeout_at(deadline + KILL_GRACE, scan).await {
                            Ok(outcome) => outcome,
                            Err(_elapsed) => HostOutcome::failed(
                                host,
                                format!("scan did not finish within {guard:?} and was abandoned"),
                            ),
                        }
                    }
                    Err(_closed) => HostOutcome::failed(host, "scan was cancelled".into()),
                };
                let _ = tx.send(outcome).await;
            });
        }
        // Only the tasks hold senders now; the channel closes when the last one is done.
        drop(tx);

        let mut records: BTreeMap<(IpAddr, u16), ServiceRecord> = BTreeMap::new();
        let mut warnings: Vec<(IpAddr, Warning)> = Vec::new();
        let mut completed = 0;

        while let Some(outcome) = rx.recv().await {
            completed += 1;
            for record in outcome.records {
                records.entry((record.host, record.port)).or_insert(record);
            }
            if let Some(warning) = outcome.warning {
                warnings.push((outcome.host, warning));
            }
        }

        warnings.sort_by_key(|(host, _)| *host);
        let mut warnings: Vec<Warning> = warnings.into_iter().map(|(_, warning)| warning).collect();
        if completed < dispatched {
            warnings.push(Warning::new(
                Stage::VersionScan,
                format!("{} of {dispatched} host scan(s) never reported", dispatched - completed),
            ));
        }

        info!("Fingerprinted {} service(s) on {completed}/{dispatched} host(s)", records.len());
        FingerprintReport {
            records: records.into_values().collect(),
            warnings,
            dispatched,
            completed,
        }
    }
}

async fn scan_host(
    runner: Arc<dyn EngineRunner>,
    engine: &EngineSpec,
    banner: Option<Arc<BannerGrabber>>,
    host: IpAddr,
    ports: BTreeSet<u16>,
    deadline: Instant,
) -> HostOutcome {
    let mut records = Vec::new();
    let remaining: Vec<u16> = match banner {
        Some(grabber) => {
            // Banners get at most half of the budget; the engine keeps the rest.
            let now = Instant::now();
            let budget = grabber.timeout().min(deadline.saturating_duration_since(now) / 2);
            let (grabbed, rest) = grabber.grab_all(host, &ports, now + budget).await;
            records.extend(grabbed);
            rest
        }
        None => ports.iter().copied().collect(),
    };

    if remaining.is_empty() {
        return HostOutcome {
            host,
            records,
            warning: None,
        };
    }

    let port_list = remaining
        .iter()
        .map(u16::to_string)
        .collect::<Vec<String>>()
        .join(",");
    let host_text = host.to_string();
    let args = engine.render_args(&[(PORTS_VAR, &port_list), (HOST_VAR, &host_text)]);
    let budget = deadline.saturating_duration_since(Instant::now());
    let invocation = Invocation::new(&engine.program, args).with_timeout(budget);

    debug!("Version scan of {host} on ports {port_list}");
    let output = match runner.run(invocation).await {
        Ok(output) => output,
        Err(e) => {
            let mut outcome = HostOutcome::failed(host, e.to_string());
            outcome.records = records;
            return outcome;
        }
    };

    let parsed: Vec<ServiceRecord> = parse_service_lines(host, &output.text)
        .into_iter()
        .filter(|record| remaining.contains(&record.port))
        .collect();

    let warning = match output.exit {
        ExitState::Success => None,
        ExitState::Failed(_) => Some(format!("{} exited with {}", engine.program, output.exit)),
        ExitState::TimedOut => Some(format!(
            "timed out after {budget:?}, kept {} partial record(s)",
            parsed.len()
        )),
    };

    records.extend(parsed);
    HostOutcome {
        host,
        records,
        warning: warning.map(|message| Warning::for_host(Stage::VersionScan, host, message)),
    }
}

/// Extracts records from `<port>/tcp open <service> [<version...>]` lines.
///
/// Everything else, including closed and filtered ports, is ignored. Repeated
/// ports keep their first record.
pub fn parse_service_lines(host: IpAddr, text: &str) -> Vec<ServiceRecord> {
    let mut seen = BTreeSet::new();
    let mut records = Vec::new();

    for line in text.lines() {
        let mut fields = line.split_whitespace();
        let Some(port) = fields
            .next()
            .and_then(|field| field.strip_suffix("/tcp"))
            .and_then(|port| port.parse::<u16>().ok())
            .filter(|port| *port > 0)
        else {
            continue;
        };
        if fields.next() != Some("open") {
            continue;
        }
        if !seen.insert(port) {
            continue;
        }

        let service = fields.next().unwrap_or("unknown");
        let version = fields.collect::<Vec<&str>>().join(" ");
        let version = (!version.is_empty()).then_some(version);
        records.push(ServiceRecord::new(host, port, service, version));
    }

    records
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
