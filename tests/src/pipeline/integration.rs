#![cfg(test)]
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sonda_common::config::ReconConfig;
use sonda_common::models::ReconResult;
use sonda_common::network::target::{Target, TargetKind, classify};
use sonda_common::warning::Stage;
use sonda_core::engine::{EngineOutput, ExitState};
use sonda_core::pipeline::ReconPipeline;
use sonda_core::scanner::version::KILL_GRACE;
use sonda_core::testing::{ScriptedRunner, StaticResolver};

fn pipeline(runner: &Arc<ScriptedRunner>, resolver: StaticResolver, config: ReconConfig) -> ReconPipeline {
    ReconPipeline::with_backends(config, runner.clone(), Arc::new(resolver))
}

async fn run(pipeline: &ReconPipeline, input: &str) -> ReconResult {
    let target: Target = input.parse().unwrap();
    pipeline.run(&target, None).await.unwrap()
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// A single address is scanned as is: no discovery engine, one port scan,
/// one version-scan task.
#[tokio::test]
async fn scenario_single_address() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on("naabu", EngineOutput::success("192.168.1.10:22\n192.168.1.10:80\n"))
            .on(
                "nmap",
                EngineOutput::success("22/tcp open ssh OpenSSH 9.6\n80/tcp open http nginx 1.24.0\n"),
            ),
    );
    let pipeline = pipeline(&runner, StaticResolver::new(), ReconConfig::default());

    let result = run(&pipeline, "192.168.1.10").await;

    assert_eq!(result.kind, TargetKind::SingleAddress);
    assert_eq!(result.hosts, vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10))]);
    assert_eq!(runner.calls_to("subfinder"), 0);
    assert_eq!(runner.calls_to("naabu"), 1);
    assert_eq!(runner.calls_to("nmap"), 1);
    assert_eq!(result.services.len(), 2);
    assert!(result.to_report().error.is_empty());
}

/// A /30 expands to its two usable addresses, without a probe engine.
#[tokio::test]
async fn scenario_address_block() {
    let runner = Arc::new(ScriptedRunner::new().on("naabu", EngineOutput::success("10.0.0.2:443\n")).on(
        "nmap",
        EngineOutput::success("443/tcp open https\n"),
    ));
    let pipeline = pipeline(&runner, StaticResolver::new(), ReconConfig::default());

    let result = run(&pipeline, "10.0.0.0/30").await;

    assert_eq!(result.kind, TargetKind::AddressBlock);
    assert_eq!(result.hosts, vec![ip("10.0.0.1"), ip("10.0.0.2")]);
    assert_eq!(runner.calls()[0].stdin.as_deref(), Some("10.0.0.1\n10.0.0.2\n"));
    assert_eq!(runner.calls_to("nmap"), 1);
    assert_eq!(result.services.len(), 1);
    assert_eq!(result.services[0].host, ip("10.0.0.2"));
}

/// One subdomain resolves, the other does not: the run succeeds with one host
/// and a warning naming the unresolved subdomain.
#[tokio::test]
async fn scenario_domain_with_partial_resolution() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on("subfinder", EngineOutput::success("a.example.com\nb.example.com\n"))
            .on("naabu", EngineOutput::success("93.184.216.34:443\n"))
            .on("nmap", EngineOutput::success("443/tcp open https\n")),
    );
    let resolver = StaticResolver::new().with("a.example.com", &["93.184.216.34"]);
    let pipeline = pipeline(&runner, resolver, ReconConfig::default());

    let result = run(&pipeline, "example.com").await;

    assert_eq!(result.kind, TargetKind::DomainName);
    assert_eq!(result.hosts, vec![ip("93.184.216.34")]);
    assert_eq!(result.subdomains, vec!["a.example.com"]);
    assert_eq!(result.services.len(), 1);

    let report = result.to_report();
    assert_eq!(report.total_hosts, 1);
    assert!(report.error.contains("b.example.com"));
    assert!(result.warnings.iter().all(|w| w.stage == Stage::HostDiscovery));
}

/// No open ports means no version-scan task and a clean result.
#[tokio::test]
async fn scenario_no_open_ports() {
    let runner = Arc::new(ScriptedRunner::new().on("naabu", EngineOutput::success("")));
    let pipeline = pipeline(&runner, StaticResolver::new(), ReconConfig::default());

    let result = run(&pipeline, "192.168.1.10").await;

    assert_eq!(result.hosts.len(), 1);
    assert!(result.services.is_empty());
    assert!(result.warnings.is_empty());
    assert_eq!(runner.calls_to("nmap"), 0);
}

#[tokio::test]
async fn domain_without_resolvable_hosts_is_not_an_error() {
    let runner = Arc::new(ScriptedRunner::new().on("subfinder", EngineOutput::success("ghost.example.com\n")));
    let pipeline = pipeline(&runner, StaticResolver::new(), ReconConfig::default());

    let result = run(&pipeline, "example.com").await;

    assert!(result.hosts.is_empty());
    assert!(result.services.is_empty());
    assert!(!result.warnings.is_empty());
    assert_eq!(runner.calls_to("naabu"), 0);

    let json = serde_json::to_value(result.to_report()).unwrap();
    assert_eq!(json["total_hosts"], 0);
    assert!(json["error"].as_str().unwrap().contains("ghost.example.com"));
}

/// Two of five hosts hang in the version engine. The others still report, and
/// the run ends shortly after the per-host timeout.
#[tokio::test]
async fn slow_hosts_only_lose_their_own_records() {
    let open: String = (1..=5).map(|last| format!("10.0.0.{last}:22\n")).collect();
    let runner = Arc::new(
        ScriptedRunner::new()
            .on("naabu", EngineOutput::success(open))
            .slow("nmap", "10.0.0.2", Duration::from_secs(60), EngineOutput::success(""))
            .slow("nmap", "10.0.0.4", Duration::from_secs(60), EngineOutput::success(""))
            .on("nmap", EngineOutput::success("22/tcp open ssh\n")),
    );
    let config = ReconConfig {
        host_scan_timeout: Duration::from_millis(300),
        ..ReconConfig::default()
    };
    let pipeline = pipeline(&runner, StaticResolver::new(), config);

    let started = Instant::now();
    let result = run(&pipeline, "10.0.0.0/29").await;

    assert!(started.elapsed() < Duration::from_millis(300) + KILL_GRACE);
    assert_eq!(result.hosts.len(), 6);
    let scanned: Vec<IpAddr> = result.services.iter().map(|s| s.host).collect();
    assert_eq!(scanned, vec![ip("10.0.0.1"), ip("10.0.0.3"), ip("10.0.0.5")]);

    let timed_out: Vec<Option<&str>> = result
        .warnings
        .iter()
        .filter(|w| w.stage == Stage::VersionScan)
        .map(|w| w.host.as_deref())
        .collect();
    assert_eq!(timed_out, vec![Some("10.0.0.2"), Some("10.0.0.4")]);
}

#[tokio::test]
async fn port_engine_failure_without_output_still_succeeds() {
    let runner = Arc::new(ScriptedRunner::new().on("naabu", EngineOutput::new("", ExitState::Failed(Some(1)))));
    let pipeline = pipeline(&runner, StaticResolver::new(), ReconConfig::default());

    let result = run(&pipeline, "192.168.1.10").await;

    assert!(result.services.is_empty());
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings.iter().next().map(|w| w.stage), Some(Stage::PortDiscovery));
}

#[test]
fn classification_is_stable() {
    for input in ["192.168.1.10", "10.0.0.0/30", "2001:db8::/126", "example.com"] {
        let first = classify(input);
        assert_eq!(classify(input), first);
        let target: Target = input.parse().unwrap();
        assert_eq!(target.kind(), first);
    }
}
