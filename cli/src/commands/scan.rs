use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use anyhow::Context;
use colored::*;
use sonda_common::config::ReconConfig;
use sonda_common::models::{ReconResult, ServiceRecord};
use sonda_common::network::ports::PortSpec;
use sonda_common::network::target::Target;
use sonda_core::pipeline::ReconPipeline;

use crate::terminal::{colors, print};

type Detail = (String, ColoredString);

pub async fn scan(target: Target, ports: Option<PortSpec>, json: bool, config: ReconConfig) -> anyhow::Result<()> {
    let pipeline = ReconPipeline::new(config);

    let start_time: Instant = Instant::now();
    let result: ReconResult = pipeline
        .run(&target, ports.as_ref())
        .await
        .with_context(|| format!("reconnaissance of {target} failed"))?;

    if json {
        let report = serde_json::to_string_pretty(&result.to_report())?;
        println!("{report}");
        return Ok(());
    }

    scan_ends(&result, start_time.elapsed());
    Ok(())
}

fn scan_ends(result: &ReconResult, total_time: Duration) {
    if result.hosts.is_empty() {
        print::header("zero hosts detected");
        print::no_results();
        return;
    }

    print::header("reconnaissance report");
    let mut services: BTreeMap<IpAddr, Vec<&ServiceRecord>> = BTreeMap::new();
    for record in &result.services {
        services.entry(record.host).or_default().push(record);
    }

    for (idx, host) in result.hosts.iter().enumerate() {
        print::tree_head(idx, &host.to_string());
        let details: Vec<Detail> = match services.get(host) {
            Some(records) => records.iter().map(|record| service_to_detail(record)).collect(),
            None => vec![("ports".to_string(), "no open ports".dimmed())],
        };
        print::as_tree_one_level(&details);
        if idx + 1 != result.hosts.len() {
            print::print("");
        }
    }

    if !result.subdomains.is_empty() {
        print::header("subdomains");
        for subdomain in &result.subdomains {
            print::print(&format!("  {}", subdomain.color(colors::ACCENT)));
        }
    }

    print_summary(result, total_time);
}

fn service_to_detail(record: &ServiceRecord) -> Detail {
    let key: String = format!("{}/tcp", record.port);
    let value: ColoredString = match &record.version {
        Some(version) => format!("{} {}", record.service.color(colors::SERVICE), version).normal(),
        None => record.service.color(colors::SERVICE),
    };
    (key, value)
}

fn print_summary(result: &ReconResult, total_time: Duration) {
    let hosts: ColoredString = format!("{} hosts", result.hosts.len()).bold().green();
    let services: ColoredString = format!("{} services", result.services.len()).bold().green();
    let total_time: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();

    print::fat_separator();
    print::centerln(&format!("Reconnaissance Complete: {hosts}, {services} in {total_time}"));
    if !result.warnings.is_empty() {
        let warnings: ColoredString = format!("{} warning(s)", result.warnings.len()).bold().yellow();
        print::centerln(&format!("finished with {warnings}"));
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
