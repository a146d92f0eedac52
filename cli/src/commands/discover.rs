use std::time::{Duration, Instant};

use anyhow::Context;
use colored::*;
use sonda_common::config::ReconConfig;
use sonda_common::models::ReconResult;
use sonda_common::network::target::Target;
use sonda_core::pipeline::ReconPipeline;

use crate::terminal::{colors, print};

pub async fn discover(target: Target, config: ReconConfig) -> anyhow::Result<()> {
    let pipeline = ReconPipeline::new(config);

    let start_time: Instant = Instant::now();
    let result: ReconResult = pipeline
        .discover(&target)
        .await
        .with_context(|| format!("host discovery for {target} failed"))?;

    discovery_ends(&result, start_time.elapsed());
    Ok(())
}

fn discovery_ends(result: &ReconResult, total_time: Duration) {
    if result.hosts.is_empty() {
        print::header("zero hosts detected");
        print::no_results();
        return;
    }

    print::header("host discovery");
    for (idx, host) in result.hosts.iter().enumerate() {
        let color = if host.is_ipv4() { colors::IPV4_ADDR } else { colors::IPV6_ADDR };
        print::print(&format!(
            "{} {}",
            format!("[{}]", idx.to_string().color(colors::ACCENT)).color(colors::SEPARATOR),
            host.to_string().color(color)
        ));
    }

    if !result.subdomains.is_empty() {
        print::header("subdomains");
        for subdomain in &result.subdomains {
            print::print(&format!("  {}", subdomain.color(colors::ACCENT)));
        }
    }

    let active_hosts: ColoredString = format!("{} hosts", result.hosts.len()).bold().green();
    let total_time: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();
    print::fat_separator();
    print::centerln(&format!("Discovery Complete: {active_hosts} in scope after {total_time}"));
}
