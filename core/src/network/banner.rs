use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use futures::future::join_all;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::debug;

use sonda_common::models::ServiceRecord;

const MAX_BANNER: usize = 4096;

/// What to say to a well-known port to make it identify itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerProbe {
    /// Read the identification line the server sends first.
    Ssh,
    /// Send a `HEAD /` request and read the `Server` header.
    Http,
}

/// Fingerprints well-known ports with a direct TCP exchange.
pub struct BannerGrabber {
    probes: BTreeMap<u16, BannerProbe>,
    timeout: Duration,
}

impl BannerGrabber {
    /// Probes 22 as SSH and 80 as HTTP. `timeout` bounds each port's exchange.
    pub fn new(timeout: Duration) -> Self {
        let probes = BTreeMap::from([(22, BannerProbe::Ssh), (80, BannerProbe::Http)]);
        Self { probes, timeout }
    }

    pub fn with_probe(mut self, port: u16, probe: BannerProbe) -> Self {
        self.probes.insert(port, probe);
        self
    }

    /// Upper bound of a single exchange.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Grabs what it can from `ports`, all ports at once, and returns the
    /// ports left for the version engine, ascending.
    ///
    /// Exchanges still running at `deadline` count as failed.
    pub async fn grab_all(
        &self,
        host: IpAddr,
        ports: &BTreeSet<u16>,
        deadline: Instant,
    ) -> (Vec<ServiceRecord>, Vec<u16>) {
        let grabs = ports.iter().map(|&port| async move {
            let record = timeout_at(deadline, self.grab(host, port)).await.ok().flatten();
            (port, record)
        });

        let mut records = Vec::new();
        let mut remaining = Vec::new();
        for (port, record) in join_all(grabs).await {
            match record {
                Some(record) => records.push(record),
                None => remaining.push(port),
            }
        }
        (records, remaining)
    }

    /// `None` when no probe is configured for `port` or the exchange failed.
    pub async fn grab(&self, host: IpAddr, port: u16) -> Option<ServiceRecord> {
        let probe = *self.probes.get(&port)?;
        let addr = SocketAddr::new(host, port);

        match timeout(self.timeout, exchange(addr, probe)).await {
            Ok(Some(version)) => {
                debug!("Banner from {addr}: {version:?}");
                let service = match probe {
                    BannerProbe::Ssh => "ssh",
                    BannerProbe::Http => "http",
                };
                Some(ServiceRecord::new(host, port, service, version))
            }
            Ok(None) => {
                debug!("No usable banner from {addr}");
                None
            }
            Err(_elapsed) => {
                debug!("Banner grab on {addr} timed out");
                None
            }
        }
    }
}

/// `Some(version)` when the peer spoke the expected protocol.
async fn exchange(addr: SocketAddr, probe: BannerProbe) -> Option<Option<String>> {
    let mut stream = TcpStream::connect(addr).await.ok()?;

    match probe {
        BannerProbe::Ssh => {
            let banner = read_banner(&mut stream, true).await?;
            let line = banner.lines().next()?.trim();
            let ident = line.strip_prefix("SSH-")?;
            // SSH-<protoversion>-<softwareversion> [comments]
            let software = ident.split_once('-').map(|(_, sw)| sw.trim()).unwrap_or_default();
            Some((!software.is_empty()).then(|| software.to_string()))
        }
        BannerProbe::Http => {
            let request = format!("HEAD / HTTP/1.0\r\nHost: {}\r\n\r\n", addr.ip());
            stream.write_all(request.as_bytes()).await.ok()?;
            let response = read_banner(&mut stream, false).await?;
            if !response.starts_with("HTTP/") {
                return None;
            }
            Some(server_header(&response))
        }
    }
}

async fn read_banner(stream: &mut TcpStream, first_line_only: bool) -> Option<String> {
    let mut buf = vec![0u8; MAX_BANNER];
    let mut filled = 0;

    while filled < MAX_BANNER {
        let n = stream.read(&mut buf[filled..]).await.ok()?;
        if n == 0 {
            break;
        }
        filled += n;
        let seen = &buf[..filled];
        if first_line_only && seen.contains(&b'\n') {
            break;
        }
        if seen.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    (filled > 0).then(|| String::from_utf8_lossy(&buf[..filled]).into_owned())
}

fn server_header(response: &str) -> Option<String> {
    response
        .lines()
        .skip(1)
        .take_while(|line| !line.trim().is_empty())
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("server"))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
