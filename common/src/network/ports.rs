use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::ReconError;

/// An explicit selection of TCP ports, e.g. `22,80,8000-8100`.
///
/// The canonical text form (no whitespace) is what gets handed to the
/// port-discovery engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    canonical: String,
    ranges: Vec<RangeInclusive<u16>>,
}

impl PortSpec {
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    pub fn contains(&self, port: u16) -> bool {
        self.ranges.iter().any(|range| range.contains(&port))
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl FromStr for PortSpec {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ranges = Vec::new();
        let mut parts = Vec::new();

        for part in s.split(',').map(str::trim) {
            if part.is_empty() {
                continue;
            }
            let range = match part.split_once('-') {
                Some((start, end)) => {
                    let start = parse_port(start.trim(), s)?;
                    let end = parse_port(end.trim(), s)?;
                    if start > end {
                        return Err(ReconError::invalid(format!(
                            "invalid port range '{part}' in '{s}'"
                        )));
                    }
                    start..=end
                }
                None => {
                    let port = parse_port(part, s)?;
                    port..=port
                }
            };
            parts.push(if range.start() == range.end() {
                range.start().to_string()
            } else {
                format!("{}-{}", range.start(), range.end())
            });
            ranges.push(range);
        }

        if ranges.is_empty() {
            return Err(ReconError::invalid("port list must not be empty"));
        }

        Ok(PortSpec {
            canonical: parts.join(","),
            ranges,
        })
    }
}

fn parse_port(token: &str, spec: &str) -> Result<u16, ReconError> {
    match token.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ReconError::invalid(format!(
            "invalid port '{token}' in '{spec}'"
        ))),
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
