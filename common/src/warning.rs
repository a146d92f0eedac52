//! Non-fatal failures collected while a pipeline runs.
//!
//! A stage that partially fails records a [`Warning`] and keeps going. The
//! list only ever grows; it is rendered to a single line at the output boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator used when rendering warnings to one line of text.
pub const SEPARATOR: &str = "; ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    HostDiscovery,
    PortDiscovery,
    VersionScan,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::HostDiscovery => "host discovery",
            Stage::PortDiscovery => "port discovery",
            Stage::VersionScan => "version scan",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub stage: Stage,
    /// The host or hostname the failure is attributed to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            host: None,
            message: message.into(),
        }
    }

    pub fn for_host(stage: Stage, host: impl ToString, message: impl Into<String>) -> Self {
        Self {
            stage,
            host: Some(host.to_string()),
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Some(host) => write!(f, "{} [{}]: {}", self.stage, host, self.message),
            None => write!(f, "{}: {}", self.stage, self.message),
        }
    }
}

/// Append-only, ordered collection of [`Warning`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Warnings(Vec<Warning>);

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: Warning) {
        tracing::warn!("{warning}");
        self.0.push(warning);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Warning> {
        self.0.iter()
    }

    /// Renders every warning, in order, as one human readable line.
    pub fn render(&self) -> String {
        self.0
            .iter()
            .map(Warning::to_string)
            .collect::<Vec<String>>()
            .join(SEPARATOR)
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.0
    }
}

impl Extend<Warning> for Warnings {
    fn extend<T: IntoIterator<Item = Warning>>(&mut self, iter: T) {
        for warning in iter {
            self.push(warning);
        }
    }
}

impl From<Vec<Warning>> for Warnings {
    fn from(warnings: Vec<Warning>) -> Self {
        Self(warnings)
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
