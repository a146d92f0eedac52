//! The **process-execution boundary** to the external scanner engines.
//!
//! Every stage describes the engine call it needs as an [`Invocation`] and hands
//! it to an [`EngineRunner`]. The stages only ever look at the text output and
//! the [`ExitState`]; how the engine is actually launched is up to the runner.
//!
//! [`process::ProcessRunner`] is the production runner.

use std::fmt;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod process;

pub use process::ProcessRunner;

/// One call to an external engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Written to the engine's stdin, which is then closed.
    pub stdin: Option<String>,
    /// Hard limit after which the engine is killed.
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            stdin: None,
            timeout: None,
        }
    }

    pub fn with_stdin(mut self, input: String) -> Self {
        self.stdin = Some(input);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    Success,
    /// Non-zero exit. `None` when the process was ended by a signal.
    Failed(Option<i32>),
    /// Killed after exceeding [`Invocation::timeout`].
    TimedOut,
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitState::Success => f.write_str("success"),
            ExitState::Failed(Some(code)) => write!(f, "exit status {code}"),
            ExitState::Failed(None) => f.write_str("termination by signal"),
            ExitState::TimedOut => f.write_str("timeout"),
        }
    }
}

/// Everything an engine printed, stdout and stderr interleaved by line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    pub text: String,
    pub exit: ExitState,
}

impl EngineOutput {
    pub fn new(text: impl Into<String>, exit: ExitState) -> Self {
        Self {
            text: text.into(),
            exit,
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(text, ExitState::Success)
    }

    pub fn is_success(&self) -> bool {
        self.exit == ExitState::Success
    }

    /// Trimmed, non-empty output lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines().map(str::trim).filter(|line| !line.is_empty())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("lost track of '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Runs external engines. Implementations must honor [`Invocation::timeout`].
#[async_trait]
pub trait EngineRunner: Send + Sync {
    async fn run(&self, invocation: Invocation) -> Result<EngineOutput, EngineError>;
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
