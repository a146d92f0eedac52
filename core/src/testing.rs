//! Scripted stand-ins for the engine and DNS boundaries.
//!
//! Compiled for unit tests and behind the `testing` feature for the
//! integration test crate.

use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::engine::{EngineError, EngineOutput, EngineRunner, ExitState, Invocation};
use crate::resolver::Resolver;

enum Reply {
    Output(EngineOutput),
    Missing,
}

struct Rule {
    program: String,
    arg: Option<String>,
    delay: Duration,
    reply: Reply,
}

impl Rule {
    fn matches(&self, invocation: &Invocation) -> bool {
        self.program == invocation.program
            && self
                .arg
                .as_ref()
                .is_none_or(|arg| invocation.args.iter().any(|a| a == arg))
    }
}

/// An [`EngineRunner`] answering from a script and recording every call.
///
/// Rules are matched in insertion order. A program without a rule behaves
/// like an engine that is not installed.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every call to `program`.
    pub fn on(self, program: &str, output: EngineOutput) -> Self {
        self.rule(program, None, Duration::ZERO, Reply::Output(output))
    }

    /// Answers calls to `program` that carry `arg` among their arguments.
    pub fn on_arg(self, program: &str, arg: &str, output: EngineOutput) -> Self {
        self.rule(program, Some(arg), Duration::ZERO, Reply::Output(output))
    }

    /// Like [`Self::on_arg`], but the engine takes `delay` to answer.
    ///
    /// If the invocation's timeout is shorter, the call ends at the timeout
    /// with no output and [`ExitState::TimedOut`], like a killed process.
    pub fn slow(self, program: &str, arg: &str, delay: Duration, output: EngineOutput) -> Self {
        self.rule(program, Some(arg), delay, Reply::Output(output))
    }

    /// Calls to `program` fail to spawn.
    pub fn missing(self, program: &str) -> Self {
        self.rule(program, None, Duration::ZERO, Reply::Missing)
    }

    fn rule(mut self, program: &str, arg: Option<&str>, delay: Duration, reply: Reply) -> Self {
        self.rules.push(Rule {
            program: program.to_string(),
            arg: arg.map(str::to_string),
            delay,
            reply,
        });
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn calls_to(&self, program: &str) -> usize {
        self.calls()
            .iter()
            .filter(|invocation| invocation.program == program)
            .count()
    }
}

#[async_trait]
impl EngineRunner for ScriptedRunner {
    async fn run(&self, invocation: Invocation) -> Result<EngineOutput, EngineError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation.clone());
        }

        let not_found = || EngineError::Spawn {
            program: invocation.program.clone(),
            source: io::Error::new(io::ErrorKind::NotFound, "not installed"),
        };

        let Some(rule) = self.rules.iter().find(|rule| rule.matches(&invocation)) else {
            return Err(not_found());
        };

        if let Some(limit) = invocation.timeout
            && limit < rule.delay
        {
            tokio::time::sleep(limit).await;
            return Ok(EngineOutput::new("", ExitState::TimedOut));
        }
        tokio::time::sleep(rule.delay).await;

        match &rule.reply {
            Reply::Output(output) => Ok(output.clone()),
            Reply::Missing => Err(not_found()),
        }
    }
}

/// A [`Resolver`] backed by a fixed table. Unknown names fail to resolve.
#[derive(Default)]
pub struct StaticResolver {
    table: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, addrs: &[&str]) -> Self {
        let addrs = addrs
            .iter()
            .filter_map(|addr| addr.parse::<IpAddr>().ok())
            .collect();
        self.table.insert(name.to_string(), addrs);
        self
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, name: &str) -> io::Result<Vec<IpAddr>> {
        self.table.get(name).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("failed to lookup address information for {name}"),
            )
        })
    }
}
