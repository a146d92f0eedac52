//! # Reconnaissance Pipeline
//!
//! Classified target in, [`ReconResult`](sonda_common::models::ReconResult) out:
//!
//! 1. [`discovery`]: turns the target into a set of hosts.
//! 2. [`scanner::ports`]: finds open ports on those hosts.
//! 3. [`scanner::version`]: fingerprints every open port, one task per host.
//! 4. [`aggregate`]: merges everything, warnings included.
//!
//! [`pipeline::ReconPipeline`] drives the stages. External tools are only ever
//! reached through [`engine::EngineRunner`] and [`resolver::Resolver`].

pub mod aggregate;
pub mod discovery;
pub mod engine;
pub mod network;
pub mod pipeline;
pub mod resolver;
pub mod scanner;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
