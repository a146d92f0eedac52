//! Shared model of the `sonda` workspace.
//!
//! Everything that crosses a crate boundary lives here: the scan [`network::target`]
//! model, the result types in [`models`], the accumulated [`warning`]s, the
//! [`config`] consumed by the pipeline and the [`error`] taxonomy.

pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod warning;
