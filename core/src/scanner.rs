//! The scanning stages that run once hosts are known.
//!
//! * [`ports`]: a single streamed engine invocation that finds open ports on
//!   every host at once.
//! * [`version`]: fans out one fingerprinting task per host and collects the
//!   results through a channel.
//!
//! Both stages only parse engine output through the pure functions they
//! export, so the parsing can be tested without any engine installed.

pub mod ports;
pub mod version;
