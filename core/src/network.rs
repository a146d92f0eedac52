//! Direct network access, bypassing the external engines.

pub mod banner;
