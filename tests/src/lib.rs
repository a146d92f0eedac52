//! End-to-end runs of the reconnaissance pipeline against scripted engines.

mod pipeline;
