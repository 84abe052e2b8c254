//! Deterministic, pure logic behind the reporter.
//!
//! Core modules are free of I/O. Sending happens through the `io::transport`
//! seam; everything here operates on in-memory values so it can be tested in
//! isolation.

pub mod classifier;
pub mod documents;
pub mod error_mapper;
pub mod guard;
pub mod nesting;
pub mod resource_report;
pub mod types;
