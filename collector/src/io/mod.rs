//! I/O helpers: configuration, HTTP transport and recorded event streams.

pub mod config;
pub mod events;
pub mod transport;
