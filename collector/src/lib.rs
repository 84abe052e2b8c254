//! Run-event data collector reporter.
//!
//! Observes a configuration-management run through lifecycle events and posts
//! run messages to a remote data collector without letting collector outages
//! fail the run. The crate keeps the same split throughout:
//!
//! - **[`core`]**: Pure logic (resource reports, documents, fault
//!   classification, the send guard). No I/O.
//! - **[`io`]**: Configuration, the HTTP transport and recorded event streams.
//!
//! [`reporter`] wires core and I/O together behind the [`dispatch::RunEvents`]
//! interface; [`replay`] drives it from a recorded stream for the CLI.

pub mod core;
pub mod dispatch;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod replay;
pub mod reporter;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
