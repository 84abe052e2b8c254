//! Stable exit codes for collector CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid config, unreadable event stream, or other setup errors.
pub const INVALID: i32 = 1;
/// A reporting error aborted the replayed run (strict mode or unclassified).
pub const REPORT_FAILED: i32 = 2;
