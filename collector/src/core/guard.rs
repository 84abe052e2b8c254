//! Disable-on-error wrapper around collector sends.
//!
//! The first transient transport fault trips the guard for the rest of the
//! run. Whether that fault also reaches the caller depends on strict mode.
//! Unclassified errors always reach the caller and never trip the guard.

use anyhow::Result;
use tracing::{debug, error, warn};

use crate::core::classifier::classify;

#[derive(Debug, Clone)]
pub struct SendGuard {
    enabled: bool,
    raise_on_failure: bool,
}

impl SendGuard {
    pub fn new(raise_on_failure: bool) -> Self {
        Self {
            enabled: true,
            raise_on_failure,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Run `send` unless the guard has tripped.
    ///
    /// Returns `Ok(())` when the send succeeded, was skipped, or failed with a
    /// transient fault outside strict mode. The original error is returned
    /// otherwise.
    pub fn run<F>(&mut self, send: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        if !self.enabled {
            debug!("data collector disabled; skipping send");
            return Ok(());
        }
        let Err(err) = send() else {
            return Ok(());
        };
        let Some(fault) = classify(&err) else {
            return Err(err);
        };

        self.enabled = false;
        if self.raise_on_failure {
            error!(
                fault = %fault,
                error = %format!("{err:#}"),
                "error sending to data collector; raising because raise_on_failure is set"
            );
            return Err(err);
        }
        warn!(
            fault = %fault,
            error = %format!("{err:#}"),
            "error sending to data collector; disabling reporter for the rest of the run"
        );
        Ok(())
    }
}
