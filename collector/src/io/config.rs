//! Collector configuration stored as TOML (default `collector.toml`).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Data collector configuration (TOML).
///
/// Missing fields default to values that keep reporting off until a
/// `server_url` is provided.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CollectorConfig {
    /// Master switch for reporting.
    pub enabled: bool,

    /// Collector endpoint that receives run messages.
    pub server_url: Option<String>,

    /// Fail the run when the collector cannot be reached.
    pub raise_on_failure: bool,

    /// Organization name stamped on every message.
    pub organization: String,

    /// Message source stamped on every message.
    pub source: String,

    /// Per-request timeout for the HTTP transport.
    pub request_timeout_secs: u64,

    /// Extra static headers added to every request.
    pub headers: BTreeMap<String, String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server_url: None,
            raise_on_failure: false,
            organization: "chef_solo".to_string(),
            source: "chef_client".to_string(),
            request_timeout_secs: 10,
            headers: BTreeMap::new(),
        }
    }
}

impl CollectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be > 0"));
        }
        if self.organization.trim().is_empty() {
            return Err(anyhow!("organization must be non-empty"));
        }
        if let Some(raw) = &self.server_url {
            let url = Url::parse(raw).with_context(|| format!("parse server_url {raw}"))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(anyhow!("server_url must use http or https, got {}", url.scheme()));
            }
        }
        Ok(())
    }

    /// Reporting is on only when enabled and an endpoint is configured.
    pub fn collector_enabled(&self) -> bool {
        self.enabled && self.server_url.is_some()
    }

    /// Host part of `server_url`, if any.
    pub fn server_fqdn(&self) -> Option<String> {
        let raw = self.server_url.as_deref()?;
        Url::parse(raw).ok()?.host_str().map(str::to_string)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CollectorConfig::default()`.
pub fn load_config(path: &Path) -> Result<CollectorConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing; using defaults");
        let cfg = CollectorConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CollectorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &CollectorConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
