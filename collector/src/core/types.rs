//! Run-engine handles observed by the reporter.
//!
//! These are the values the run engine hands to lifecycle events. The reporter
//! only reads them (and clones what it must keep past the event call).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node the run converges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    /// Stable node identity; falls back to `name` when the engine has none.
    #[serde(default)]
    pub entity_uuid: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_uuid: None,
            environment: None,
        }
    }

    pub fn entity_uuid(&self) -> &str {
        self.entity_uuid.as_deref().unwrap_or(&self.name)
    }
}

/// One resource instance as declared in a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource type, e.g. `package`.
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    /// Identity property value (often equal to `name`).
    pub identity: String,
    #[serde(default)]
    pub cookbook_name: Option<String>,
    #[serde(default)]
    pub cookbook_version: Option<String>,
    /// Reportable property state.
    #[serde(default)]
    pub state: Map<String, Value>,
    /// Wall-clock time spent converging, as measured by the engine.
    #[serde(default)]
    pub elapsed_ms: u64,
    /// Identity of the resource whose action declared this one, if any.
    #[serde(default)]
    pub parent: Option<String>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            resource_type: resource_type.into(),
            identity: name.clone(),
            name,
            cookbook_name: None,
            cookbook_version: None,
            state: Map::new(),
            elapsed_ms: 0,
            parent: None,
        }
    }

    /// `type[name]`, the form used in logs and error titles.
    pub fn display_name(&self) -> String {
        format!("{}[{}]", self.resource_type, self.name)
    }
}

/// Run list after role and dependency expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandedRunList {
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub recipes: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Cookbook pinned by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookbook {
    pub name: String,
    pub version: String,
}

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Success,
    Failure,
}

/// Run-wide status stored at run start and read when the run ends.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatus {
    pub run_id: String,
    pub node_name: String,
    pub entity_uuid: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Rendered failure chain; `None` while the run is succeeding.
    pub failure: Option<String>,
}

impl RunStatus {
    /// Status for a run starting now.
    pub fn new(run_id: impl Into<String>, node: &Node) -> Self {
        Self::started_at(run_id, node, Utc::now())
    }

    pub fn started_at(run_id: impl Into<String>, node: &Node, start_time: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.into(),
            node_name: node.name.clone(),
            entity_uuid: node.entity_uuid().to_string(),
            start_time,
            end_time: None,
            failure: None,
        }
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.failure.is_some() {
            RunOutcome::Failure
        } else {
            RunOutcome::Success
        }
    }

    pub fn mark_failed(&mut self, exception: &anyhow::Error) {
        self.failure = Some(format!("{exception:#}"));
    }

    pub fn mark_succeeded(&mut self) {
        self.failure = None;
    }

    /// Stamp the end time once; later calls keep the first stamp.
    pub fn stop(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
    }
}
