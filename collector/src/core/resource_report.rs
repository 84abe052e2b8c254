//! Per-resource convergence report.
//!
//! A report is opened when a resource's current state is loaded (or when its
//! action raises), mutated while the resource converges, and frozen by
//! [`ResourceReport::finish`] before the reporter appends it to the run's
//! updated-resource list.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::types::Resource;

/// Convergence result of a single resource action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceStatus {
    /// State loaded, no outcome observed yet.
    Unprocessed,
    Updated,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceReport {
    resource: Resource,
    action: String,
    before: Option<Map<String, Value>>,
    status: ResourceStatus,
    error_message: Option<String>,
    elapsed_ms: Option<u64>,
}

impl ResourceReport {
    /// Report for the normal convergence path.
    pub fn for_current_resource(
        resource: &Resource,
        action: &str,
        current_resource: Option<&Resource>,
    ) -> Self {
        Self {
            resource: resource.clone(),
            action: action.to_string(),
            before: current_resource.map(|current| current.state.clone()),
            status: ResourceStatus::Unprocessed,
            error_message: None,
            elapsed_ms: None,
        }
    }

    /// Report for a resource whose action raised.
    pub fn for_exception(resource: &Resource, action: &str, exception: &anyhow::Error) -> Self {
        let mut report = Self::for_current_resource(resource, action, None);
        report.failed(exception);
        report
    }

    pub fn updated(&mut self) {
        self.status = ResourceStatus::Updated;
    }

    pub fn failed(&mut self, exception: &anyhow::Error) {
        self.status = ResourceStatus::Failed;
        self.error_message = Some(format!("{exception:#}"));
    }

    /// Record the elapsed time reported by the engine at completion.
    pub fn finish(&mut self, elapsed_ms: u64) {
        self.elapsed_ms = Some(elapsed_ms);
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed_ms.is_some()
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn status(&self) -> ResourceStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Changed properties as `key: before -> after` lines.
    fn delta(&self) -> String {
        let Some(before) = &self.before else {
            return String::new();
        };
        let mut lines = Vec::new();
        for (key, after) in &self.resource.state {
            match before.get(key) {
                Some(previous) if previous == after => {}
                Some(previous) => lines.push(format!("{key}: {previous} -> {after}")),
                None => lines.push(format!("{key}: (none) -> {after}")),
            }
        }
        lines.join("\n")
    }

    /// Wire form used inside the run-end document.
    pub fn to_document(&self) -> Value {
        let resource = &self.resource;
        let mut doc = Map::new();
        doc.insert("type".into(), Value::from(resource.resource_type.clone()));
        doc.insert("name".into(), Value::from(resource.name.clone()));
        doc.insert("id".into(), Value::from(resource.identity.clone()));
        doc.insert(
            "before".into(),
            Value::Object(self.before.clone().unwrap_or_default()),
        );
        doc.insert("after".into(), Value::Object(resource.state.clone()));
        doc.insert(
            "duration".into(),
            Value::from(self.elapsed_ms.unwrap_or(0).to_string()),
        );
        doc.insert("delta".into(), Value::from(self.delta()));
        doc.insert("result".into(), Value::from(self.action.clone()));
        doc.insert(
            "status".into(),
            serde_json::to_value(self.status).unwrap_or(Value::Null),
        );
        if let Some(message) = &self.error_message {
            doc.insert("error_message".into(), Value::from(message.clone()));
        }
        if let Some(name) = &resource.cookbook_name {
            doc.insert("cookbook_name".into(), Value::from(name.clone()));
        }
        if let Some(version) = &resource.cookbook_version {
            doc.insert("cookbook_version".into(), Value::from(version.clone()));
        }
        Value::Object(doc)
    }
}
