//! Test-only helpers: scripted transports, resource builders and log capture.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context as _, Result, anyhow};
use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{Layer, registry};

use crate::core::classifier::{TransportError, TransportFault};
use crate::core::types::{Node, Resource, RunStatus};
use crate::io::transport::Transport;

/// Scripted outcome for one send attempt.
#[derive(Debug, Clone)]
pub enum ScriptedSend {
    Accept,
    Fault(TransportFault),
    Unclassified(String),
}

/// Transport that records every document and replays scripted outcomes.
///
/// Once the script is exhausted every send is accepted.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: RefCell<VecDeque<ScriptedSend>>,
    sent: RefCell<Vec<Value>>,
    attempts: RefCell<usize>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<ScriptedSend>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            ..Self::default()
        }
    }

    /// Documents that were accepted.
    pub fn sent(&self) -> Vec<Value> {
        self.sent.borrow().clone()
    }

    /// Every send attempt, accepted or not.
    pub fn attempts(&self) -> usize {
        *self.attempts.borrow()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, document: &Value) -> Result<()> {
        *self.attempts.borrow_mut() += 1;
        let next = self
            .script
            .borrow_mut()
            .pop_front()
            .unwrap_or(ScriptedSend::Accept);
        match next {
            ScriptedSend::Accept => {
                self.sent.borrow_mut().push(document.clone());
                Ok(())
            }
            ScriptedSend::Fault(fault) => Err(TransportError::new(fault, "scripted fault").into()),
            ScriptedSend::Unclassified(message) => Err(anyhow!(message)),
        }
    }
}

/// Top-level `package` resource.
pub fn resource(name: &str) -> Resource {
    Resource::new("package", name)
}

/// `template` resource declared inside `parent`'s action.
pub fn nested_resource(name: &str, parent: &str) -> Resource {
    let mut resource = Resource::new("template", name);
    resource.parent = Some(parent.to_string());
    resource
}

pub fn node(name: &str) -> Node {
    Node::new(name)
}

pub fn run_status(run_id: &str) -> RunStatus {
    RunStatus::new(run_id, &node("web01"))
}

/// Events captured by [`capture_logs`].
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl CapturedLogs {
    fn push(&self, level: Level, message: String) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push((level, message));
    }

    pub fn count(&self, level: Level) -> usize {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.iter().filter(|(l, _)| *l == level).count()
    }

    pub fn messages(&self, level: Level) -> Vec<String> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

struct CaptureLayer {
    logs: CapturedLogs,
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.logs.push(*event.metadata().level(), visitor.0);
    }
}

/// Run `f` with a thread-local subscriber that records every event.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, CapturedLogs) {
    let logs = CapturedLogs::default();
    let subscriber = registry().with(CaptureLayer { logs: logs.clone() });
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, logs)
}

/// Temporary directory holding a config file and a recorded event stream.
pub struct ReplayFixture {
    dir: tempfile::TempDir,
}

impl ReplayFixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir().context("create tempdir")?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_config(&self, contents: &str) -> Result<PathBuf> {
        let path = self.path().join("collector.toml");
        std::fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    pub fn write_events(&self, lines: &[&str]) -> Result<PathBuf> {
        let path = self.path().join("events.jsonl");
        let mut contents = lines.join("\n");
        contents.push('\n');
        std::fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}
