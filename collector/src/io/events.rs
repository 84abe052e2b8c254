//! Recorded run-event streams (`.jsonl`, one event per line).
//!
//! Failures are recorded as messages; replay turns them back into errors.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::{Cookbook, ExpandedRunList, Node, Resource};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecordedEvent {
    RunStarted {
        run_id: String,
        node: Node,
    },
    RunCompleted {
        node: Node,
    },
    RunFailed {
        message: String,
    },
    ResourceCurrentStateLoaded {
        resource: Resource,
        action: String,
        #[serde(default)]
        current_resource: Option<Resource>,
    },
    ResourceUpToDate {
        resource: Resource,
        action: String,
    },
    ResourceSkipped {
        resource: Resource,
        action: String,
        conditional: String,
    },
    ResourceUpdated {
        resource: Resource,
        action: String,
    },
    ResourceFailed {
        resource: Resource,
        action: String,
        message: String,
    },
    ResourceCompleted {
        resource: Resource,
    },
    RunListExpanded {
        run_list: ExpandedRunList,
    },
    RunListExpandFailed {
        node: Node,
        message: String,
    },
    CookbookResolutionFailed {
        run_list: ExpandedRunList,
        message: String,
    },
    CookbookSyncFailed {
        cookbooks: Vec<Cookbook>,
        message: String,
    },
}

/// Parse a JSONL event stream. Blank lines are ignored.
pub fn parse_events(contents: &str) -> Result<Vec<RecordedEvent>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).with_context(|| format!("parse event on line {}", idx + 1))
        })
        .collect()
}

pub fn load_events(path: &Path) -> Result<Vec<RecordedEvent>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read events {}", path.display()))?;
    let events = parse_events(&contents).with_context(|| format!("parse {}", path.display()))?;
    debug!(path = %path.display(), count = events.len(), "events loaded");
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_events_and_skips_blank_lines() {
        let contents = r#"{"event":"run_started","run_id":"r1","node":{"name":"web01"}}

{"event":"resource_up_to_date","resource":{"type":"file","name":"/a","identity":"/a"},"action":"create"}
{"event":"run_completed","node":{"name":"web01"}}
"#;
        let events = parse_events(contents).expect("parse");
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], RecordedEvent::RunStarted { run_id, .. } if run_id == "r1"));
        assert!(matches!(&events[1], RecordedEvent::ResourceUpToDate { action, .. } if action == "create"));
    }

    #[test]
    fn reports_line_number_of_bad_event() {
        let contents = "{\"event\":\"run_failed\",\"message\":\"x\"}\n{\"event\":\"nope\"}\n";
        let err = parse_events(contents).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn load_events_reads_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("events.jsonl");
        fs::write(&path, "{\"event\":\"run_failed\",\"message\":\"boom\"}\n").expect("write");
        let events = load_events(&path).expect("load");
        assert_eq!(
            events,
            vec![RecordedEvent::RunFailed {
                message: "boom".to_string()
            }]
        );
    }
}
