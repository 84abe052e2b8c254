//! Replays a recorded run-event stream through a dispatcher.
//!
//! Stands in for the run engine: events are dispatched in file order, and a
//! failing boundary event aborts the replay the same way it would abort a
//! live run.

use anyhow::{Result, anyhow};
use tracing::{info, instrument, warn};

use crate::core::types::RunStatus;
use crate::dispatch::RunEvents;
use crate::io::events::RecordedEvent;

#[derive(Debug)]
pub struct ReplayOutcome {
    /// Events delivered before the replay finished or aborted.
    pub dispatched: usize,
    /// Error that aborted the run, if a subscriber raised one.
    pub aborted: Option<anyhow::Error>,
}

#[instrument(skip_all, fields(events = events.len()))]
pub fn replay<D: RunEvents>(events: &[RecordedEvent], dispatcher: &mut D) -> ReplayOutcome {
    for (idx, event) in events.iter().enumerate() {
        if let Err(err) = dispatch_event(event, dispatcher) {
            warn!(index = idx, error = %format!("{err:#}"), "run aborted by subscriber");
            return ReplayOutcome {
                dispatched: idx + 1,
                aborted: Some(err),
            };
        }
    }
    info!("replay finished");
    ReplayOutcome {
        dispatched: events.len(),
        aborted: None,
    }
}

fn dispatch_event<D: RunEvents>(event: &RecordedEvent, dispatcher: &mut D) -> Result<()> {
    match event {
        RecordedEvent::RunStarted { run_id, node } => {
            dispatcher.run_started(&RunStatus::new(run_id.clone(), node))
        }
        RecordedEvent::RunCompleted { node } => dispatcher.run_completed(node),
        RecordedEvent::RunFailed { message } => dispatcher.run_failed(&anyhow!(message.clone())),
        RecordedEvent::ResourceCurrentStateLoaded {
            resource,
            action,
            current_resource,
        } => {
            dispatcher.resource_current_state_loaded(resource, action, current_resource.as_ref());
            Ok(())
        }
        RecordedEvent::ResourceUpToDate { resource, action } => {
            dispatcher.resource_up_to_date(resource, action);
            Ok(())
        }
        RecordedEvent::ResourceSkipped {
            resource,
            action,
            conditional,
        } => {
            dispatcher.resource_skipped(resource, action, conditional);
            Ok(())
        }
        RecordedEvent::ResourceUpdated { resource, action } => {
            dispatcher.resource_updated(resource, action);
            Ok(())
        }
        RecordedEvent::ResourceFailed {
            resource,
            action,
            message,
        } => {
            dispatcher.resource_failed(resource, action, &anyhow!(message.clone()));
            Ok(())
        }
        RecordedEvent::ResourceCompleted { resource } => {
            dispatcher.resource_completed(resource);
            Ok(())
        }
        RecordedEvent::RunListExpanded { run_list } => {
            dispatcher.run_list_expanded(run_list);
            Ok(())
        }
        RecordedEvent::RunListExpandFailed { node, message } => {
            dispatcher.run_list_expand_failed(node, &anyhow!(message.clone()));
            Ok(())
        }
        RecordedEvent::CookbookResolutionFailed { run_list, message } => {
            dispatcher.cookbook_resolution_failed(run_list, &anyhow!(message.clone()));
            Ok(())
        }
        RecordedEvent::CookbookSyncFailed { cookbooks, message } => {
            dispatcher.cookbook_sync_failed(cookbooks, &anyhow!(message.clone()));
            Ok(())
        }
    }
}
