//! Run-event subscription interface and fan-out dispatcher.
//!
//! The run engine owns an [`EventDispatcher`] and calls it at each lifecycle
//! point. Subscribers implement only the events they care about; every method
//! defaults to a no-op. Boundary events (run start and end) may fail, which
//! aborts the run.

use anyhow::Result;
use tracing::{debug, info};

use crate::core::types::{Cookbook, ExpandedRunList, Node, Resource, RunStatus};
use crate::io::config::CollectorConfig;
use crate::io::transport::Transport;
use crate::reporter::Reporter;

pub trait RunEvents {
    fn run_started(&mut self, _status: &RunStatus) -> Result<()> {
        Ok(())
    }

    fn run_completed(&mut self, _node: &Node) -> Result<()> {
        Ok(())
    }

    fn run_failed(&mut self, _exception: &anyhow::Error) -> Result<()> {
        Ok(())
    }

    fn resource_current_state_loaded(
        &mut self,
        _resource: &Resource,
        _action: &str,
        _current_resource: Option<&Resource>,
    ) {
    }

    fn resource_up_to_date(&mut self, _resource: &Resource, _action: &str) {}

    fn resource_skipped(&mut self, _resource: &Resource, _action: &str, _conditional: &str) {}

    fn resource_updated(&mut self, _resource: &Resource, _action: &str) {}

    fn resource_failed(&mut self, _resource: &Resource, _action: &str, _exception: &anyhow::Error) {
    }

    fn resource_completed(&mut self, _resource: &Resource) {}

    fn run_list_expanded(&mut self, _run_list: &ExpandedRunList) {}

    fn run_list_expand_failed(&mut self, _node: &Node, _exception: &anyhow::Error) {}

    fn cookbook_resolution_failed(
        &mut self,
        _run_list: &ExpandedRunList,
        _exception: &anyhow::Error,
    ) {
    }

    fn cookbook_sync_failed(&mut self, _cookbooks: &[Cookbook], _exception: &anyhow::Error) {}
}

/// Forwards each event to every subscriber in registration order.
#[derive(Default)]
pub struct EventDispatcher {
    subscribers: Vec<Box<dyn RunEvents>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, subscriber: Box<dyn RunEvents>) {
        self.subscribers.push(subscriber);
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    fn each(&mut self, mut f: impl FnMut(&mut dyn RunEvents)) {
        for subscriber in &mut self.subscribers {
            f(subscriber.as_mut());
        }
    }

    fn try_each(&mut self, mut f: impl FnMut(&mut dyn RunEvents) -> Result<()>) -> Result<()> {
        for subscriber in &mut self.subscribers {
            f(subscriber.as_mut())?;
        }
        Ok(())
    }
}

impl RunEvents for EventDispatcher {
    fn run_started(&mut self, status: &RunStatus) -> Result<()> {
        self.try_each(|s| s.run_started(status))
    }

    fn run_completed(&mut self, node: &Node) -> Result<()> {
        self.try_each(|s| s.run_completed(node))
    }

    fn run_failed(&mut self, exception: &anyhow::Error) -> Result<()> {
        self.try_each(|s| s.run_failed(exception))
    }

    fn resource_current_state_loaded(
        &mut self,
        resource: &Resource,
        action: &str,
        current_resource: Option<&Resource>,
    ) {
        self.each(|s| s.resource_current_state_loaded(resource, action, current_resource));
    }

    fn resource_up_to_date(&mut self, resource: &Resource, action: &str) {
        self.each(|s| s.resource_up_to_date(resource, action));
    }

    fn resource_skipped(&mut self, resource: &Resource, action: &str, conditional: &str) {
        self.each(|s| s.resource_skipped(resource, action, conditional));
    }

    fn resource_updated(&mut self, resource: &Resource, action: &str) {
        self.each(|s| s.resource_updated(resource, action));
    }

    fn resource_failed(&mut self, resource: &Resource, action: &str, exception: &anyhow::Error) {
        self.each(|s| s.resource_failed(resource, action, exception));
    }

    fn resource_completed(&mut self, resource: &Resource) {
        self.each(|s| s.resource_completed(resource));
    }

    fn run_list_expanded(&mut self, run_list: &ExpandedRunList) {
        self.each(|s| s.run_list_expanded(run_list));
    }

    fn run_list_expand_failed(&mut self, node: &Node, exception: &anyhow::Error) {
        self.each(|s| s.run_list_expand_failed(node, exception));
    }

    fn cookbook_resolution_failed(&mut self, run_list: &ExpandedRunList, exception: &anyhow::Error) {
        self.each(|s| s.cookbook_resolution_failed(run_list, exception));
    }

    fn cookbook_sync_failed(&mut self, cookbooks: &[Cookbook], exception: &anyhow::Error) {
        self.each(|s| s.cookbook_sync_failed(cookbooks, exception));
    }
}

/// Register a data collector reporter when the collector toggle is on.
///
/// Returns whether a reporter was registered.
pub fn register_reporter<T>(
    dispatcher: &mut EventDispatcher,
    config: &CollectorConfig,
    transport: T,
) -> bool
where
    T: Transport + 'static,
{
    if !config.collector_enabled() {
        debug!("data collector disabled; reporter not registered");
        return false;
    }
    info!(
        url = config.server_url.as_deref().unwrap_or_default(),
        raise_on_failure = config.raise_on_failure,
        "registering data collector reporter"
    );
    dispatcher.register(Box::new(Reporter::from_config(transport, config)));
    true
}
