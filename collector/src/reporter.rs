//! Data collector reporter.
//!
//! Observes one run through [`RunEvents`] and posts a `run_start` message when
//! the run begins and a `run_converge` message when it ends. Between the two
//! it keeps per-resource reports and the latest error description in memory.
//!
//! # Resource bookkeeping
//!
//! At most one report is open at a time (the *current* report). It is opened
//! when a non-nested resource loads its current state, replaced when that
//! resource fails, dropped when it turns out to be up to date or skipped, and
//! moved to the updated-resource list when it completes. Events for nested
//! resources never touch the open report, so inner convergence cannot corrupt
//! the report of the resource that declared them.
//!
//! # Sends
//!
//! Every send goes through a [`SendGuard`]. Transient transport faults turn
//! reporting off for the rest of the run and are only raised in strict mode.

use anyhow::Result;
use tracing::{debug, instrument};

use crate::core::documents::{self, MessageContext, RunEnd};
use crate::core::error_mapper::{DefaultErrorMapper, ErrorDescription, ErrorMapper};
use crate::core::guard::SendGuard;
use crate::core::nesting::{DeclaredInParent, NestedResource};
use crate::core::resource_report::ResourceReport;
use crate::core::types::{Cookbook, ExpandedRunList, Node, Resource, RunStatus};
use crate::dispatch::RunEvents;
use crate::io::config::CollectorConfig;
use crate::io::transport::Transport;

/// Per-run settings, fixed when the reporter is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReporterSettings {
    pub raise_on_failure: bool,
    pub message: MessageContext,
}

impl ReporterSettings {
    pub fn from_config(config: &CollectorConfig) -> Self {
        Self {
            raise_on_failure: config.raise_on_failure,
            message: MessageContext {
                organization: config.organization.clone(),
                source: config.source.clone(),
                server_fqdn: config.server_fqdn(),
            },
        }
    }
}

pub struct Reporter<T, N = DeclaredInParent, M = DefaultErrorMapper> {
    transport: T,
    nesting: N,
    error_mapper: M,
    message: MessageContext,
    guard: SendGuard,
    run_status: Option<RunStatus>,
    updated_resources: Vec<ResourceReport>,
    current_resource_report: Option<ResourceReport>,
    expanded_run_list: Option<ExpandedRunList>,
    error_description: Option<ErrorDescription>,
    total_resource_count: usize,
}

impl<T: Transport> Reporter<T> {
    pub fn new(transport: T, settings: ReporterSettings) -> Self {
        Self::with_collaborators(transport, settings, DeclaredInParent, DefaultErrorMapper)
    }

    pub fn from_config(transport: T, config: &CollectorConfig) -> Self {
        Self::new(transport, ReporterSettings::from_config(config))
    }
}

impl<T, N, M> Reporter<T, N, M>
where
    T: Transport,
    N: NestedResource,
    M: ErrorMapper,
{
    pub fn with_collaborators(
        transport: T,
        settings: ReporterSettings,
        nesting: N,
        error_mapper: M,
    ) -> Self {
        Self {
            transport,
            nesting,
            error_mapper,
            message: settings.message,
            guard: SendGuard::new(settings.raise_on_failure),
            run_status: None,
            updated_resources: Vec::new(),
            current_resource_report: None,
            expanded_run_list: None,
            error_description: None,
            total_resource_count: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.guard.is_enabled()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn run_status(&self) -> Option<&RunStatus> {
        self.run_status.as_ref()
    }

    pub fn updated_resources(&self) -> &[ResourceReport] {
        &self.updated_resources
    }

    pub fn current_resource_report(&self) -> Option<&ResourceReport> {
        self.current_resource_report.as_ref()
    }

    pub fn expanded_run_list(&self) -> Option<&ExpandedRunList> {
        self.expanded_run_list.as_ref()
    }

    pub fn error_description(&self) -> Option<&ErrorDescription> {
        self.error_description.as_ref()
    }

    pub fn total_resource_count(&self) -> usize {
        self.total_resource_count
    }

    fn is_nested(&self, resource: &Resource) -> bool {
        self.nesting.is_nested(resource)
    }

    fn update_error_description(&mut self, description: ErrorDescription) {
        self.error_description = Some(description);
    }

    fn send_to_collector(&mut self, document: serde_json::Value) -> Result<()> {
        let transport = &self.transport;
        self.guard.run(|| transport.send(&document))
    }

    fn send_run_completion(&mut self) -> Result<()> {
        let Some(status) = self.run_status.as_mut() else {
            debug!("run end observed before run start; nothing to send");
            return Ok(());
        };
        status.stop();
        let document = documents::run_end(
            &RunEnd {
                status: &*status,
                resources: &self.updated_resources,
                total_resource_count: self.total_resource_count,
                expanded_run_list: self.expanded_run_list.as_ref(),
                error: self.error_description.as_ref(),
            },
            &self.message,
        )?;
        self.send_to_collector(document)
    }
}

impl<T, N, M> RunEvents for Reporter<T, N, M>
where
    T: Transport,
    N: NestedResource,
    M: ErrorMapper,
{
    #[instrument(skip_all, fields(run_id = %status.run_id))]
    fn run_started(&mut self, status: &RunStatus) -> Result<()> {
        self.run_status = Some(status.clone());
        let document = documents::run_start(status, &self.message)?;
        self.send_to_collector(document)
    }

    #[instrument(skip_all, fields(node = %node.name))]
    fn run_completed(&mut self, node: &Node) -> Result<()> {
        if let Some(status) = self.run_status.as_mut() {
            status.mark_succeeded();
        }
        self.send_run_completion()
    }

    #[instrument(skip_all)]
    fn run_failed(&mut self, exception: &anyhow::Error) -> Result<()> {
        let description = self.error_mapper.run_failed(exception);
        self.update_error_description(description);
        if let Some(status) = self.run_status.as_mut() {
            status.mark_failed(exception);
        }
        self.send_run_completion()
    }

    fn resource_current_state_loaded(
        &mut self,
        resource: &Resource,
        action: &str,
        current_resource: Option<&Resource>,
    ) {
        if self.is_nested(resource) {
            return;
        }
        self.current_resource_report = Some(ResourceReport::for_current_resource(
            resource,
            action,
            current_resource,
        ));
    }

    fn resource_up_to_date(&mut self, resource: &Resource, _action: &str) {
        self.total_resource_count += 1;
        if self.is_nested(resource) {
            return;
        }
        self.current_resource_report = None;
    }

    fn resource_skipped(&mut self, resource: &Resource, _action: &str, _conditional: &str) {
        self.total_resource_count += 1;
        if self.is_nested(resource) {
            return;
        }
        self.current_resource_report = None;
    }

    fn resource_updated(&mut self, resource: &Resource, _action: &str) {
        self.total_resource_count += 1;
        if self.is_nested(resource) {
            return;
        }
        if let Some(report) = self.current_resource_report.as_mut() {
            report.updated();
        }
    }

    fn resource_failed(&mut self, resource: &Resource, action: &str, exception: &anyhow::Error) {
        self.total_resource_count += 1;
        let description = self.error_mapper.resource_failed(resource, action, exception);
        self.update_error_description(description);
        if self.is_nested(resource) {
            return;
        }
        self.current_resource_report = Some(ResourceReport::for_exception(
            resource, action, exception,
        ));
    }

    fn resource_completed(&mut self, resource: &Resource) {
        if self.current_resource_report.is_none() || self.is_nested(resource) {
            return;
        }
        if let Some(mut report) = self.current_resource_report.take() {
            report.finish(resource.elapsed_ms);
            debug!(
                resource = %resource.display_name(),
                status = ?report.status(),
                "resource report completed"
            );
            self.updated_resources.push(report);
        }
    }

    fn run_list_expanded(&mut self, run_list: &ExpandedRunList) {
        self.expanded_run_list = Some(run_list.clone());
    }

    fn run_list_expand_failed(&mut self, node: &Node, exception: &anyhow::Error) {
        let description = self.error_mapper.run_list_expand_failed(node, exception);
        self.update_error_description(description);
    }

    fn cookbook_resolution_failed(&mut self, run_list: &ExpandedRunList, exception: &anyhow::Error) {
        let description = self
            .error_mapper
            .cookbook_resolution_failed(run_list, exception);
        self.update_error_description(description);
    }

    fn cookbook_sync_failed(&mut self, cookbooks: &[Cookbook], exception: &anyhow::Error) {
        let description = self.error_mapper.cookbook_sync_failed(cookbooks, exception);
        self.update_error_description(description);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::TransportFault;
    use crate::core::resource_report::ResourceStatus;
    use crate::test_support::{
        ScriptedSend, ScriptedTransport, capture_logs, nested_resource, node, resource, run_status,
    };
    use anyhow::anyhow;
    use serde_json::json;
    use tracing::Level;

    fn reporter(transport: ScriptedTransport) -> Reporter<ScriptedTransport> {
        Reporter::new(transport, ReporterSettings::default())
    }

    fn strict_reporter(transport: ScriptedTransport) -> Reporter<ScriptedTransport> {
        Reporter::new(
            transport,
            ReporterSettings {
                raise_on_failure: true,
                ..ReporterSettings::default()
            },
        )
    }

    #[test]
    fn run_started_stores_status_and_sends_run_start() {
        let mut reporter = reporter(ScriptedTransport::default());
        reporter.run_started(&run_status("run-1")).expect("start");

        assert_eq!(reporter.run_status().map(|s| s.run_id.as_str()), Some("run-1"));
        let sent = reporter.transport().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["message_type"], json!("run_start"));
        assert_eq!(sent[0]["run_id"], json!("run-1"));
    }

    #[test]
    fn run_completed_sends_successful_run_converge() {
        let mut reporter = reporter(ScriptedTransport::default());
        reporter.run_started(&run_status("run-1")).expect("start");
        reporter.run_completed(&node("web01")).expect("complete");

        let sent = reporter.transport().sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1]["message_type"], json!("run_converge"));
        assert_eq!(sent[1]["status"], json!("success"));
        assert!(sent[1].get("error").is_none());
        assert!(reporter.run_status().and_then(|s| s.end_time).is_some());
    }

    #[test]
    fn run_completed_marks_success_over_earlier_failure() {
        let mut reporter = reporter(ScriptedTransport::default());
        let mut status = run_status("run-1");
        status.mark_failed(&anyhow!("stale failure"));
        reporter.run_started(&status).expect("start");
        reporter.run_completed(&node("web01")).expect("complete");

        assert!(reporter.run_status().is_some_and(|s| s.failure.is_none()));
        assert_eq!(reporter.transport().sent()[1]["status"], json!("success"));
    }

    #[test]
    fn run_failed_maps_error_before_sending_failure() {
        let mut reporter = reporter(ScriptedTransport::default());
        reporter.run_started(&run_status("run-1")).expect("start");
        reporter
            .run_failed(&anyhow!("converge aborted"))
            .expect("failed");

        let description = reporter.error_description().expect("description");
        assert_eq!(description.title, "Run failed");
        let sent = reporter.transport().sent();
        assert_eq!(sent[1]["status"], json!("failure"));
        assert_eq!(sent[1]["error"]["title"], json!("Run failed"));
        assert_eq!(sent[1]["error"]["sections"][0]["text"], json!("converge aborted"));
    }

    #[test]
    fn run_end_before_run_start_sends_nothing() {
        let mut reporter = reporter(ScriptedTransport::default());
        reporter.run_completed(&node("web01")).expect("complete");
        reporter.run_failed(&anyhow!("boom")).expect("failed");
        assert_eq!(reporter.transport().attempts(), 0);
        assert!(reporter.error_description().is_some());
    }

    #[test]
    fn current_state_loaded_opens_report_for_top_level_resource() {
        let mut reporter = reporter(ScriptedTransport::default());
        let current = resource("nginx");
        reporter.resource_current_state_loaded(&resource("nginx"), "install", Some(&current));

        let report = reporter.current_resource_report().expect("report");
        assert_eq!(report.action(), "install");
        assert_eq!(report.resource().name, "nginx");
        assert_eq!(report.status(), ResourceStatus::Unprocessed);
    }

    #[test]
    fn current_state_loaded_ignores_nested_resource() {
        let mut reporter = reporter(ScriptedTransport::default());
        reporter.resource_current_state_loaded(&nested_resource("conf", "nginx"), "create", None);
        assert!(reporter.current_resource_report().is_none());
    }

    #[test]
    fn up_to_date_counts_and_clears_top_level_report() {
        let mut reporter = reporter(ScriptedTransport::default());
        reporter.resource_current_state_loaded(&resource("nginx"), "install", None);
        reporter.resource_up_to_date(&resource("nginx"), "install");

        assert_eq!(reporter.total_resource_count(), 1);
        assert!(reporter.current_resource_report().is_none());
    }

    #[test]
    fn up_to_date_for_nested_resource_keeps_report() {
        let mut reporter = reporter(ScriptedTransport::default());
        reporter.resource_current_state_loaded(&resource("nginx"), "install", None);
        reporter.resource_up_to_date(&nested_resource("conf", "nginx"), "create");

        assert_eq!(reporter.total_resource_count(), 1);
        assert!(reporter.current_resource_report().is_some());
    }

    #[test]
    fn skipped_counts_and_clears_top_level_report() {
        let mut reporter = reporter(ScriptedTransport::default());
        reporter.resource_current_state_loaded(&resource("nginx"), "install", None);
        reporter.resource_skipped(&resource("nginx"), "install", "only_if false");

        assert_eq!(reporter.total_resource_count(), 1);
        assert!(reporter.current_resource_report().is_none());
    }

    #[test]
    fn skipped_for_nested_resource_keeps_report() {
        let mut reporter = reporter(ScriptedTransport::default());
        reporter.resource_current_state_loaded(&resource("nginx"), "install", None);
        reporter.resource_skipped(&nested_resource("conf", "nginx"), "create", "not_if true");

        assert_eq!(reporter.total_resource_count(), 1);
        assert!(reporter.current_resource_report().is_some());
    }

    #[test]
    fn updated_counts_and_marks_report() {
        let mut reporter = reporter(ScriptedTransport::default());
        reporter.resource_current_state_loaded(&resource("nginx"), "install", None);
        reporter.resource_updated(&resource("nginx"), "install");

        assert_eq!(reporter.total_resource_count(), 1);
        let report = reporter.current_resource_report().expect("report");
        assert_eq!(report.status(), ResourceStatus::Updated);
    }

    #[test]
    fn updated_for_nested_resource_only_counts() {
        let mut reporter = reporter(ScriptedTransport::default());
        reporter.resource_current_state_loaded(&resource("nginx"), "install", None);
        reporter.resource_updated(&nested_resource("conf", "nginx"), "create");

        assert_eq!(reporter.total_resource_count(), 1);
        let report = reporter.current_resource_report().expect("report");
        assert_eq!(report.status(), ResourceStatus::Unprocessed);
    }

    #[test]
    fn failed_records_error_and_replaces_report() {
        let mut reporter = reporter(ScriptedTransport::default());
        reporter.resource_current_state_loaded(&resource("nginx"), "install", None);
        reporter.resource_failed(&resource("nginx"), "install", &anyhow!("no candidate"));

        assert_eq!(reporter.total_resource_count(), 1);
        let description = reporter.error_description().expect("description");
        assert_eq!(
            description.title,
            "Error executing action `install` on resource 'package[nginx]'"
        );
        let report = reporter.current_resource_report().expect("report");
        assert_eq!(report.status(), ResourceStatus::Failed);
        assert_eq!(report.error_message(), Some("no candidate"));
    }

    #[test]
    fn failed_for_nested_resource_keeps_outer_report() {
        let mut reporter = reporter(ScriptedTransport::default());
        reporter.resource_current_state_loaded(&resource("nginx"), "install", None);
        reporter.resource_failed(&nested_resource("conf", "nginx"), "create", &anyhow!("eacces"));

        assert_eq!(reporter.total_resource_count(), 1);
        assert!(reporter.error_description().is_some());
        let report = reporter.current_resource_report().expect("report");
        assert_eq!(report.resource().name, "nginx");
        assert_eq!(report.status(), ResourceStatus::Unprocessed);
    }

    #[test]
    fn completed_without_report_is_noop() {
        let mut reporter = reporter(ScriptedTransport::default());
        reporter.resource_completed(&resource("nginx"));
        reporter.resource_completed(&nested_resource("conf", "nginx"));
        assert!(reporter.updated_resources().is_empty());
    }

    #[test]
    fn completed_for_nested_resource_keeps_report_open() {
        let mut reporter = reporter(ScriptedTransport::default());
        reporter.resource_current_state_loaded(&resource("nginx"), "install", None);
        reporter.resource_completed(&nested_resource("conf", "nginx"));

        assert!(reporter.updated_resources().is_empty());
        assert!(reporter.current_resource_report().is_some());
    }

    #[test]
    fn completed_finishes_appends_and_clears() {
        let mut reporter = reporter(ScriptedTransport::default());
        let mut nginx = resource("nginx");
        reporter.resource_current_state_loaded(&nginx, "install", None);
        reporter.resource_updated(&nginx, "install");
        nginx.elapsed_ms = 310;
        reporter.resource_completed(&nginx);

        assert!(reporter.current_resource_report().is_none());
        let updated = reporter.updated_resources();
        assert_eq!(updated.len(), 1);
        assert!(updated[0].is_finished());
        assert_eq!(updated[0].to_document()["duration"], json!("310"));
    }

    #[test]
    fn repeated_convergence_appends_duplicate_entries() {
        let mut reporter = reporter(ScriptedTransport::default());
        for _ in 0..2 {
            reporter.resource_current_state_loaded(&resource("nginx"), "restart", None);
            reporter.resource_updated(&resource("nginx"), "restart");
            reporter.resource_completed(&resource("nginx"));
        }
        assert_eq!(reporter.updated_resources().len(), 2);
    }

    #[test]
    fn run_list_expanded_is_stored() {
        let mut reporter = reporter(ScriptedTransport::default());
        let run_list = ExpandedRunList {
            environment: None,
            recipes: vec!["web::default".to_string()],
            roles: Vec::new(),
        };
        reporter.run_list_expanded(&run_list);
        assert_eq!(reporter.expanded_run_list(), Some(&run_list));
    }

    #[test]
    fn early_failures_update_error_description() {
        let mut reporter = reporter(ScriptedTransport::default());
        reporter.run_list_expand_failed(&node("web01"), &anyhow!("role missing"));
        assert_eq!(
            reporter.error_description().map(|d| d.title.as_str()),
            Some("Error expanding the run list for node 'web01'")
        );

        reporter.cookbook_resolution_failed(&ExpandedRunList::default(), &anyhow!("no solution"));
        assert_eq!(
            reporter.error_description().map(|d| d.title.as_str()),
            Some("Error resolving cookbooks for run list")
        );

        let cookbooks = vec![Cookbook {
            name: "apt".to_string(),
            version: "7.0.0".to_string(),
        }];
        reporter.cookbook_sync_failed(&cookbooks, &anyhow!("403"));
        assert_eq!(
            reporter.error_description().map(|d| d.title.as_str()),
            Some("Error syncing cookbooks")
        );
    }

    #[test]
    fn transient_fault_disables_later_sends() {
        let transport = ScriptedTransport::new(vec![ScriptedSend::Fault(TransportFault::ConnectionRefused)]);
        let mut reporter = reporter(transport);
        let (result, logs) = capture_logs(|| reporter.run_started(&run_status("run-1")));

        assert!(result.is_ok());
        assert!(!reporter.is_enabled());
        assert_eq!(logs.count(Level::WARN), 1);

        reporter.run_completed(&node("web01")).expect("complete");
        assert_eq!(reporter.transport().attempts(), 1);
    }

    #[test]
    fn strict_mode_raises_transient_fault() {
        let transport = ScriptedTransport::new(vec![ScriptedSend::Fault(TransportFault::EndOfStream)]);
        let mut reporter = strict_reporter(transport);
        let (result, logs) = capture_logs(|| reporter.run_started(&run_status("run-1")));

        let err = result.unwrap_err();
        assert!(err.to_string().contains("end_of_stream"));
        assert!(!reporter.is_enabled());
        assert_eq!(logs.count(Level::ERROR), 1);
    }

    #[test]
    fn unclassified_send_error_always_raises() {
        for strict in [false, true] {
            let transport = ScriptedTransport::new(vec![ScriptedSend::Unclassified("bummer".to_string())]);
            let mut reporter = if strict {
                strict_reporter(transport)
            } else {
                reporter(transport)
            };
            let err = reporter.run_started(&run_status("run-1")).unwrap_err();
            assert_eq!(err.to_string(), "bummer");
            assert!(reporter.is_enabled());
        }
    }

    #[test]
    fn custom_nesting_predicate_is_used() {
        let mut reporter = Reporter::with_collaborators(
            ScriptedTransport::default(),
            ReporterSettings::default(),
            |resource: &Resource| resource.name.starts_with("inner"),
            DefaultErrorMapper,
        );
        reporter.resource_current_state_loaded(&resource("inner-conf"), "create", None);
        assert!(reporter.current_resource_report().is_none());
        reporter.resource_current_state_loaded(&resource("outer"), "create", None);
        assert!(reporter.current_resource_report().is_some());
    }
}
