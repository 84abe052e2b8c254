//! Builders for the JSON messages posted to the collector.
//!
//! Two message types exist: `run_start`, sent when the run begins, and
//! `run_converge`, sent once when it ends (successfully or not).

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::core::error_mapper::ErrorDescription;
use crate::core::resource_report::ResourceReport;
use crate::core::types::{ExpandedRunList, RunOutcome, RunStatus};

pub const MESSAGE_VERSION: &str = "1.0.0";

/// Fields shared by every message that do not come from the run itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContext {
    pub organization: String,
    pub source: String,
    /// Host part of the collector URL.
    pub server_fqdn: Option<String>,
}

impl Default for MessageContext {
    fn default() -> Self {
        Self {
            organization: "chef_solo".to_string(),
            source: "chef_client".to_string(),
            server_fqdn: None,
        }
    }
}

#[derive(Serialize)]
struct MessageHeader<'a> {
    chef_server_fqdn: Option<&'a str>,
    entity_uuid: &'a str,
    id: &'a str,
    message_version: &'static str,
    message_type: &'static str,
    node_name: &'a str,
    organization_name: &'a str,
    run_id: &'a str,
    source: &'a str,
    start_time: String,
}

impl<'a> MessageHeader<'a> {
    fn new(message_type: &'static str, status: &'a RunStatus, context: &'a MessageContext) -> Self {
        Self {
            chef_server_fqdn: context.server_fqdn.as_deref(),
            entity_uuid: &status.entity_uuid,
            id: &status.run_id,
            message_version: MESSAGE_VERSION,
            message_type,
            node_name: &status.node_name,
            organization_name: &context.organization,
            run_id: &status.run_id,
            source: &context.source,
            start_time: timestamp(status.start_time),
        }
    }
}

#[derive(Serialize)]
struct RunStartMessage<'a> {
    #[serde(flatten)]
    header: MessageHeader<'a>,
}

#[derive(Serialize)]
struct RunConvergeMessage<'a> {
    #[serde(flatten)]
    header: MessageHeader<'a>,
    end_time: String,
    status: RunOutcome,
    expanded_run_list: Option<&'a ExpandedRunList>,
    resources: Vec<Value>,
    total_resource_count: usize,
    updated_resource_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a ErrorDescription>,
}

/// Inputs for the run-end message.
#[derive(Debug, Clone, Copy)]
pub struct RunEnd<'a> {
    pub status: &'a RunStatus,
    pub resources: &'a [ResourceReport],
    pub total_resource_count: usize,
    pub expanded_run_list: Option<&'a ExpandedRunList>,
    pub error: Option<&'a ErrorDescription>,
}

pub fn run_start(status: &RunStatus, context: &MessageContext) -> Result<Value> {
    let message = RunStartMessage {
        header: MessageHeader::new("run_start", status, context),
    };
    serde_json::to_value(message).context("serialize run_start message")
}

pub fn run_end(input: &RunEnd<'_>, context: &MessageContext) -> Result<Value> {
    let end_time = input.status.end_time.unwrap_or_else(Utc::now);
    let message = RunConvergeMessage {
        header: MessageHeader::new("run_converge", input.status, context),
        end_time: timestamp(end_time),
        status: input.status.outcome(),
        expanded_run_list: input.expanded_run_list,
        resources: input.resources.iter().map(ResourceReport::to_document).collect(),
        total_resource_count: input.total_resource_count,
        updated_resource_count: input.resources.len(),
        error: input.error,
    };
    serde_json::to_value(message).context("serialize run_converge message")
}

fn timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}
