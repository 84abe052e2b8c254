//! Mapping of run failures into serializable error descriptions.

use serde::{Deserialize, Serialize};

use crate::core::types::{Cookbook, ExpandedRunList, Node, Resource};

/// Error report attached to the run-end document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescription {
    pub title: String,
    pub sections: Vec<ErrorSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSection {
    pub heading: String,
    pub text: String,
}

impl ErrorDescription {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sections: Vec::new(),
        }
    }

    pub fn section(mut self, heading: impl Into<String>, text: impl Into<String>) -> Self {
        self.sections.push(ErrorSection {
            heading: heading.into(),
            text: text.into(),
        });
        self
    }
}

/// Turns a failure plus its context into an [`ErrorDescription`].
pub trait ErrorMapper {
    fn run_failed(&self, exception: &anyhow::Error) -> ErrorDescription;

    fn resource_failed(
        &self,
        resource: &Resource,
        action: &str,
        exception: &anyhow::Error,
    ) -> ErrorDescription;

    fn run_list_expand_failed(&self, node: &Node, exception: &anyhow::Error) -> ErrorDescription;

    fn cookbook_resolution_failed(
        &self,
        run_list: &ExpandedRunList,
        exception: &anyhow::Error,
    ) -> ErrorDescription;

    fn cookbook_sync_failed(
        &self,
        cookbooks: &[Cookbook],
        exception: &anyhow::Error,
    ) -> ErrorDescription;
}

/// Plain-text mapper: a title per failure kind plus the error chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorMapper;

impl ErrorMapper for DefaultErrorMapper {
    fn run_failed(&self, exception: &anyhow::Error) -> ErrorDescription {
        with_error_sections(ErrorDescription::new("Run failed"), exception)
    }

    fn resource_failed(
        &self,
        resource: &Resource,
        action: &str,
        exception: &anyhow::Error,
    ) -> ErrorDescription {
        let title = format!(
            "Error executing action `{action}` on resource '{}'",
            resource.display_name()
        );
        let mut description = with_error_sections(ErrorDescription::new(title), exception);
        if let Some(cookbook) = &resource.cookbook_name {
            let version = resource.cookbook_version.as_deref().unwrap_or("unknown");
            description = description.section("Cookbook", format!("{cookbook} ({version})"));
        }
        if let Some(parent) = &resource.parent {
            description = description.section("Declared In", parent.clone());
        }
        description
    }

    fn run_list_expand_failed(&self, node: &Node, exception: &anyhow::Error) -> ErrorDescription {
        let mut description = with_error_sections(
            ErrorDescription::new(format!(
                "Error expanding the run list for node '{}'",
                node.name
            )),
            exception,
        );
        if let Some(environment) = &node.environment {
            description = description.section("Environment", environment.clone());
        }
        description
    }

    fn cookbook_resolution_failed(
        &self,
        run_list: &ExpandedRunList,
        exception: &anyhow::Error,
    ) -> ErrorDescription {
        with_error_sections(
            ErrorDescription::new("Error resolving cookbooks for run list"),
            exception,
        )
        .section("Expanded Run List", run_list.recipes.join(", "))
    }

    fn cookbook_sync_failed(
        &self,
        cookbooks: &[Cookbook],
        exception: &anyhow::Error,
    ) -> ErrorDescription {
        let listing: Vec<String> = cookbooks
            .iter()
            .map(|cookbook| format!("{} ({})", cookbook.name, cookbook.version))
            .collect();
        with_error_sections(ErrorDescription::new("Error syncing cookbooks"), exception)
            .section("Cookbooks", listing.join(", "))
    }
}

fn with_error_sections(description: ErrorDescription, exception: &anyhow::Error) -> ErrorDescription {
    let description = description.section("Error", exception.to_string());
    let causes: Vec<String> = exception.chain().skip(1).map(|c| c.to_string()).collect();
    if causes.is_empty() {
        description
    } else {
        description.section("Caused By", causes.join("\n"))
    }
}
