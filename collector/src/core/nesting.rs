//! Nested-resource predicate supplied by the run engine.
//!
//! A nested resource is one declared from inside another resource's action.
//! Its convergence must not disturb the report of the enclosing resource.

use crate::core::types::Resource;

/// Decides whether a resource is nested inside another resource's action.
pub trait NestedResource {
    fn is_nested(&self, resource: &Resource) -> bool;
}

/// Treats a resource as nested when it records a declaring parent.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredInParent;

impl NestedResource for DeclaredInParent {
    fn is_nested(&self, resource: &Resource) -> bool {
        resource.parent.is_some()
    }
}

impl<F> NestedResource for F
where
    F: Fn(&Resource) -> bool,
{
    fn is_nested(&self, resource: &Resource) -> bool {
        self(resource)
    }
}
