//! Query-construction validation: preconditions checked once when a query
//! or weighting function is assembled, rather than on every document
//! scored. Mirrors the teacher's `ValidationContext` shape, scoped down to
//! this crate's input-domain checks (spec §7's "reported to the caller,
//! operation is a no-op" policy for `CoreError::InputDomain`).

use std::collections::HashMap;

use crate::errors::{CoreError, CoreResult};

#[derive(Clone)]
pub struct ValidationContext {
    operation: String,
    attributes: HashMap<String, String>,
}

impl ValidationContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self { operation: operation.into(), attributes: HashMap::new() }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn validate(self, condition: bool, message: &str) -> CoreResult<()> {
        if !condition {
            let context = format!("operation={}, attributes={:?}", self.operation, self.attributes);
            return Err(CoreError::input_domain(format!("{message} ({context})")));
        }
        Ok(())
    }
}

/// Cardinality must be in `1..=arity` (spec §4.2).
pub fn validate_cardinality(cardinality: usize, arity: usize) -> CoreResult<()> {
    ValidationContext::new("validate_cardinality")
        .with_attribute("cardinality", cardinality.to_string())
        .with_attribute("arity", arity.to_string())
        .validate(cardinality >= 1 && cardinality <= arity, "cardinality must be between 1 and arity")
}

/// A join range must be non-negative and within a sane bound; a
/// suspiciously huge range usually means an upstream parser bug, not a
/// legitimate query.
pub fn validate_range(range: u32, max_allowed: u32) -> CoreResult<()> {
    ValidationContext::new("validate_range")
        .with_attribute("range", range.to_string())
        .with_attribute("max_allowed", max_allowed.to_string())
        .validate(range <= max_allowed, "range argument exceeds the allowed maximum")
}

/// An element name must be non-empty; empty names are never legal
/// metadata or forward-index type handles.
pub fn validate_element_name(name: &str) -> CoreResult<()> {
    ValidationContext::new("validate_element_name")
        .with_attribute("name", name.to_string())
        .validate(!name.is_empty(), "element name must not be empty")
}
