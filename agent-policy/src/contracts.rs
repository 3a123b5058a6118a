//! Evaluation query contract passed to the policy engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Everything the engine is told about a proposed action.
///
/// Only `actor` and `action` participate in relation matching; the remaining
/// fields travel with the evaluation for tracing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyQuery {
    actor: String,
    action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    data_classes: Vec<String>,
    #[serde(default)]
    context: Map<String, Value>,
}

impl PolicyQuery {
    /// Creates a query for the supplied actor and action.
    #[must_use]
    pub fn new(actor: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            action: action.into(),
            ..Self::default()
        }
    }

    /// Names the tool or resource the action targets.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Adds data classes, ignoring empty or whitespace-only strings.
    #[must_use]
    pub fn with_data_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for class in classes {
            let class = class.into();
            if !class.trim().is_empty() {
                self.data_classes.push(class);
            }
        }
        self
    }

    /// Replaces the free-form context map.
    #[must_use]
    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    /// Actor token.
    #[must_use]
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Action token.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Optional resource.
    #[must_use]
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Data classes involved.
    #[must_use]
    pub fn data_classes(&self) -> &[String] {
        &self.data_classes
    }

    /// Caller-supplied context.
    #[must_use]
    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_skips_blank_data_classes() {
        let query = PolicyQuery::new("agent", "export")
            .with_resource("crm")
            .with_data_classes(["pii", " ", "financial"]);
        assert_eq!(query.resource(), Some("crm"));
        assert_eq!(query.data_classes(), ["pii", "financial"]);
    }
}
