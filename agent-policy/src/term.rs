//! Policy vocabulary terms.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::engine::{PolicyError, PolicyResult};

/// Category of a policy term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermType {
    /// A principal that proposes actions (human or agent).
    #[serde(alias = "ACTOR")]
    Actor,
    /// An operation the actor wants to perform.
    #[serde(alias = "ACTION")]
    Action,
    /// A tool or resource the action touches.
    #[serde(alias = "RESOURCE")]
    Resource,
    /// A classification of data involved in the action.
    #[serde(alias = "DATA_CLASS")]
    DataClass,
}

/// Named vocabulary entry in the policy graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTerm {
    term_id: String,
    term_type: TermType,
    #[serde(default)]
    label: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    constraints: Option<Map<String, Value>>,
}

impl PolicyTerm {
    /// Creates a term with an empty description and metadata.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidTerm`] when `term_id` is empty.
    pub fn new(
        term_id: impl Into<String>,
        term_type: TermType,
        label: impl Into<String>,
    ) -> PolicyResult<Self> {
        let term_id = term_id.into();
        if term_id.trim().is_empty() {
            return Err(PolicyError::InvalidTerm("term id cannot be empty"));
        }

        Ok(Self {
            term_id,
            term_type,
            label: label.into(),
            description: String::new(),
            metadata: Map::new(),
            constraints: None,
        })
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Attaches a constraints map.
    #[must_use]
    pub fn with_constraints(mut self, constraints: Map<String, Value>) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Namespaced identifier, e.g. `actor:user`.
    #[must_use]
    pub fn term_id(&self) -> &str {
        &self.term_id
    }

    /// Term category.
    #[must_use]
    pub fn term_type(&self) -> TermType {
        self.term_type
    }

    /// Human-readable label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Longer description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Free-form metadata.
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Optional constraints attached to the term.
    #[must_use]
    pub fn constraints(&self) -> Option<&Map<String, Value>> {
        self.constraints.as_ref()
    }

    pub(crate) fn validate(&self) -> PolicyResult<()> {
        if self.term_id.trim().is_empty() {
            return Err(PolicyError::InvalidTerm("term id cannot be empty"));
        }
        Ok(())
    }
}
