//! Directed relations between policy terms.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::engine::{PolicyError, PolicyResult};

/// Kind of edge between two terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// The source may perform the target.
    #[serde(alias = "PERMITS")]
    Permits,
    /// The source must not perform the target. Always overrides permits.
    #[serde(alias = "FORBIDS")]
    Forbids,
    /// The source needs the listed conditions before the target.
    #[serde(alias = "REQUIRES")]
    Requires,
}

impl RelationType {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Permits => "permits",
            Self::Forbids => "forbids",
            Self::Requires => "requires",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed permit/forbid/require rule between two terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRelation {
    relation_id: String,
    relation_type: RelationType,
    source: String,
    target: String,
    #[serde(default)]
    conditions: Vec<String>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl PolicyRelation {
    /// Creates a relation with a derived identifier (`type:source->target`).
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidRelation`] when source or target is empty.
    pub fn new(
        relation_type: RelationType,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> PolicyResult<Self> {
        let source = source.into();
        let target = target.into();
        let relation_id = derive_relation_id(relation_type, &source, &target);
        Self::with_id(relation_id, relation_type, source, target)
    }

    /// Creates a relation with an explicit identifier.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidRelation`] when any identifier is empty.
    pub fn with_id(
        relation_id: impl Into<String>,
        relation_type: RelationType,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> PolicyResult<Self> {
        let relation = Self {
            relation_id: relation_id.into(),
            relation_type,
            source: source.into(),
            target: target.into(),
            conditions: Vec::new(),
            metadata: Map::new(),
        };
        relation.validate()?;
        Ok(relation)
    }

    /// Shorthand for a `permits` relation.
    ///
    /// # Errors
    ///
    /// See [`PolicyRelation::new`].
    pub fn permits(source: impl Into<String>, target: impl Into<String>) -> PolicyResult<Self> {
        Self::new(RelationType::Permits, source, target)
    }

    /// Shorthand for a `forbids` relation.
    ///
    /// # Errors
    ///
    /// See [`PolicyRelation::new`].
    pub fn forbids(source: impl Into<String>, target: impl Into<String>) -> PolicyResult<Self> {
        Self::new(RelationType::Forbids, source, target)
    }

    /// Shorthand for a `requires` relation.
    ///
    /// # Errors
    ///
    /// See [`PolicyRelation::new`].
    pub fn requires(source: impl Into<String>, target: impl Into<String>) -> PolicyResult<Self> {
        Self::new(RelationType::Requires, source, target)
    }

    /// Appends a condition, preserving order.
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Relation identifier.
    #[must_use]
    pub fn relation_id(&self) -> &str {
        &self.relation_id
    }

    /// Relation kind.
    #[must_use]
    pub fn relation_type(&self) -> RelationType {
        self.relation_type
    }

    /// Source term id.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Target term id.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Ordered condition strings.
    #[must_use]
    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    /// Free-form metadata.
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub(crate) fn validate(&self) -> PolicyResult<()> {
        if self.relation_id.trim().is_empty() {
            return Err(PolicyError::InvalidRelation("relation id cannot be empty"));
        }
        if self.source.trim().is_empty() {
            return Err(PolicyError::InvalidRelation("relation source cannot be empty"));
        }
        if self.target.trim().is_empty() {
            return Err(PolicyError::InvalidRelation("relation target cannot be empty"));
        }
        Ok(())
    }
}

pub(crate) fn derive_relation_id(relation_type: RelationType, source: &str, target: &str) -> String {
    format!("{relation_type}:{source}->{target}")
}
