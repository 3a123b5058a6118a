//! Validated policy documents accepted by [`PolicyEngine::load_policy`].
//!
//! Raw JSON is parsed into typed terms and relations, then checked for shape
//! errors before it can reach an engine. Nothing downstream re-inspects key
//! presence.
//!
//! [`PolicyEngine::load_policy`]: crate::PolicyEngine::load_policy

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::engine::{PolicyError, PolicyResult};
use crate::mode::PolicyMode;
use crate::relation::{PolicyRelation, RelationType, derive_relation_id};
use crate::term::PolicyTerm;

/// Complete term and relation set describing one policy version.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PolicyDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<PolicyMode>,
    terms: Vec<PolicyTerm>,
    relations: Vec<PolicyRelation>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    terms: Vec<PolicyTerm>,
    #[serde(default)]
    relations: Vec<RawRelation>,
}

#[derive(Debug, Deserialize)]
struct RawRelation {
    #[serde(default)]
    relation_id: Option<String>,
    relation_type: RelationType,
    source: String,
    target: String,
    #[serde(default)]
    conditions: Vec<String>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl PolicyDocument {
    /// Creates an empty document for the given mode.
    #[must_use]
    pub fn new(mode: PolicyMode) -> Self {
        Self {
            mode: Some(mode),
            terms: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Parse`] for malformed JSON or missing fields and
    /// the matching validation error for unsupported modes, empty ids, or
    /// duplicate term ids.
    pub fn from_json_str(json: &str) -> PolicyResult<Self> {
        let raw: RawDocument =
            serde_json::from_str(json).map_err(|err| PolicyError::Parse(err.to_string()))?;
        Self::from_raw(raw)
    }

    /// Validates an already-decoded JSON value.
    ///
    /// # Errors
    ///
    /// Same as [`PolicyDocument::from_json_str`].
    pub fn from_value(value: Value) -> PolicyResult<Self> {
        let raw: RawDocument =
            serde_json::from_value(value).map_err(|err| PolicyError::Parse(err.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawDocument) -> PolicyResult<Self> {
        let mode = raw.mode.map(|mode| mode.parse::<PolicyMode>()).transpose()?;

        let mut seen_terms = HashSet::with_capacity(raw.terms.len());
        for term in &raw.terms {
            term.validate()?;
            if !seen_terms.insert(term.term_id().to_owned()) {
                return Err(PolicyError::InvalidDocument(format!(
                    "duplicate term id `{}`",
                    term.term_id()
                )));
            }
        }

        let mut id_counts: HashMap<String, usize> = HashMap::new();
        let mut relations = Vec::with_capacity(raw.relations.len());
        for raw_relation in raw.relations {
            let base_id = raw_relation.relation_id.clone().unwrap_or_else(|| {
                derive_relation_id(
                    raw_relation.relation_type,
                    &raw_relation.source,
                    &raw_relation.target,
                )
            });
            let count = id_counts.entry(base_id.clone()).or_insert(0);
            *count += 1;
            let relation_id = if *count == 1 {
                base_id
            } else if raw_relation.relation_id.is_some() {
                return Err(PolicyError::InvalidDocument(format!(
                    "duplicate relation id `{base_id}`"
                )));
            } else {
                format!("{base_id}#{count}")
            };

            let mut relation = PolicyRelation::with_id(
                relation_id,
                raw_relation.relation_type,
                raw_relation.source,
                raw_relation.target,
            )?;
            for condition in raw_relation.conditions {
                relation = relation.with_condition(condition);
            }
            for (key, value) in raw_relation.metadata {
                relation = relation.with_metadata(key, value);
            }
            relations.push(relation);
        }

        Ok(Self {
            mode,
            terms: raw.terms,
            relations,
        })
    }

    /// Adds a term to the document.
    #[must_use]
    pub fn with_term(mut self, term: PolicyTerm) -> Self {
        self.terms.push(term);
        self
    }

    /// Adds a relation to the document.
    #[must_use]
    pub fn with_relation(mut self, relation: PolicyRelation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Mode named by the document, if any.
    #[must_use]
    pub fn mode(&self) -> Option<PolicyMode> {
        self.mode
    }

    /// Terms in document order.
    #[must_use]
    pub fn terms(&self) -> &[PolicyTerm] {
        &self.terms
    }

    /// Relations in document order.
    #[must_use]
    pub fn relations(&self) -> &[PolicyRelation] {
        &self.relations
    }

    /// Serializes the document back into its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Parse`] if serialization fails.
    pub fn to_json_value(&self) -> PolicyResult<Value> {
        serde_json::to_value(self).map_err(|err| PolicyError::Parse(err.to_string()))
    }

    pub(crate) fn into_parts(self) -> (Option<PolicyMode>, Vec<PolicyTerm>, Vec<PolicyRelation>) {
        (self.mode, self.terms, self.relations)
    }
}
