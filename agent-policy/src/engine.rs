//! Policy engine owning a term/relation set and its version hash.

use std::collections::BTreeMap;
use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use agent_primitives::{canonical_json, sha256_hex};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, info};

use crate::contracts::PolicyQuery;
use crate::decision::PolicyEvaluation;
use crate::document::PolicyDocument;
use crate::mode::{MatchStrategy, PolicyMode};
use crate::relation::{PolicyRelation, RelationType};
use crate::term::PolicyTerm;

/// Errors surfaced by policy engines and policy documents.
///
/// All variants are validation failures; a denial is never an error.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Mode string is not one of `strict`, `permissive`, `paranoid`.
    #[error("unsupported policy mode `{0}`")]
    InvalidMode(String),
    /// Term failed validation.
    #[error("invalid policy term: {0}")]
    InvalidTerm(&'static str),
    /// Relation failed validation.
    #[error("invalid policy relation: {0}")]
    InvalidRelation(&'static str),
    /// Document is structurally valid JSON but semantically malformed.
    #[error("invalid policy document: {0}")]
    InvalidDocument(String),
    /// Document could not be decoded.
    #[error("failed to parse policy document: {0}")]
    Parse(String),
}

/// Result alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

#[derive(Debug, Default)]
struct PolicyState {
    mode: PolicyMode,
    terms: BTreeMap<String, PolicyTerm>,
    relations: Vec<PolicyRelation>,
    cached_hash: OnceLock<String>,
}

impl PolicyState {
    fn invalidate(&mut self) {
        self.cached_hash = OnceLock::new();
    }

    fn hash(&self) -> &str {
        self.cached_hash.get_or_init(|| {
            let terms: Map<String, Value> = self
                .terms
                .iter()
                .map(|(id, term)| (id.clone(), term_value(term)))
                .collect();
            let relations: Vec<Value> = self.relations.iter().map(relation_value).collect();
            let canonical = canonical_json(&json!({
                "mode": self.mode.as_str(),
                "terms": terms,
                "relations": relations,
            }));
            let hash = sha256_hex(canonical.as_bytes());
            debug!(mode = %self.mode, terms = self.terms.len(), relations = self.relations.len(), %hash, "policy hash recomputed");
            hash
        })
    }
}

fn term_value(term: &PolicyTerm) -> Value {
    json!({
        "term_id": term.term_id(),
        "term_type": term.term_type(),
        "label": term.label(),
        "description": term.description(),
        "metadata": term.metadata(),
        "constraints": term.constraints(),
    })
}

fn relation_value(relation: &PolicyRelation) -> Value {
    json!({
        "relation_id": relation.relation_id(),
        "relation_type": relation.relation_type().as_str(),
        "source": relation.source(),
        "target": relation.target(),
        "conditions": relation.conditions(),
        "metadata": relation.metadata(),
    })
}

/// In-memory policy engine.
///
/// Mutations take the write lock and drop the cached hash; evaluations take
/// the read lock, so an evaluation never observes a half-applied load.
#[derive(Debug, Default)]
pub struct PolicyEngine {
    state: RwLock<PolicyState>,
    strategy: MatchStrategy,
}

impl PolicyEngine {
    /// Creates an empty engine using containment matching.
    #[must_use]
    pub fn new(mode: PolicyMode) -> Self {
        Self::with_strategy(mode, MatchStrategy::default())
    }

    /// Creates an empty engine with an explicit matching strategy.
    #[must_use]
    pub fn with_strategy(mode: PolicyMode, strategy: MatchStrategy) -> Self {
        Self {
            state: RwLock::new(PolicyState {
                mode,
                ..PolicyState::default()
            }),
            strategy,
        }
    }

    /// Creates an engine populated from a document. Strict mode applies when
    /// the document names none.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a term or relation is invalid.
    pub fn from_document(document: PolicyDocument) -> PolicyResult<Self> {
        let engine = Self::new(document.mode().unwrap_or_default());
        engine.load_policy(document)?;
        Ok(engine)
    }

    fn read(&self) -> RwLockReadGuard<'_, PolicyState> {
        self.state.read().expect("policy state poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, PolicyState> {
        self.state.write().expect("policy state poisoned")
    }

    /// Current evaluation mode.
    ///
    /// # Panics
    ///
    /// Panics if the internal state lock has been poisoned.
    #[must_use]
    pub fn mode(&self) -> PolicyMode {
        self.read().mode
    }

    /// Switches the evaluation mode; the policy hash changes accordingly.
    ///
    /// # Panics
    ///
    /// Panics if the internal state lock has been poisoned.
    pub fn set_mode(&self, mode: PolicyMode) {
        let mut state = self.write();
        if state.mode != mode {
            state.mode = mode;
            state.invalidate();
        }
    }

    /// Matching strategy configured at construction.
    #[must_use]
    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// Inserts or overwrites a term by id.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidTerm`] when the term id is empty.
    ///
    /// # Panics
    ///
    /// Panics if the internal state lock has been poisoned.
    pub fn add_term(&self, term: PolicyTerm) -> PolicyResult<()> {
        term.validate()?;
        let mut state = self.write();
        state.terms.insert(term.term_id().to_owned(), term);
        state.invalidate();
        Ok(())
    }

    /// Appends a relation in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidRelation`] when an identifier is empty.
    ///
    /// # Panics
    ///
    /// Panics if the internal state lock has been poisoned.
    pub fn add_relation(&self, relation: PolicyRelation) -> PolicyResult<()> {
        relation.validate()?;
        let mut state = self.write();
        state.relations.push(relation);
        state.invalidate();
        Ok(())
    }

    /// Replaces the whole term and relation set with the document's content.
    ///
    /// The document's mode, when present, replaces the engine mode as well.
    /// Validation happens before the lock is taken, so a rejected document
    /// leaves the previous policy untouched.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any term or relation is invalid.
    ///
    /// # Panics
    ///
    /// Panics if the internal state lock has been poisoned.
    pub fn load_policy(&self, document: PolicyDocument) -> PolicyResult<()> {
        let (mode, terms, relations) = document.into_parts();
        let mut term_map = BTreeMap::new();
        for term in terms {
            term.validate()?;
            term_map.insert(term.term_id().to_owned(), term);
        }
        for relation in &relations {
            relation.validate()?;
        }

        let mut state = self.write();
        if let Some(mode) = mode {
            state.mode = mode;
        }
        state.terms = term_map;
        state.relations = relations;
        state.invalidate();
        info!(
            mode = %state.mode,
            terms = state.terms.len(),
            relations = state.relations.len(),
            "policy loaded"
        );
        Ok(())
    }

    /// Parses, validates, and loads a JSON policy document.
    ///
    /// # Errors
    ///
    /// Propagates parse and validation errors from [`PolicyDocument::from_json_str`].
    pub fn load_policy_json(&self, json: &str) -> PolicyResult<()> {
        self.load_policy(PolicyDocument::from_json_str(json)?)
    }

    /// Deterministic SHA-256 over the canonical (mode, terms, relations) form.
    ///
    /// # Panics
    ///
    /// Panics if the internal state lock has been poisoned.
    #[must_use]
    pub fn get_policy_hash(&self) -> String {
        self.read().hash().to_owned()
    }

    /// Looks up a term by id.
    ///
    /// # Panics
    ///
    /// Panics if the internal state lock has been poisoned.
    #[must_use]
    pub fn term(&self, term_id: &str) -> Option<PolicyTerm> {
        self.read().terms.get(term_id).cloned()
    }

    /// Snapshot of all terms, ordered by id.
    ///
    /// # Panics
    ///
    /// Panics if the internal state lock has been poisoned.
    #[must_use]
    pub fn terms(&self) -> Vec<PolicyTerm> {
        self.read().terms.values().cloned().collect()
    }

    /// Snapshot of all relations in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal state lock has been poisoned.
    #[must_use]
    pub fn relations(&self) -> Vec<PolicyRelation> {
        self.read().relations.clone()
    }

    /// Exports the current policy as a document.
    ///
    /// # Panics
    ///
    /// Panics if the internal state lock has been poisoned.
    #[must_use]
    pub fn to_document(&self) -> PolicyDocument {
        let state = self.read();
        let document = state
            .terms
            .values()
            .cloned()
            .fold(PolicyDocument::new(state.mode), PolicyDocument::with_term);
        state
            .relations
            .iter()
            .cloned()
            .fold(document, PolicyDocument::with_relation)
    }

    /// Evaluates a bare `(actor, action)` pair.
    #[must_use]
    pub fn evaluate(&self, actor: &str, action: &str) -> PolicyEvaluation {
        self.evaluate_query(&PolicyQuery::new(actor, action))
    }

    /// Evaluates a query against the current policy.
    ///
    /// Unknown actors or actions produce a denial with reasoning, never an
    /// error. The returned hash is computed under the same read lock as the
    /// matching, so it names exactly the policy state that was evaluated.
    ///
    /// # Panics
    ///
    /// Panics if the internal state lock has been poisoned.
    #[must_use]
    pub fn evaluate_query(&self, query: &PolicyQuery) -> PolicyEvaluation {
        let state = self.read();
        let actor = query.actor();
        let action = query.action();

        let mut permits = Vec::new();
        let mut forbids = Vec::new();
        let mut requirements = Vec::new();
        for relation in &state.relations {
            if !self
                .strategy
                .matches(actor, action, relation.source(), relation.target())
            {
                continue;
            }
            debug!(
                relation = relation.relation_id(),
                kind = %relation.relation_type(),
                actor,
                action,
                "policy relation matched"
            );
            match relation.relation_type() {
                RelationType::Permits => permits.push(relation.relation_id().to_owned()),
                RelationType::Forbids => forbids.push(relation.relation_id().to_owned()),
                RelationType::Requires => {
                    requirements.extend(relation.conditions().iter().cloned());
                }
            }
        }

        let evaluation = PolicyEvaluation::new(
            state.mode,
            permits,
            forbids,
            requirements,
            state.hash().to_owned(),
            actor,
            action,
        );
        debug!(
            actor,
            action,
            resource = query.resource().unwrap_or_default(),
            data_classes = ?query.data_classes(),
            permitted = evaluation.is_permitted(),
            mode = %evaluation.mode(),
            "policy evaluated"
        );
        evaluation
    }
}
