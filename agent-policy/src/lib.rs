//! Governance policy evaluation.
//!
//! A [`PolicyEngine`] owns a vocabulary of [`PolicyTerm`]s and an ordered list
//! of [`PolicyRelation`]s between them, evaluates `(actor, action)` pairs under
//! a [`PolicyMode`], and exposes a deterministic version hash that binds every
//! decision to the exact policy it was made under.

#![warn(missing_docs, clippy::pedantic)]

pub mod contracts;
pub mod decision;
pub mod document;
pub mod engine;
pub mod mode;
pub mod relation;
pub mod term;

pub use contracts::PolicyQuery;
pub use decision::PolicyEvaluation;
pub use document::PolicyDocument;
pub use engine::{PolicyEngine, PolicyError, PolicyResult};
pub use mode::{MatchStrategy, PolicyMode};
pub use relation::{PolicyRelation, RelationType};
pub use term::{PolicyTerm, TermType};
