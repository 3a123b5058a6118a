//! Errors raised by the decision service.

use agent_ledger::LedgerError;
use agent_policy::{PolicyError, PolicyMode};
use thiserror::Error;

use crate::stage::StageError;

/// Errors raised while producing a decision.
///
/// A denial is never an error; it is a [`DecisionResponse`] with
/// [`Decision::Deny`].
///
/// [`DecisionResponse`]: crate::DecisionResponse
/// [`Decision::Deny`]: crate::Decision::Deny
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// The request failed validation.
    #[error("invalid decision request: {0}")]
    InvalidRequest(String),
    /// No engine is registered for the requested mode.
    #[error("no policy engine registered for mode {0}")]
    EngineUnavailable(PolicyMode),
    /// The engine registered for a mode evaluated under a different mode,
    /// typically after a policy reload changed its mode.
    #[error("policy engine for mode {requested} evaluated in mode {evaluated}")]
    ModeMismatch {
        /// Mode the request asked for.
        requested: PolicyMode,
        /// Mode the engine actually applied.
        evaluated: PolicyMode,
    },
    /// Policy loading or evaluation failed.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// The ledger could not record the decision.
    #[error("ledger append failed: {0}")]
    Ledger(#[from] LedgerError),
    /// Signing key material was rejected.
    #[error("signing error: {0}")]
    Signing(String),
    /// The decision flow was driven out of order.
    #[error(transparent)]
    Stage(#[from] StageError),
}

/// Result alias for governance operations.
pub type GovernanceResult<T> = Result<T, GovernanceError>;
