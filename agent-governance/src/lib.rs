//! Decision service for the MXP governance core.
//!
//! A [`DecisionService`] evaluates each [`DecisionRequest`] against the policy
//! engine registered for its mode, issues a [`CapabilityToken`] on permit,
//! records the decision on the ledger, and optionally signs the result. Each
//! request is tracked by a [`DecisionFlow`] so the steps cannot run out of
//! order.
//!
//! [`CapabilityToken`]: agent_capability::CapabilityToken

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod request;
mod service;
mod signing;
mod stage;

pub use error::{GovernanceError, GovernanceResult};
pub use request::{Decision, DecisionRequest, DecisionResponse, RiskLevel};
pub use service::{DECISION_EVENT, DecisionService};
pub use signing::{DecisionSigner, Ed25519Signer};
pub use stage::{DecisionFlow, DecisionStage, StageError, StageEvent, StageResult};
