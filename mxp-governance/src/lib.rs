//! MXP governance core facade.
//!
//! Depend on this crate via `cargo add mxp-governance`. It bundles the policy
//! engine, audit ledger, capability tokens, and decision service behind
//! feature flags so downstream users can enable only what they need.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use agent_primitives as primitives;

/// Policy terms, relations, and evaluation (enabled by `policy` feature).
#[cfg(feature = "policy")]
pub use agent_policy as policy;

/// Hash-chained audit ledger (enabled by `ledger` feature).
#[cfg(feature = "ledger")]
pub use agent_ledger as ledger;

/// Capability tokens (enabled by `capability` feature).
#[cfg(feature = "capability")]
pub use agent_capability as capability;

/// Decision service (enabled by `governance` feature).
#[cfg(feature = "governance")]
pub use agent_governance as governance;

/// Tracing subscriber setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use agent_telemetry as telemetry;

/// Configuration management (enabled by `config` feature).
#[cfg(feature = "config")]
pub use agent_config as config;
