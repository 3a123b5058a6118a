//! Capability tokens issued for permitted actions.
//!
//! A [`CapabilityToken`] authorizes exactly one `(action, tool)` pair for a
//! short window and records the policy version that allowed it. Scope checks
//! are exact string comparisons. Tokens are not patterns.

#![warn(missing_docs, clippy::pedantic)]

mod store;
mod token;

pub use store::CapabilityTokenStore;
pub use token::{CapabilityToken, DEFAULT_TTL_MINUTES, TokenScope};
