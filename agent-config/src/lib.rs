//! Configuration for governance services.
//!
//! [`GovernanceConfig`] is read from TOML, adjusted by `GOVERNANCE_*`
//! environment variables, and validated before use.

#![warn(missing_docs, clippy::pedantic)]

mod loader;
mod schema;

pub use loader::{
    ConfigError, ConfigResult, ENV_LEDGER_PATH, ENV_LOG, ENV_POLICY_MODE, ENV_TOKEN_TTL_MINUTES,
};
pub use schema::{
    DEFAULT_QUEUE_CAPACITY, DEFAULT_TTL_MINUTES, GovernanceConfig, LedgerConfig, MAX_TTL_MINUTES,
    PolicyConfig, SigningConfig, TokenConfig,
};
pub use agent_telemetry::TelemetryConfig;
