//! Observability utilities for governance services.
//!
//! Installs a `tracing-subscriber` fmt subscriber whose filter comes from
//! configuration, then `RUST_LOG`, then `info`.

#![warn(missing_docs, clippy::pedantic)]

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Filter applied when neither configuration nor `RUST_LOG` provides one.
pub const DEFAULT_FILTER: &str = "info";

/// Subscriber settings, usually read from the `[telemetry]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive such as `info,agent_ledger=debug`.
    pub filter: Option<String>,
    /// Emit ANSI colour codes.
    pub ansi: bool,
    /// Include the event target in each line.
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: None,
            ansi: true,
            with_target: false,
        }
    }
}

impl TelemetryConfig {
    /// Sets the filter directive.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Disables ANSI colour codes.
    #[must_use]
    pub fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    /// Resolves the filter: explicit directive, then `RUST_LOG`, then
    /// [`DEFAULT_FILTER`].
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidFilter`] when the configured directive
    /// does not parse.
    pub fn env_filter(&self) -> TelemetryResult<EnvFilter> {
        match &self.filter {
            Some(directive) => {
                EnvFilter::try_new(directive).map_err(|err| TelemetryError::InvalidFilter {
                    directive: directive.clone(),
                    reason: err.to_string(),
                })
            }
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
        }
    }
}

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directive could not be parsed.
    #[error("invalid log filter '{directive}': {reason}")]
    InvalidFilter {
        /// Directive as configured.
        directive: String,
        /// Parser message.
        reason: String,
    },
    /// A global subscriber is already installed.
    #[error("tracing subscriber already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Result alias for telemetry setup.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Installs the global fmt subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] for a bad directive and
/// [`TelemetryError::AlreadyInitialized`] when called more than once.
pub fn init_tracing(config: &TelemetryConfig) -> TelemetryResult<()> {
    let filter = config.env_filter()?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(config.with_target)
        .try_init()
        .map_err(|err| TelemetryError::AlreadyInitialized(err.to_string()))?;
    tracing::debug!(ansi = config.ansi, with_target = config.with_target, "tracing initialized");
    Ok(())
}
