//! Strongly typed configuration schema.

use std::path::PathBuf;

use agent_policy::{MatchStrategy, PolicyMode};
use agent_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};

use crate::loader::{ConfigError, ConfigResult};

/// Default capability token lifetime.
pub const DEFAULT_TTL_MINUTES: i64 = 5;

/// Longest accepted capability token lifetime (one day).
pub const MAX_TTL_MINUTES: i64 = 24 * 60;

/// Default ledger writer queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GovernanceConfig {
    /// Policy engine settings.
    pub policy: PolicyConfig,
    /// Capability token settings.
    pub tokens: TokenConfig,
    /// Ledger persistence settings.
    pub ledger: LedgerConfig,
    /// Decision signing settings.
    pub signing: SigningConfig,
    /// Tracing subscriber settings.
    pub telemetry: TelemetryConfig,
}

/// `[policy]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Mode applied to requests that do not name one. Every mode gets its
    /// own engine, so this never changes how an engine evaluates.
    pub mode: PolicyMode,
    /// JSON policy document loaded at startup.
    pub document: Option<PathBuf>,
    /// Relation matching strategy.
    pub matching: MatchStrategy,
}

/// `[tokens]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenConfig {
    /// Lifetime of issued capability tokens.
    pub ttl_minutes: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: DEFAULT_TTL_MINUTES,
        }
    }
}

/// `[ledger]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// JSONL journal file. The ledger stays in memory when unset.
    pub path: Option<PathBuf>,
    /// Bound on queued appends awaiting the writer.
    pub queue_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// `[signing]` section.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SigningConfig {
    /// Hex-encoded 32-byte ed25519 seed. Signing is off when unset.
    pub seed_hex: Option<String>,
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("seed_hex", &self.seed_hex.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl SigningConfig {
    /// Decodes the seed, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the seed is not 32 bytes of hex.
    pub fn seed_bytes(&self) -> ConfigResult<Option<[u8; 32]>> {
        let Some(seed_hex) = &self.seed_hex else {
            return Ok(None);
        };
        let bytes = hex::decode(seed_hex.trim())
            .map_err(|err| ConfigError::invalid("signing.seed_hex", err.to_string()))?;
        let seed = <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
            ConfigError::invalid(
                "signing.seed_hex",
                format!("expected 32 bytes, got {}", bytes.len()),
            )
        })?;
        Ok(Some(seed))
    }
}

impl GovernanceConfig {
    /// Checks values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero queue capacity, a
    /// token TTL outside `1..=MAX_TTL_MINUTES`, or a malformed signing seed.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.ledger.queue_capacity == 0 {
            return Err(ConfigError::invalid(
                "ledger.queue_capacity",
                "must be greater than zero",
            ));
        }
        if !(1..=MAX_TTL_MINUTES).contains(&self.tokens.ttl_minutes) {
            return Err(ConfigError::invalid(
                "tokens.ttl_minutes",
                format!(
                    "must be between 1 and {MAX_TTL_MINUTES}, got {}",
                    self.tokens.ttl_minutes
                ),
            ));
        }
        self.signing.seed_bytes()?;
        Ok(())
    }
}
