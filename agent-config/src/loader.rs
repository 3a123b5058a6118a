//! Loading configuration from TOML files and the environment.

use std::path::{Path, PathBuf};

use agent_policy::PolicyMode;
use thiserror::Error;
use tracing::debug;

use crate::schema::GovernanceConfig;

/// Overrides `[policy] mode`.
pub const ENV_POLICY_MODE: &str = "GOVERNANCE_POLICY_MODE";
/// Overrides `[tokens] ttl_minutes`.
pub const ENV_TOKEN_TTL_MINUTES: &str = "GOVERNANCE_TOKEN_TTL_MINUTES";
/// Overrides `[ledger] path`.
pub const ENV_LEDGER_PATH: &str = "GOVERNANCE_LEDGER_PATH";
/// Overrides `[telemetry] filter`.
pub const ENV_LOG: &str = "GOVERNANCE_LOG";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML for the schema.
    #[error("failed to parse config: {0}")]
    Parse(String),
    /// A value is out of range or malformed.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted key of the offending value.
        field: &'static str,
        /// Explanation.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

impl GovernanceConfig {
    /// Reads and parses a TOML file without applying overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on syntax errors, unknown keys or
    /// unknown policy modes.
    pub fn parse(toml: &str) -> ConfigResult<Self> {
        toml::from_str(toml).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads the file when given (defaults otherwise), applies environment
    /// overrides, and validates the result.
    ///
    /// # Errors
    ///
    /// Propagates load, override, and validation failures.
    pub fn resolve(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        debug!(
            source = ?path,
            mode = %config.policy.mode,
            ttl_minutes = config.tokens.ttl_minutes,
            ledger = ?config.ledger.path,
            signing = config.signing.seed_hex.is_some(),
            "configuration resolved"
        );
        Ok(config)
    }

    /// Applies `GOVERNANCE_*` overrides using `lookup` to read variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when an override does not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup(ENV_POLICY_MODE) {
            self.policy.mode = mode
                .parse::<PolicyMode>()
                .map_err(|err| ConfigError::invalid("policy.mode", err.to_string()))?;
        }
        if let Some(ttl) = lookup(ENV_TOKEN_TTL_MINUTES) {
            self.tokens.ttl_minutes = ttl.trim().parse().map_err(|_| {
                ConfigError::invalid("tokens.ttl_minutes", format!("not an integer: {ttl}"))
            })?;
        }
        if let Some(path) = lookup(ENV_LEDGER_PATH) {
            self.ledger.path = Some(PathBuf::from(path));
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.telemetry.filter = Some(filter);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use agent_policy::MatchStrategy;

    use super::*;
    use crate::schema::{DEFAULT_QUEUE_CAPACITY, DEFAULT_TTL_MINUTES, MAX_TTL_MINUTES};

    #[test]
    fn defaults() {
        let config = GovernanceConfig::default();
        assert_eq!(config.policy.mode, PolicyMode::Strict);
        assert_eq!(config.policy.matching, MatchStrategy::Containment);
        assert_eq!(config.tokens.ttl_minutes, DEFAULT_TTL_MINUTES);
        assert_eq!(config.ledger.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(config.ledger.path.is_none());
        assert!(config.validate().is_ok());
        assert_eq!(GovernanceConfig::parse("").unwrap(), config);
    }

    #[test]
    fn parses_all_sections() {
        let config = GovernanceConfig::parse(
            r#"
            [policy]
            mode = "permissive"
            document = "policy.json"
            matching = "exact"

            [tokens]
            ttl_minutes = 10

            [ledger]
            path = "/var/lib/governance/ledger.jsonl"
            queue_capacity = 64

            [signing]
            seed_hex = "0101010101010101010101010101010101010101010101010101010101010101"

            [telemetry]
            filter = "debug"
            with_target = true
            "#,
        )
        .unwrap();

        assert_eq!(config.policy.mode, PolicyMode::Permissive);
        assert_eq!(config.policy.document, Some(PathBuf::from("policy.json")));
        assert_eq!(config.policy.matching, MatchStrategy::Exact);
        assert_eq!(config.tokens.ttl_minutes, 10);
        assert_eq!(config.ledger.queue_capacity, 64);
        assert_eq!(config.signing.seed_bytes().unwrap(), Some([1u8; 32]));
        assert_eq!(config.telemetry.filter.as_deref(), Some("debug"));
        assert!(config.telemetry.with_target);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_mode_and_keys() {
        assert!(matches!(
            GovernanceConfig::parse("[policy]\nmode = \"lenient\"\n"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            GovernanceConfig::parse("[tokens]\nttl = 3\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn validation_failures() {
        let mut config = GovernanceConfig::default();
        config.ledger.queue_capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "ledger.queue_capacity", .. })
        ));

        let mut config = GovernanceConfig::default();
        config.signing.seed_hex = Some("abcd".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "signing.seed_hex", .. })
        ));

        let mut config = GovernanceConfig::default();
        config.tokens.ttl_minutes = 0;
        assert!(config.validate().is_err());

        config.tokens.ttl_minutes = MAX_TTL_MINUTES;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn oversized_ttl_override_fails_validation() {
        let mut config = GovernanceConfig::default();
        config
            .apply_overrides(|key| {
                (key == ENV_TOKEN_TTL_MINUTES).then(|| i64::MAX.to_string())
            })
            .unwrap();
        assert_eq!(config.tokens.ttl_minutes, i64::MAX);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "tokens.ttl_minutes", .. })
        ));
    }

    #[test]
    fn environment_overrides() {
        let vars = HashMap::from([
            (ENV_POLICY_MODE, "PARANOID"),
            (ENV_TOKEN_TTL_MINUTES, "2"),
            (ENV_LEDGER_PATH, "/tmp/ledger.jsonl"),
            (ENV_LOG, "agent_ledger=debug"),
        ]);
        let mut config = GovernanceConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.policy.mode, PolicyMode::Paranoid);
        assert_eq!(config.tokens.ttl_minutes, 2);
        assert_eq!(config.ledger.path, Some(PathBuf::from("/tmp/ledger.jsonl")));
        assert_eq!(config.telemetry.filter.as_deref(), Some("agent_ledger=debug"));
    }

    #[test]
    fn bad_override_is_invalid() {
        let mut config = GovernanceConfig::default();
        let err = config
            .apply_overrides(|key| (key == ENV_POLICY_MODE).then(|| "lenient".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "policy.mode", .. }));

        let err = config
            .apply_overrides(|key| (key == ENV_TOKEN_TTL_MINUTES).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "tokens.ttl_minutes", .. }));
    }

    #[test]
    fn loads_from_file() {
        let mut path = std::env::temp_dir();
        path.push(format!("governance-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[tokens]\nttl_minutes = 7\n").unwrap();

        let config = GovernanceConfig::load(&path).unwrap();
        assert_eq!(config.tokens.ttl_minutes, 7);
        let _ = std::fs::remove_file(&path);

        assert!(matches!(
            GovernanceConfig::load(&path),
            Err(ConfigError::Io(_))
        ));
    }
}
