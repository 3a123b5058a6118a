//! Evaluation modes and relation matching strategies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::PolicyError;

/// Authorization semantics applied by an engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum PolicyMode {
    /// Default deny: permit only with an explicit permission and no prohibition.
    #[default]
    Strict,
    /// Default allow: permit unless a prohibition matches.
    Permissive,
    /// Same formula as [`PolicyMode::Strict`]; reserved for risk-aware review.
    Paranoid,
}

impl PolicyMode {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Permissive => "permissive",
            Self::Paranoid => "paranoid",
        }
    }

    /// Applies the mode's permit formula. Deny wins in every mode.
    #[must_use]
    pub const fn permits(self, permits_count: usize, forbids_count: usize) -> bool {
        if forbids_count > 0 {
            return false;
        }
        match self {
            Self::Strict | Self::Paranoid => permits_count > 0,
            Self::Permissive => true,
        }
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyMode {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            "paranoid" => Ok(Self::Paranoid),
            _ => Err(PolicyError::InvalidMode(s.to_owned())),
        }
    }
}

impl TryFrom<String> for PolicyMode {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PolicyMode> for &'static str {
    fn from(value: PolicyMode) -> Self {
        value.as_str()
    }
}

/// How `(actor, action)` tokens are matched against relation endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Actor is a substring of the source id and action a substring of the target id.
    ///
    /// Namespaced ids that share substrings (`actor:user` and
    /// `actor:superuser`) both match the actor `user`.
    #[default]
    Containment,
    /// Actor equals the source id or its local name after the last `:`,
    /// likewise for the action and the target.
    Exact,
}

impl MatchStrategy {
    pub(crate) fn matches(self, actor: &str, action: &str, source: &str, target: &str) -> bool {
        if actor.is_empty() || action.is_empty() {
            return false;
        }
        match self {
            Self::Containment => source.contains(actor) && target.contains(action),
            Self::Exact => exact_endpoint(actor, source) && exact_endpoint(action, target),
        }
    }
}

fn exact_endpoint(token: &str, endpoint: &str) -> bool {
    endpoint == token || endpoint.rsplit_once(':').is_some_and(|(_, local)| local == token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes_case_insensitively() {
        assert_eq!("STRICT".parse::<PolicyMode>().unwrap(), PolicyMode::Strict);
        assert_eq!(" permissive".parse::<PolicyMode>().unwrap(), PolicyMode::Permissive);
        assert_eq!("paranoid".parse::<PolicyMode>().unwrap(), PolicyMode::Paranoid);
        assert!(matches!(
            "lenient".parse::<PolicyMode>(),
            Err(PolicyError::InvalidMode(mode)) if mode == "lenient"
        ));
    }

    #[test]
    fn deny_wins_in_every_mode() {
        for mode in [PolicyMode::Strict, PolicyMode::Permissive, PolicyMode::Paranoid] {
            assert!(!mode.permits(3, 1), "{mode} must deny on a forbid");
        }
        assert!(PolicyMode::Permissive.permits(0, 0));
        assert!(!PolicyMode::Strict.permits(0, 0));
        assert!(!PolicyMode::Paranoid.permits(0, 0));
    }

    #[test]
    fn containment_matches_shared_substrings() {
        let strategy = MatchStrategy::Containment;
        assert!(strategy.matches("user", "read", "actor:superuser", "action:read_all"));
        assert!(!strategy.matches("", "read", "actor:user", "action:read"));
    }

    #[test]
    fn exact_requires_full_local_name() {
        let strategy = MatchStrategy::Exact;
        assert!(strategy.matches("user", "read", "actor:user", "action:read"));
        assert!(strategy.matches("actor:user", "read", "actor:user", "action:read"));
        assert!(!strategy.matches("user", "read", "actor:superuser", "action:read"));
    }
}
