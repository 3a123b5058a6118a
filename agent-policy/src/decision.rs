//! Evaluation results returned by the policy engine.

use serde::{Deserialize, Serialize};

use crate::mode::PolicyMode;

/// Outcome of evaluating one `(actor, action)` pair.
///
/// A denial is an ordinary evaluation result, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEvaluation {
    permitted: bool,
    mode: PolicyMode,
    permits_count: usize,
    forbids_count: usize,
    policy_version_hash: String,
    reasoning: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    matched_relations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    requirements: Vec<String>,
}

impl PolicyEvaluation {
    pub(crate) fn new(
        mode: PolicyMode,
        permits: Vec<String>,
        forbids: Vec<String>,
        requirements: Vec<String>,
        policy_version_hash: String,
        actor: &str,
        action: &str,
    ) -> Self {
        let permitted = mode.permits(permits.len(), forbids.len());
        let reasoning = if !forbids.is_empty() {
            format!(
                "denied: {} explicit prohibition(s) matched for actor '{actor}' and action '{action}' ({})",
                forbids.len(),
                forbids.join(", ")
            )
        } else if permitted && permits.is_empty() {
            format!(
                "permitted: no prohibition matched actor '{actor}' and action '{action}' ({mode} mode allows by default)"
            )
        } else if permitted {
            format!(
                "permitted: {} explicit permission(s) matched for actor '{actor}' and action '{action}' ({})",
                permits.len(),
                permits.join(", ")
            )
        } else {
            format!(
                "denied: no explicit permission for actor '{actor}' to perform '{action}' ({mode} mode denies by default)"
            )
        };

        let permits_count = permits.len();
        let forbids_count = forbids.len();
        let mut matched_relations = forbids;
        matched_relations.extend(permits);

        Self {
            permitted,
            mode,
            permits_count,
            forbids_count,
            policy_version_hash,
            reasoning,
            matched_relations,
            requirements,
        }
    }

    /// Returns true when the action may proceed.
    #[must_use]
    pub fn is_permitted(&self) -> bool {
        self.permitted
    }

    /// Mode used for the evaluation.
    #[must_use]
    pub fn mode(&self) -> PolicyMode {
        self.mode
    }

    /// Number of matching `permits` relations.
    #[must_use]
    pub fn permits_count(&self) -> usize {
        self.permits_count
    }

    /// Number of matching `forbids` relations.
    #[must_use]
    pub fn forbids_count(&self) -> usize {
        self.forbids_count
    }

    /// Hash of the exact policy state the evaluation ran against.
    #[must_use]
    pub fn policy_version_hash(&self) -> &str {
        &self.policy_version_hash
    }

    /// Human-readable explanation.
    #[must_use]
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Identifiers of matched `forbids` relations followed by matched `permits`.
    #[must_use]
    pub fn matched_relations(&self) -> &[String] {
        &self.matched_relations
    }

    /// Conditions collected from matching `requires` relations.
    #[must_use]
    pub fn requirements(&self) -> &[String] {
        &self.requirements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbid_reasoning_names_relations() {
        let evaluation = PolicyEvaluation::new(
            PolicyMode::Permissive,
            vec!["p1".into()],
            vec!["f1".into()],
            Vec::new(),
            "hash".into(),
            "user",
            "delete",
        );
        assert!(!evaluation.is_permitted());
        assert!(evaluation.reasoning().contains("f1"));
        assert_eq!(evaluation.matched_relations(), ["f1", "p1"]);
    }

    #[test]
    fn strict_denial_mentions_missing_permission() {
        let evaluation = PolicyEvaluation::new(
            PolicyMode::Strict,
            Vec::new(),
            Vec::new(),
            Vec::new(),
            "hash".into(),
            "user",
            "delete",
        );
        assert!(!evaluation.is_permitted());
        assert!(evaluation.reasoning().contains("no explicit permission"));
    }
}
