//! Decision request and response value objects.

use std::fmt;

use agent_capability::CapabilityToken;
use agent_policy::{PolicyMode, PolicyQuery};
use agent_primitives::{RequestId, canonical_json, sha256_hex};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{GovernanceError, GovernanceResult};

/// Caller-declared risk of a request, from 1 (lowest) to 5 (highest).
///
/// Recorded on the ledger; it does not change the permit formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RiskLevel(u8);

impl RiskLevel {
    /// Lowest risk.
    pub const MIN: Self = Self(1);
    /// Highest risk.
    pub const MAX: Self = Self(5);

    /// Validates a raw risk level.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::InvalidRequest`] outside `1..=5`.
    pub fn new(level: u8) -> GovernanceResult<Self> {
        if (Self::MIN.0..=Self::MAX.0).contains(&level) {
            Ok(Self(level))
        } else {
            Err(GovernanceError::InvalidRequest(format!(
                "risk_level must be between 1 and 5, got {level}"
            )))
        }
    }

    /// Raw value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for RiskLevel {
    fn default() -> Self {
        Self::MIN
    }
}

impl TryFrom<u8> for RiskLevel {
    type Error = GovernanceError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RiskLevel> for u8 {
    fn from(level: RiskLevel) -> Self {
        level.0
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One request for authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecisionRequest {
    actor: String,
    proposed_action: String,
    tool: String,
    #[serde(default)]
    user_intent: String,
    #[serde(default)]
    data_classes: Vec<String>,
    #[serde(default)]
    risk_level: RiskLevel,
    #[serde(default)]
    requested_output_type: String,
    #[serde(default)]
    policy_mode: PolicyMode,
    #[serde(default)]
    context: Map<String, Value>,
}

impl DecisionRequest {
    /// Builds a request with default risk level 1 and strict mode.
    #[must_use]
    pub fn new(
        actor: impl Into<String>,
        proposed_action: impl Into<String>,
        tool: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            proposed_action: proposed_action.into(),
            tool: tool.into(),
            user_intent: String::new(),
            data_classes: Vec::new(),
            risk_level: RiskLevel::default(),
            requested_output_type: String::new(),
            policy_mode: PolicyMode::default(),
            context: Map::new(),
        }
    }

    /// Parses and validates a JSON request.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::InvalidRequest`] for malformed JSON or a
    /// request that fails [`DecisionRequest::validate`].
    pub fn from_json_str(json: &str) -> GovernanceResult<Self> {
        let request: Self = serde_json::from_str(json)
            .map_err(|err| GovernanceError::InvalidRequest(err.to_string()))?;
        request.validate()?;
        Ok(request)
    }

    /// Sets the free-text intent.
    #[must_use]
    pub fn with_user_intent(mut self, intent: impl Into<String>) -> Self {
        self.user_intent = intent.into();
        self
    }

    /// Sets the data classes touched by the request.
    #[must_use]
    pub fn with_data_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_classes = classes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the risk level.
    #[must_use]
    pub fn with_risk_level(mut self, level: RiskLevel) -> Self {
        self.risk_level = level;
        self
    }

    /// Sets the requested output type.
    #[must_use]
    pub fn with_requested_output_type(mut self, output_type: impl Into<String>) -> Self {
        self.requested_output_type = output_type.into();
        self
    }

    /// Selects the engine mode used for evaluation.
    #[must_use]
    pub fn with_policy_mode(mut self, mode: PolicyMode) -> Self {
        self.policy_mode = mode;
        self
    }

    /// Attaches free-form context.
    #[must_use]
    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    /// Rejects requests with a blank actor, action or tool.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::InvalidRequest`] naming the blank field.
    pub fn validate(&self) -> GovernanceResult<()> {
        for (field, value) in [
            ("actor", &self.actor),
            ("proposed_action", &self.proposed_action),
            ("tool", &self.tool),
        ] {
            if value.trim().is_empty() {
                return Err(GovernanceError::InvalidRequest(format!(
                    "{field} must not be empty"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn to_query(&self) -> PolicyQuery {
        PolicyQuery::new(&self.actor, &self.proposed_action)
            .with_resource(&self.tool)
            .with_data_classes(self.data_classes.iter().cloned())
            .with_context(self.context.clone())
    }

    /// Requesting actor.
    #[must_use]
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Action the actor wants to perform.
    #[must_use]
    pub fn proposed_action(&self) -> &str {
        &self.proposed_action
    }

    /// Tool the action targets.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Free-text intent.
    #[must_use]
    pub fn user_intent(&self) -> &str {
        &self.user_intent
    }

    /// Data classes touched by the request.
    #[must_use]
    pub fn data_classes(&self) -> &[String] {
        &self.data_classes
    }

    /// Declared risk level.
    #[must_use]
    pub fn risk_level(&self) -> RiskLevel {
        self.risk_level
    }

    /// Requested output type.
    #[must_use]
    pub fn requested_output_type(&self) -> &str {
        &self.requested_output_type
    }

    /// Mode whose engine evaluates the request.
    #[must_use]
    pub fn policy_mode(&self) -> PolicyMode {
        self.policy_mode
    }

    /// Free-form context.
    #[must_use]
    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }
}

/// Final verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Request authorized.
    Permit,
    /// Request refused.
    Deny,
}

impl Decision {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Permit => "permit",
            Self::Deny => "deny",
        }
    }

    /// Returns `true` for [`Decision::Permit`].
    #[must_use]
    pub const fn is_permit(self) -> bool {
        matches!(self, Self::Permit)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one decision round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResponse {
    request_id: RequestId,
    decision: Decision,
    reasoning: String,
    policy_version_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    capability_token: Option<CapabilityToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ledger_entry_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
    timestamp: DateTime<Utc>,
}

impl DecisionResponse {
    pub(crate) fn new(
        request_id: RequestId,
        decision: Decision,
        reasoning: String,
        policy_version_hash: String,
    ) -> Self {
        Self {
            request_id,
            decision,
            reasoning,
            policy_version_hash,
            capability_token: None,
            ledger_entry_hash: None,
            signature: None,
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn set_capability_token(&mut self, token: CapabilityToken) {
        self.capability_token = Some(token);
    }

    pub(crate) fn set_ledger_entry_hash(&mut self, hash: String) {
        self.ledger_entry_hash = Some(hash);
    }

    pub(crate) fn set_signature(&mut self, signature: String) {
        self.signature = Some(signature);
    }

    /// Hex SHA-256 over the canonical JSON of everything except the
    /// signature. This is the message the signer signs.
    #[must_use]
    pub fn signing_digest(&self) -> String {
        let digest_input: Value = json!({
            "request_id": self.request_id.to_string(),
            "decision": self.decision.as_str(),
            "reasoning": self.reasoning,
            "policy_version_hash": self.policy_version_hash,
            "token_id": self.capability_token.as_ref().map(|token| token.token_id().as_str()),
            "ledger_entry_hash": self.ledger_entry_hash,
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        });
        sha256_hex(canonical_json(&digest_input))
    }

    /// Request identifier assigned by the service.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Verdict.
    #[must_use]
    pub fn decision(&self) -> Decision {
        self.decision
    }

    /// Human-readable explanation from the policy engine.
    #[must_use]
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Policy hash the evaluation ran against.
    #[must_use]
    pub fn policy_version_hash(&self) -> &str {
        &self.policy_version_hash
    }

    /// Token issued on permit.
    #[must_use]
    pub fn capability_token(&self) -> Option<&CapabilityToken> {
        self.capability_token.as_ref()
    }

    /// Hash of the ledger entry recording the decision.
    #[must_use]
    pub fn ledger_entry_hash(&self) -> Option<&str> {
        self.ledger_entry_hash.as_deref()
    }

    /// Hex-encoded signature over [`DecisionResponse::signing_digest`].
    #[must_use]
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    /// Response time.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_bounds() {
        assert!(RiskLevel::new(0).is_err());
        assert_eq!(RiskLevel::new(3).unwrap().get(), 3);
        assert!(RiskLevel::new(6).is_err());
    }

    #[test]
    fn parses_wire_request() {
        let request = DecisionRequest::from_json_str(
            r#"{
                "actor": "agent:research",
                "proposed_action": "search",
                "tool": "web_search",
                "user_intent": "find papers",
                "data_classes": ["public"],
                "risk_level": 2,
                "requested_output_type": "text",
                "policy_mode": "PERMISSIVE",
                "context": {"session": "s1"}
            }"#,
        )
        .unwrap();

        assert_eq!(request.actor(), "agent:research");
        assert_eq!(request.risk_level().get(), 2);
        assert_eq!(request.policy_mode(), PolicyMode::Permissive);
        assert_eq!(request.context()["session"], "s1");
    }

    #[test]
    fn rejects_bad_requests() {
        let blank = DecisionRequest::from_json_str(
            r#"{"actor": " ", "proposed_action": "search", "tool": "web"}"#,
        );
        assert!(matches!(blank, Err(GovernanceError::InvalidRequest(msg)) if msg.contains("actor")));

        let risky = DecisionRequest::from_json_str(
            r#"{"actor": "a", "proposed_action": "search", "tool": "web", "risk_level": 9}"#,
        );
        assert!(matches!(risky, Err(GovernanceError::InvalidRequest(_))));

        let mode = DecisionRequest::from_json_str(
            r#"{"actor": "a", "proposed_action": "search", "tool": "web", "policy_mode": "lenient"}"#,
        );
        assert!(matches!(mode, Err(GovernanceError::InvalidRequest(_))));
    }

    #[test]
    fn digest_covers_ledger_hash() {
        let mut response = DecisionResponse::new(
            RequestId::random(),
            Decision::Deny,
            "denied".into(),
            "hash".into(),
        );
        let before = response.signing_digest();
        response.set_ledger_entry_hash("abc".into());
        assert_ne!(before, response.signing_digest());

        let signed_digest = response.signing_digest();
        response.set_signature("00".into());
        assert_eq!(signed_digest, response.signing_digest());
    }
}
