//! Short-lived, exact-scope capability tokens.

use agent_primitives::{TokenId, canonical_json};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Default lifetime of a freshly issued token.
pub const DEFAULT_TTL_MINUTES: i64 = 5;

/// The single `(action, tool)` pair a token authorizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenScope {
    /// Action the holder may perform.
    pub action: String,
    /// Tool the action may be performed on.
    pub tool: String,
}

/// Ephemeral credential bound to the policy version that authorized it.
///
/// Tokens are never revoked explicitly; they stop working when `expiry`
/// passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityToken {
    token_id: TokenId,
    scope: TokenScope,
    expiry: DateTime<Utc>,
    policy_version_hash: String,
    granted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

impl CapabilityToken {
    /// Issues a token valid for `ttl_minutes` from now. A zero or negative TTL
    /// produces a token that is already invalid. TTLs beyond what chrono can
    /// represent saturate instead of overflowing.
    #[must_use]
    pub fn create(
        action: impl Into<String>,
        tool: impl Into<String>,
        policy_version_hash: impl Into<String>,
        ttl_minutes: i64,
    ) -> Self {
        let ttl = Duration::try_minutes(ttl_minutes).unwrap_or(if ttl_minutes < 0 {
            Duration::MIN
        } else {
            Duration::MAX
        });
        Self::create_with_ttl(action, tool, policy_version_hash, ttl)
    }

    /// Issues a token valid for an arbitrary duration from now. The expiry
    /// clamps to the representable range.
    #[must_use]
    pub fn create_with_ttl(
        action: impl Into<String>,
        tool: impl Into<String>,
        policy_version_hash: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        let granted_at = Utc::now();
        let expiry = granted_at.checked_add_signed(ttl).unwrap_or(if ttl < Duration::zero() {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        });
        Self {
            token_id: TokenId::generate(),
            scope: TokenScope {
                action: action.into(),
                tool: tool.into(),
            },
            expiry,
            policy_version_hash: policy_version_hash.into(),
            granted_at,
            signature: None,
        }
    }

    /// Attaches a hex-encoded signature.
    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// True while `expiry` lies in the future.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// True when `expiry` is strictly after `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry > now
    }

    /// Valid and scoped to exactly this action and tool.
    #[must_use]
    pub fn is_authorized_for(&self, action: &str, tool: &str) -> bool {
        self.is_valid() && self.scope.action == action && self.scope.tool == tool
    }

    /// Canonical bytes covered by a token signature.
    #[must_use]
    pub fn signing_payload(&self) -> Vec<u8> {
        canonical_json(&json!({
            "token_id": self.token_id.as_str(),
            "scope": {"action": self.scope.action, "tool": self.scope.tool},
            "expiry": self.expiry.to_rfc3339(),
            "policy_version_hash": self.policy_version_hash,
            "granted_at": self.granted_at.to_rfc3339(),
        }))
        .into_bytes()
    }

    /// Token identifier.
    #[must_use]
    pub fn token_id(&self) -> &TokenId {
        &self.token_id
    }

    /// Authorized scope.
    #[must_use]
    pub fn scope(&self) -> &TokenScope {
        &self.scope
    }

    /// Absolute expiry time.
    #[must_use]
    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    /// Hash of the policy state that authorized the token.
    #[must_use]
    pub fn policy_version_hash(&self) -> &str {
        &self.policy_version_hash
    }

    /// Issue time.
    #[must_use]
    pub fn granted_at(&self) -> DateTime<Utc> {
        self.granted_at
    }

    /// Optional signature.
    #[must_use]
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ttl_is_invalid_immediately() {
        let token = CapabilityToken::create("search", "web_search", "hash1", 0);
        assert!(!token.is_valid());
        assert!(!token.is_authorized_for("search", "web_search"));
    }

    #[test]
    fn lifetime_is_bounded_by_ttl() {
        let token = CapabilityToken::create("search", "web_search", "hash1", 5);
        assert!(token.is_valid());
        assert_eq!(token.expiry() - token.granted_at(), Duration::minutes(5));
        assert!(token.is_valid_at(token.granted_at() + Duration::minutes(4)));
        assert!(!token.is_valid_at(token.granted_at() + Duration::minutes(5)));
        assert!(!token.is_valid_at(token.granted_at() + Duration::minutes(5) + Duration::seconds(1)));
    }

    #[test]
    fn out_of_range_ttl_saturates() {
        let forever = CapabilityToken::create("search", "web_search", "hash1", i64::MAX);
        assert_eq!(forever.expiry(), DateTime::<Utc>::MAX_UTC);
        assert!(forever.is_valid());

        let never = CapabilityToken::create("search", "web_search", "hash1", i64::MIN);
        assert_eq!(never.expiry(), DateTime::<Utc>::MIN_UTC);
        assert!(!never.is_valid());

        let huge = CapabilityToken::create_with_ttl("search", "web_search", "hash1", Duration::MAX);
        assert_eq!(huge.expiry(), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn scope_must_match_exactly() {
        let token = CapabilityToken::create("search", "web_search", "hash1", 5);
        assert!(token.is_authorized_for("search", "web_search"));
        assert!(!token.is_authorized_for("search", "web_search_v2"));
        assert!(!token.is_authorized_for("sear", "web_search"));
        assert!(!token.is_authorized_for("write", "web_search"));
    }

    #[test]
    fn wire_shape_matches_contract() {
        let token = CapabilityToken::create("read", "crm", "abc", 5).with_signature("beef");
        let value = serde_json::to_value(&token).unwrap();
        assert_eq!(value["scope"]["action"], "read");
        assert_eq!(value["scope"]["tool"], "crm");
        assert_eq!(value["policy_version_hash"], "abc");
        assert_eq!(value["signature"], "beef");
        assert!(value["token_id"].as_str().unwrap().starts_with("cap_"));

        let decoded: CapabilityToken = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn signing_payload_excludes_signature() {
        let token = CapabilityToken::create("read", "crm", "abc", 5);
        let signed = token.clone().with_signature("beef");
        assert_eq!(token.signing_payload(), signed.signing_payload());
    }
}
