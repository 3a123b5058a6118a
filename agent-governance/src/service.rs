//! Decision orchestration: evaluate, issue, record, sign.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use agent_capability::{CapabilityToken, CapabilityTokenStore, DEFAULT_TTL_MINUTES};
use agent_ledger::LedgerAppender;
use agent_policy::{PolicyEngine, PolicyMode};
use agent_primitives::{RequestId, TokenId};
use chrono::Duration;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::error::{GovernanceError, GovernanceResult};
use crate::request::{Decision, DecisionRequest, DecisionResponse};
use crate::signing::DecisionSigner;
use crate::stage::{DecisionFlow, StageEvent};

/// Event type used for decision entries on the ledger.
pub const DECISION_EVENT: &str = "decision";

/// Produces one [`DecisionResponse`] per [`DecisionRequest`].
///
/// Engines are registered per [`PolicyMode`]; a paranoid request falls back
/// to the strict engine when no paranoid engine is registered. Ledger and
/// signer are optional. When absent, the matching response fields stay
/// empty.
pub struct DecisionService {
    engines: HashMap<PolicyMode, Arc<PolicyEngine>>,
    tokens: Arc<CapabilityTokenStore>,
    ledger: Option<Arc<dyn LedgerAppender>>,
    signer: Option<Arc<dyn DecisionSigner>>,
    token_ttl: Duration,
}

impl fmt::Debug for DecisionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modes: Vec<_> = self.engines.keys().map(|mode| mode.as_str()).collect();
        modes.sort_unstable();
        f.debug_struct("DecisionService")
            .field("engines", &modes)
            .field("tokens", &self.tokens.len())
            .field("ledger_configured", &self.ledger.is_some())
            .field("signer_configured", &self.signer.is_some())
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

impl DecisionService {
    /// Creates a service with `engine` registered for its current mode.
    #[must_use]
    pub fn new(engine: Arc<PolicyEngine>) -> Self {
        let mode = engine.mode();
        Self {
            engines: HashMap::from([(mode, engine)]),
            tokens: Arc::new(CapabilityTokenStore::new()),
            ledger: None,
            signer: None,
            token_ttl: Duration::minutes(DEFAULT_TTL_MINUTES),
        }
    }

    /// Registers an engine for requests in `mode`, replacing any previous one.
    pub fn set_engine(&mut self, mode: PolicyMode, engine: Arc<PolicyEngine>) {
        self.engines.insert(mode, engine);
    }

    /// Registers an engine, returning the updated service for chaining.
    #[must_use]
    pub fn with_engine(mut self, mode: PolicyMode, engine: Arc<PolicyEngine>) -> Self {
        self.set_engine(mode, engine);
        self
    }

    /// Attaches the ledger that records every decision.
    pub fn set_ledger(&mut self, ledger: Arc<dyn LedgerAppender>) {
        self.ledger = Some(ledger);
    }

    /// Attaches a ledger, returning the updated service for chaining.
    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<dyn LedgerAppender>) -> Self {
        self.set_ledger(ledger);
        self
    }

    /// Attaches the signer for decision digests and tokens.
    pub fn set_signer(&mut self, signer: Arc<dyn DecisionSigner>) {
        self.signer = Some(signer);
    }

    /// Attaches a signer, returning the updated service for chaining.
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn DecisionSigner>) -> Self {
        self.set_signer(signer);
        self
    }

    /// Sets the lifetime of issued tokens.
    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Shares an existing token store.
    #[must_use]
    pub fn with_token_store(mut self, tokens: Arc<CapabilityTokenStore>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Engine that evaluates requests in `mode`, if any.
    #[must_use]
    pub fn engine(&self, mode: PolicyMode) -> Option<&Arc<PolicyEngine>> {
        self.engines.get(&mode).or_else(|| match mode {
            PolicyMode::Paranoid => self.engines.get(&PolicyMode::Strict),
            PolicyMode::Strict | PolicyMode::Permissive => None,
        })
    }

    /// Store holding issued tokens.
    #[must_use]
    pub fn token_store(&self) -> &Arc<CapabilityTokenStore> {
        &self.tokens
    }

    /// Lifetime of issued tokens.
    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Evaluates a request and produces the response.
    ///
    /// On permit the token is stored only after the ledger has accepted the
    /// decision, so a token that was never audited is never usable.
    ///
    /// # Errors
    ///
    /// - [`GovernanceError::InvalidRequest`] when the request fails validation.
    /// - [`GovernanceError::EngineUnavailable`] when no engine serves the mode.
    /// - [`GovernanceError::ModeMismatch`] when the engine no longer evaluates
    ///   in the requested mode.
    /// - [`GovernanceError::Ledger`] when the ledger rejects the entry.
    /// - [`GovernanceError::Stage`] if the flow is driven out of order.
    pub async fn decide(&self, request: &DecisionRequest) -> GovernanceResult<DecisionResponse> {
        request.validate()?;
        let request_id = RequestId::random();
        let mut flow = DecisionFlow::new(request_id);

        let mode = request.policy_mode();
        let engine = self
            .engine(mode)
            .ok_or(GovernanceError::EngineUnavailable(mode))?;
        let evaluation = engine.evaluate_query(&request.to_query());
        if !serves_mode(mode, evaluation.mode()) {
            warn!(
                %request_id,
                requested = %mode,
                evaluated = %evaluation.mode(),
                "engine mode does not match the requested mode"
            );
            return Err(GovernanceError::ModeMismatch {
                requested: mode,
                evaluated: evaluation.mode(),
            });
        }
        let decision = if evaluation.is_permitted() {
            Decision::Permit
        } else {
            Decision::Deny
        };
        flow.transition(StageEvent::Evaluate {
            permitted: decision.is_permit(),
        })?;

        let mut response = DecisionResponse::new(
            request_id,
            decision,
            evaluation.reasoning().to_owned(),
            evaluation.policy_version_hash().to_owned(),
        );

        let mut token = if decision.is_permit() {
            let token = CapabilityToken::create_with_ttl(
                request.proposed_action(),
                request.tool(),
                evaluation.policy_version_hash(),
                self.token_ttl,
            );
            flow.transition(StageEvent::IssueToken)?;
            Some(token)
        } else {
            None
        };

        if let Some(ledger) = &self.ledger {
            let data = decision_record(request_id, request, &response, token.as_ref());
            let entry = ledger
                .append_event(DECISION_EVENT, data)
                .await
                .inspect_err(|err| {
                    warn!(%request_id, error = %err, "decision could not be recorded");
                })?;
            debug!(%request_id, entry_hash = entry.entry_hash(), "decision recorded");
            response.set_ledger_entry_hash(entry.entry_hash().to_owned());
            flow.transition(StageEvent::RecordLedger)?;
        }

        if let Some(signer) = &self.signer {
            if let Some(issued) = token.take() {
                let signature = hex::encode(signer.sign(&issued.signing_payload()));
                token = Some(issued.with_signature(signature));
            }
            if let Some(issued) = &token {
                response.set_capability_token(issued.clone());
            }
            let signature = hex::encode(signer.sign(response.signing_digest().as_bytes()));
            response.set_signature(signature);
            flow.transition(StageEvent::Sign)?;
        } else if let Some(issued) = &token {
            response.set_capability_token(issued.clone());
        }

        if let Some(issued) = token {
            self.tokens.store(issued);
        }
        flow.transition(StageEvent::Respond)?;

        info!(
            %request_id,
            actor = request.actor(),
            action = request.proposed_action(),
            tool = request.tool(),
            decision = %decision,
            policy_mode = %mode,
            risk_level = %request.risk_level(),
            "decision issued"
        );
        Ok(response)
    }

    /// Checks a presented token against the store.
    #[must_use]
    pub fn verify_token(&self, token_id: &TokenId, action: &str, tool: &str) -> bool {
        self.tokens.verify(token_id, action, tool)
    }

    /// Sweeps expired tokens, returning how many were removed.
    pub fn cleanup_expired_tokens(&self) -> usize {
        self.tokens.cleanup_expired()
    }
}

/// Paranoid requests may be answered by a strict engine; otherwise the
/// evaluated mode must be the requested one.
fn serves_mode(requested: PolicyMode, evaluated: PolicyMode) -> bool {
    requested == evaluated || (requested == PolicyMode::Paranoid && evaluated == PolicyMode::Strict)
}

fn decision_record(
    request_id: RequestId,
    request: &DecisionRequest,
    response: &DecisionResponse,
    token: Option<&CapabilityToken>,
) -> Map<String, Value> {
    let record = json!({
        "request_id": request_id.to_string(),
        "actor": request.actor(),
        "action": request.proposed_action(),
        "tool": request.tool(),
        "decision": response.decision().as_str(),
        "reasoning": response.reasoning(),
        "policy_version_hash": response.policy_version_hash(),
        "risk_level": request.risk_level().get(),
        "policy_mode": request.policy_mode().as_str(),
        "data_classes": request.data_classes(),
        "token_id": token.map(|token| token.token_id().as_str()),
    });
    match record {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
