//! Per-request decision flow state machine.

use agent_primitives::RequestId;
use thiserror::Error;
use tracing::debug;

/// Stages a single decision passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionStage {
    /// Request accepted and validated.
    Received,
    /// Policy engine produced an evaluation.
    Evaluated,
    /// Capability token created for a permitted request.
    TokenIssued,
    /// Decision appended to the ledger.
    LedgerRecorded,
    /// Decision digest signed.
    Signed,
    /// Response handed back to the caller.
    Responded,
}

impl DecisionStage {
    /// Returns `true` once the response has been produced.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Responded)
    }
}

/// Events that move a decision between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent {
    /// Evaluation finished with the given outcome.
    Evaluate {
        /// Whether the engine permitted the request.
        permitted: bool,
    },
    /// A capability token was created.
    IssueToken,
    /// The ledger accepted the decision entry.
    RecordLedger,
    /// The decision was signed.
    Sign,
    /// The response was assembled.
    Respond,
}

/// Tracks one request through the decision flow.
///
/// The flow is linear with no back-edges. A permitted decision must issue a
/// token before anything is recorded or returned; a denied one never may.
#[derive(Debug, Clone, Copy)]
pub struct DecisionFlow {
    request_id: RequestId,
    stage: DecisionStage,
    permitted: bool,
}

impl DecisionFlow {
    /// Starts a flow in [`DecisionStage::Received`].
    #[must_use]
    pub const fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            stage: DecisionStage::Received,
            permitted: false,
        }
    }

    /// Request the flow belongs to.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> DecisionStage {
        self.stage
    }

    /// Applies an event, returning the resulting stage.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::InvalidTransition`] when the event is not allowed
    /// from the current stage.
    pub fn transition(&mut self, event: StageEvent) -> StageResult<DecisionStage> {
        use DecisionStage as S;

        let next = match (self.stage, event) {
            (S::Received, StageEvent::Evaluate { permitted }) => {
                self.permitted = permitted;
                Some(S::Evaluated)
            }
            (S::Evaluated, StageEvent::IssueToken) if self.permitted => Some(S::TokenIssued),
            (S::Evaluated, StageEvent::RecordLedger) if !self.permitted => Some(S::LedgerRecorded),
            (S::TokenIssued, StageEvent::RecordLedger) => Some(S::LedgerRecorded),
            (S::Evaluated, StageEvent::Sign) if !self.permitted => Some(S::Signed),
            (S::TokenIssued | S::LedgerRecorded, StageEvent::Sign) => Some(S::Signed),
            (S::Evaluated, StageEvent::Respond) if !self.permitted => Some(S::Responded),
            (S::TokenIssued | S::LedgerRecorded | S::Signed, StageEvent::Respond) => {
                Some(S::Responded)
            }
            _ => None,
        };

        let Some(next_stage) = next else {
            return Err(StageError::InvalidTransition {
                request_id: self.request_id,
                from: self.stage,
                event,
            });
        };

        debug!(
            request_id = %self.request_id,
            from = ?self.stage,
            to = ?next_stage,
            ?event,
            "decision stage transition"
        );
        self.stage = next_stage;
        Ok(next_stage)
    }
}

/// Errors emitted by the decision flow.
#[derive(Debug, Error)]
pub enum StageError {
    /// Event was not permitted from the current stage.
    #[error("invalid decision transition from {from:?} via {event:?} for request {request_id}")]
    InvalidTransition {
        /// Request whose transition failed.
        request_id: RequestId,
        /// Stage prior to the attempted transition.
        from: DecisionStage,
        /// Event that triggered the failure.
        event: StageEvent,
    },
}

/// Result alias used for stage transitions.
pub type StageResult<T> = Result<T, StageError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn flow() -> DecisionFlow {
        DecisionFlow::new(RequestId::random())
    }

    #[test]
    fn permit_path_with_all_collaborators() {
        let mut flow = flow();
        flow.transition(StageEvent::Evaluate { permitted: true }).unwrap();
        flow.transition(StageEvent::IssueToken).unwrap();
        flow.transition(StageEvent::RecordLedger).unwrap();
        flow.transition(StageEvent::Sign).unwrap();
        flow.transition(StageEvent::Respond).unwrap();
        assert!(flow.stage().is_terminal());
    }

    #[test]
    fn deny_path_skips_token() {
        let mut flow = flow();
        flow.transition(StageEvent::Evaluate { permitted: false }).unwrap();
        assert!(flow.transition(StageEvent::IssueToken).is_err());
        flow.transition(StageEvent::RecordLedger).unwrap();
        assert_eq!(flow.transition(StageEvent::Respond).unwrap(), DecisionStage::Responded);
    }

    #[test]
    fn deny_without_collaborators_responds_directly() {
        let mut flow = flow();
        flow.transition(StageEvent::Evaluate { permitted: false }).unwrap();
        flow.transition(StageEvent::Respond).unwrap();
        assert!(flow.stage().is_terminal());
    }

    #[test]
    fn permit_cannot_respond_without_token() {
        let mut flow = flow();
        flow.transition(StageEvent::Evaluate { permitted: true }).unwrap();
        let err = flow.transition(StageEvent::Respond).unwrap_err();
        assert!(matches!(
            err,
            StageError::InvalidTransition {
                from: DecisionStage::Evaluated,
                event: StageEvent::Respond,
                ..
            }
        ));
        assert!(flow.transition(StageEvent::RecordLedger).is_err());
    }

    #[test]
    fn no_back_edges() {
        let mut flow = flow();
        flow.transition(StageEvent::Evaluate { permitted: true }).unwrap();
        flow.transition(StageEvent::IssueToken).unwrap();
        flow.transition(StageEvent::Respond).unwrap();
        assert!(flow.transition(StageEvent::Sign).is_err());
        assert!(
            flow.transition(StageEvent::Evaluate { permitted: false })
                .is_err()
        );
    }
}
