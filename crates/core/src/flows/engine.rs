use thiserror::Error;

use crate::audit::{AuditDecision, AuditEntry};
use crate::capabilities::CapabilitySet;
use crate::domain::approval::{Decision, RequestState};
use crate::flows::states::{ApprovalAction, Checkpoint, TransitionContext, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {} a request in state {}", .checkpoint.as_str(), .state.as_str())]
    IllegalState { state: RequestState, checkpoint: Checkpoint },
    #[error("actor lacks the capability for {}", .checkpoint.as_str())]
    Forbidden { checkpoint: Checkpoint },
    #[error("a non-empty note is required for {}", .checkpoint.as_str())]
    MissingNote { checkpoint: Checkpoint },
}

/// Pure decision logic for the two-level lattice.
///
/// Checks run in a fixed order: source state, then note, then capability. Nothing here
/// reads a clock or touches storage; the timestamp arrives in the [`TransitionContext`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TransitionEngine;

impl TransitionEngine {
    pub fn decide(
        &self,
        current: &RequestState,
        action: &ApprovalAction,
        capabilities: &CapabilitySet,
        note: Option<&str>,
        context: TransitionContext,
    ) -> Result<TransitionOutcome, TransitionError> {
        let checkpoint = action.checkpoint();
        let to = target_state(current, action)
            .ok_or(TransitionError::IllegalState { state: *current, checkpoint })?;

        let note = note.map(str::trim).filter(|note| !note.is_empty());
        let (decision, note) = match action.decision() {
            None => (AuditDecision::Submitted, None),
            Some(decision) => {
                let note = note.ok_or(TransitionError::MissingNote { checkpoint })?;
                (AuditDecision::from(decision), Some(note.to_string()))
            }
        };

        if !capabilities.allows(checkpoint) {
            return Err(TransitionError::Forbidden { checkpoint });
        }

        Ok(TransitionOutcome {
            from: *current,
            to,
            entry: AuditEntry {
                request_id: context.request_id,
                level: checkpoint,
                actor_id: context.actor_id,
                decision,
                note,
                timestamp: context.at,
            },
        })
    }

    /// Checkpoints this actor could exercise right now, ignoring the note requirement.
    pub fn available_actions(
        &self,
        current: &RequestState,
        capabilities: &CapabilitySet,
    ) -> Vec<Checkpoint> {
        [Checkpoint::Submit, Checkpoint::Level1, Checkpoint::Level2]
            .into_iter()
            .filter(|checkpoint| checkpoint.source_state() == *current)
            .filter(|checkpoint| capabilities.allows(*checkpoint))
            .collect()
    }
}

fn target_state(current: &RequestState, action: &ApprovalAction) -> Option<RequestState> {
    use ApprovalAction::{ApproveLv1, ApproveLv2, Submit};
    use Decision::{Approve, Reject};
    use RequestState::{ApprovedAll, ApprovedLv1, Draft, Pending, RejectedLv1, RejectedLv2};

    match (current, action) {
        (Draft, Submit) => Some(Pending),
        (Pending, ApproveLv1(Approve)) => Some(ApprovedLv1),
        (Pending, ApproveLv1(Reject)) => Some(RejectedLv1),
        (ApprovedLv1, ApproveLv2(Approve)) => Some(ApprovedAll),
        (ApprovedLv1, ApproveLv2(Reject)) => Some(RejectedLv2),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::audit::AuditDecision;
    use crate::capabilities::CapabilitySet;
    use crate::domain::actor::ActorId;
    use crate::domain::approval::{ApprovalRequestId, Decision, RequestState};
    use crate::flows::engine::{TransitionEngine, TransitionError};
    use crate::flows::states::{ApprovalAction, Checkpoint, TransitionContext};

    fn context() -> TransitionContext {
        TransitionContext {
            request_id: ApprovalRequestId("REQ-7".to_owned()),
            actor_id: ActorId("u-approver".to_owned()),
            at: Utc.with_ymd_and_hms(2026, 4, 2, 10, 30, 0).single().expect("valid timestamp"),
        }
    }

    fn all_actions() -> Vec<ApprovalAction> {
        vec![
            ApprovalAction::Submit,
            ApprovalAction::ApproveLv1(Decision::Approve),
            ApprovalAction::ApproveLv1(Decision::Reject),
            ApprovalAction::ApproveLv2(Decision::Approve),
            ApprovalAction::ApproveLv2(Decision::Reject),
        ]
    }

    #[test]
    fn every_lattice_edge_is_accepted_with_full_capabilities() {
        let engine = TransitionEngine;
        let edges = [
            (RequestState::Draft, ApprovalAction::Submit, RequestState::Pending),
            (
                RequestState::Pending,
                ApprovalAction::ApproveLv1(Decision::Approve),
                RequestState::ApprovedLv1,
            ),
            (
                RequestState::Pending,
                ApprovalAction::ApproveLv1(Decision::Reject),
                RequestState::RejectedLv1,
            ),
            (
                RequestState::ApprovedLv1,
                ApprovalAction::ApproveLv2(Decision::Approve),
                RequestState::ApprovedAll,
            ),
            (
                RequestState::ApprovedLv1,
                ApprovalAction::ApproveLv2(Decision::Reject),
                RequestState::RejectedLv2,
            ),
        ];

        for (from, action, to) in edges {
            let outcome = engine
                .decide(&from, &action, &CapabilitySet::all(), Some("ok"), context())
                .expect("legal edge");
            assert_eq!(outcome.from, from);
            assert_eq!(outcome.to, to);
            assert_eq!(outcome.entry.level, action.checkpoint());
        }
    }

    #[test]
    fn terminal_states_reject_every_action() {
        let engine = TransitionEngine;
        for state in RequestState::ALL.into_iter().filter(RequestState::is_terminal) {
            for action in all_actions() {
                let error = engine
                    .decide(&state, &action, &CapabilitySet::all(), Some("note"), context())
                    .expect_err("terminal state has no outgoing edge");
                assert_eq!(
                    error,
                    TransitionError::IllegalState { state, checkpoint: action.checkpoint() }
                );
            }
        }
    }

    #[test]
    fn level_two_cannot_skip_level_one() {
        let error = TransitionEngine
            .decide(
                &RequestState::Pending,
                &ApprovalAction::ApproveLv2(Decision::Approve),
                &CapabilitySet::all(),
                Some("skip"),
                context(),
            )
            .expect_err("level 2 requires APPROVED_LV1");

        assert!(matches!(
            error,
            TransitionError::IllegalState { state: RequestState::Pending, checkpoint: Checkpoint::Level2 }
        ));
    }

    #[test]
    fn blank_note_is_rejected_regardless_of_capability() {
        let engine = TransitionEngine;
        for caps in [CapabilitySet::all(), CapabilitySet::none()] {
            for note in [None, Some(""), Some("   ")] {
                let error = engine
                    .decide(
                        &RequestState::Pending,
                        &ApprovalAction::ApproveLv1(Decision::Reject),
                        &caps,
                        note,
                        context(),
                    )
                    .expect_err("note is required");
                assert_eq!(error, TransitionError::MissingNote { checkpoint: Checkpoint::Level1 });
            }
        }
    }

    #[test]
    fn missing_capability_is_forbidden() {
        let caps = CapabilitySet { can_submit: true, can_approve_lv1: false, can_approve_lv2: true };
        let error = TransitionEngine
            .decide(
                &RequestState::Pending,
                &ApprovalAction::ApproveLv1(Decision::Approve),
                &caps,
                Some("fine"),
                context(),
            )
            .expect_err("needs lv1 capability");

        assert_eq!(error, TransitionError::Forbidden { checkpoint: Checkpoint::Level1 });

        let submit = TransitionEngine
            .decide(&RequestState::Draft, &ApprovalAction::Submit, &CapabilitySet::none(), None, context())
            .expect_err("needs submit capability");
        assert_eq!(submit, TransitionError::Forbidden { checkpoint: Checkpoint::Submit });
    }

    #[test]
    fn submit_needs_no_note_and_drops_any_given() {
        let outcome = TransitionEngine
            .decide(
                &RequestState::Draft,
                &ApprovalAction::Submit,
                &CapabilitySet::all(),
                Some("ignored"),
                context(),
            )
            .expect("submit");

        assert_eq!(outcome.entry.decision, AuditDecision::Submitted);
        assert_eq!(outcome.entry.note, None);
    }

    #[test]
    fn audit_entry_is_fully_populated_and_note_trimmed() {
        let outcome = TransitionEngine
            .decide(
                &RequestState::Pending,
                &ApprovalAction::ApproveLv1(Decision::Reject),
                &CapabilitySet::all(),
                Some("  Over budget  "),
                context(),
            )
            .expect("reject");

        let entry = outcome.entry;
        assert_eq!(entry.request_id.0, "REQ-7");
        assert_eq!(entry.actor_id.0, "u-approver");
        assert_eq!(entry.decision, AuditDecision::Rejected);
        assert_eq!(entry.note.as_deref(), Some("Over budget"));
        assert_eq!(entry.timestamp, context().at);
    }

    #[test]
    fn decide_is_deterministic() {
        let run = || {
            TransitionEngine.decide(
                &RequestState::ApprovedLv1,
                &ApprovalAction::ApproveLv2(Decision::Approve),
                &CapabilitySet::all(),
                Some("Final sign-off"),
                context(),
            )
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn available_actions_follow_state_and_capabilities() {
        let engine = TransitionEngine;
        let lv2_only =
            CapabilitySet { can_submit: false, can_approve_lv1: false, can_approve_lv2: true };

        assert!(engine.available_actions(&RequestState::Pending, &lv2_only).is_empty());
        assert_eq!(
            engine.available_actions(&RequestState::ApprovedLv1, &lv2_only),
            vec![Checkpoint::Level2]
        );
        assert_eq!(
            engine.available_actions(&RequestState::Draft, &CapabilitySet::all()),
            vec![Checkpoint::Submit]
        );
        assert!(engine.available_actions(&RequestState::ApprovedAll, &CapabilitySet::all()).is_empty());
    }
}
