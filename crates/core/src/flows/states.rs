use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::AuditEntry;
use crate::domain::actor::ActorId;
use crate::domain::approval::{ApprovalRequestId, Decision, RequestState};

/// An edge family in the lattice, and the audit level recorded for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Checkpoint {
    Submit,
    Level1,
    Level2,
}

impl Checkpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Level1 => "level1",
            Self::Level2 => "level2",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "submit" => Some(Self::Submit),
            "level1" => Some(Self::Level1),
            "level2" => Some(Self::Level2),
            _ => None,
        }
    }

    /// The only state this checkpoint may be exercised from.
    pub fn source_state(&self) -> RequestState {
        match self {
            Self::Submit => RequestState::Draft,
            Self::Level1 => RequestState::Pending,
            Self::Level2 => RequestState::ApprovedLv1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalAction {
    Submit,
    ApproveLv1(Decision),
    ApproveLv2(Decision),
}

impl ApprovalAction {
    pub fn checkpoint(&self) -> Checkpoint {
        match self {
            Self::Submit => Checkpoint::Submit,
            Self::ApproveLv1(_) => Checkpoint::Level1,
            Self::ApproveLv2(_) => Checkpoint::Level2,
        }
    }

    pub fn decision(&self) -> Option<Decision> {
        match self {
            Self::Submit => None,
            Self::ApproveLv1(decision) | Self::ApproveLv2(decision) => Some(*decision),
        }
    }
}

/// Who is acting on which request, and when. The timestamp is supplied by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionContext {
    pub request_id: ApprovalRequestId,
    pub actor_id: ActorId,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: RequestState,
    pub to: RequestState,
    pub entry: AuditEntry,
}
