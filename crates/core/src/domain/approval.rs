use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::actor::{ActorContext, ActorId, TenantId};
use crate::errors::ApprovalError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApprovalRequestId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub String);

/// Identifier of the quote or task the request pays for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SupplierId(pub i64);

impl fmt::Display for ApprovalRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    Quote,
    Task,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Task => "task",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "quote" => Some(Self::Quote),
            "task" => Some(Self::Task),
            _ => None,
        }
    }
}

/// Position of a request in the two-level approval lattice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    Draft,
    Pending,
    ApprovedLv1,
    RejectedLv1,
    ApprovedAll,
    RejectedLv2,
}

impl RequestState {
    pub const ALL: [RequestState; 6] = [
        Self::Draft,
        Self::Pending,
        Self::ApprovedLv1,
        Self::RejectedLv1,
        Self::ApprovedAll,
        Self::RejectedLv2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::ApprovedLv1 => "approved_lv1",
            Self::RejectedLv1 => "rejected_lv1",
            Self::ApprovedAll => "approved_all",
            Self::RejectedLv2 => "rejected_lv2",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "approved_lv1" => Some(Self::ApprovedLv1),
            "rejected_lv1" => Some(Self::RejectedLv1),
            "approved_all" => Some(Self::ApprovedAll),
            "rejected_lv2" => Some(Self::RejectedLv2),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ApprovedAll | Self::RejectedLv1 | Self::RejectedLv2)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// Written once when a checkpoint is exercised; never modified afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointDecision {
    pub approver_id: ActorId,
    pub decision: Decision,
    pub note: String,
    pub decided_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: ApprovalRequestId,
    pub tenant_id: TenantId,
    pub project_id: ProjectId,
    pub reference_type: ReferenceType,
    pub reference_id: ReferenceId,
    pub supplier_id: Option<SupplierId>,
    pub name: String,
    pub amount: Decimal,
    pub purpose: Option<String>,
    pub state: RequestState,
    pub requested_by: ActorId,
    pub level1_decision: Option<CheckpointDecision>,
    pub level2_decision: Option<CheckpointDecision>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields for a new draft.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApprovalRequest {
    pub name: String,
    pub amount: Decimal,
    #[serde(default)]
    pub purpose: Option<String>,
    pub reference_type: ReferenceType,
    pub reference_id: ReferenceId,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
}

/// Partial edit of a draft. An empty `purpose` clears it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequestPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub reference_id: Option<ReferenceId>,
}

impl ApprovalRequest {
    pub fn new_draft(
        id: ApprovalRequestId,
        actor: &ActorContext,
        project_id: ProjectId,
        draft: NewApprovalRequest,
        now: DateTime<Utc>,
    ) -> Result<Self, ApprovalError> {
        let request = Self {
            id,
            tenant_id: actor.tenant_id.clone(),
            project_id,
            reference_type: draft.reference_type,
            reference_id: draft.reference_id,
            supplier_id: draft.supplier_id,
            name: draft.name.trim().to_string(),
            amount: draft.amount,
            purpose: normalize_purpose(draft.purpose),
            state: RequestState::Draft,
            requested_by: actor.actor_id.clone(),
            level1_decision: None,
            level2_decision: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), ApprovalError> {
        if self.name.trim().is_empty() {
            return Err(ApprovalError::Validation {
                field: "name",
                message: "name must not be empty".to_string(),
            });
        }
        if self.amount <= Decimal::ZERO {
            return Err(ApprovalError::Validation {
                field: "amount",
                message: format!("amount must be positive, got {}", self.amount),
            });
        }
        Ok(())
    }

    /// Applies a patch all-or-nothing: on a validation failure the record is unchanged.
    /// State gating is the caller's concern.
    pub fn apply_patch(
        &mut self,
        patch: ApprovalRequestPatch,
        now: DateTime<Utc>,
    ) -> Result<(), ApprovalError> {
        let mut next = self.clone();
        if let Some(name) = patch.name {
            next.name = name.trim().to_string();
        }
        if let Some(amount) = patch.amount {
            next.amount = amount;
        }
        if let Some(purpose) = patch.purpose {
            next.purpose = normalize_purpose(Some(purpose));
        }
        if let Some(reference_id) = patch.reference_id {
            next.reference_id = reference_id;
        }
        next.validate()?;
        next.updated_at = now;
        *self = next;
        Ok(())
    }

    pub fn is_editable(&self) -> bool {
        self.state == RequestState::Draft
    }
}

fn normalize_purpose(purpose: Option<String>) -> Option<String> {
    purpose.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}
