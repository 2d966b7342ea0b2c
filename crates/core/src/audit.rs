use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::actor::ActorId;
use crate::domain::approval::{ApprovalRequestId, Decision};
use crate::flows::states::Checkpoint;
use crate::store::StoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditDecision {
    Submitted,
    Approved,
    Rejected,
}

impl AuditDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "submitted" => Some(Self::Submitted),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl From<Decision> for AuditDecision {
    fn from(value: Decision) -> Self {
        match value {
            Decision::Approve => Self::Approved,
            Decision::Reject => Self::Rejected,
        }
    }
}

/// One decision made against a request. Never edited or removed once appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub request_id: ApprovalRequestId,
    pub level: Checkpoint,
    pub actor_id: ActorId,
    pub decision: AuditDecision,
    pub note: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait AuditTrail: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<(), StoreError>;

    /// Entries ordered by timestamp, ties in insertion order.
    async fn entries_for(
        &self,
        request_id: &ApprovalRequestId,
    ) -> Result<Vec<AuditEntry>, StoreError>;
}

/// Append-only per-request log kept in timestamp order.
///
/// Not synchronised on its own; owners wrap it in the same lock as the records it audits
/// so that a transition and its entry land together.
#[derive(Clone, Debug, Default)]
pub struct AuditLog {
    entries: HashMap<ApprovalRequestId, Vec<AuditEntry>>,
}

impl AuditLog {
    pub fn append(&mut self, entry: AuditEntry) {
        let chain = self.entries.entry(entry.request_id.clone()).or_default();
        // entries almost always arrive in order, so this is the last slot
        let position = chain.partition_point(|existing| existing.timestamp <= entry.timestamp);
        chain.insert(position, entry);
    }

    pub fn entries_for(&self, request_id: &ApprovalRequestId) -> Vec<AuditEntry> {
        self.entries.get(request_id).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }
}
