use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::audit::{AuditEntry, AuditLog, AuditTrail};
use crate::domain::actor::TenantId;
use crate::domain::approval::{ApprovalRequest, ApprovalRequestId, RequestState};
use crate::listing::{listing_order, ListFilter, ListQuery, Page, PageRequest};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("version conflict on {id}: expected version {expected_version}")]
    Conflict { id: ApprovalRequestId, expected_version: u32 },
    #[error("approval request {0} not found")]
    NotFound(ApprovalRequestId),
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Durable home of approval requests. Every lookup and write is tenant scoped.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert(&self, request: ApprovalRequest) -> Result<(), StoreError>;

    async fn find(
        &self,
        tenant_id: &TenantId,
        id: &ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, StoreError>;

    /// Replaces the stored request only if its version still equals `expected_version`,
    /// appending `entry` in the same atomic unit. A lost race yields `Conflict`.
    async fn compare_and_swap(
        &self,
        updated: ApprovalRequest,
        expected_version: u32,
        entry: Option<AuditEntry>,
    ) -> Result<(), StoreError>;

    /// Removes a request that is still a draft at `expected_version`.
    async fn delete_draft(
        &self,
        tenant_id: &TenantId,
        id: &ApprovalRequestId,
        expected_version: u32,
    ) -> Result<(), StoreError>;
}

#[derive(Default)]
struct MemoryState {
    requests: HashMap<ApprovalRequestId, ApprovalRequest>,
    audit: AuditLog,
}

/// Process-local store. One lock covers requests and audit so a swap and its entry
/// become visible together.
#[derive(Default)]
pub struct InMemoryRequestStore {
    state: RwLock<MemoryState>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn owned_by<'a>(
    requests: &'a HashMap<ApprovalRequestId, ApprovalRequest>,
    tenant_id: &TenantId,
    id: &ApprovalRequestId,
) -> Option<&'a ApprovalRequest> {
    requests.get(id).filter(|request| &request.tenant_id == tenant_id)
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn insert(&self, request: ApprovalRequest) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.requests.contains_key(&request.id) {
            return Err(StoreError::Storage(format!("duplicate request id {}", request.id)));
        }
        state.requests.insert(request.id.clone(), request);
        Ok(())
    }

    async fn find(
        &self,
        tenant_id: &TenantId,
        id: &ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        let state = self.state.read().await;
        Ok(owned_by(&state.requests, tenant_id, id).cloned())
    }

    async fn compare_and_swap(
        &self,
        updated: ApprovalRequest,
        expected_version: u32,
        entry: Option<AuditEntry>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let current = owned_by(&state.requests, &updated.tenant_id, &updated.id)
            .ok_or_else(|| StoreError::NotFound(updated.id.clone()))?;
        if current.version != expected_version {
            return Err(StoreError::Conflict { id: updated.id, expected_version });
        }

        if let Some(entry) = entry {
            state.audit.append(entry);
        }
        state.requests.insert(updated.id.clone(), updated);
        Ok(())
    }

    async fn delete_draft(
        &self,
        tenant_id: &TenantId,
        id: &ApprovalRequestId,
        expected_version: u32,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let current = owned_by(&state.requests, tenant_id, id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if current.version != expected_version || current.state != RequestState::Draft {
            return Err(StoreError::Conflict { id: id.clone(), expected_version });
        }
        state.requests.remove(id);
        Ok(())
    }
}

#[async_trait]
impl AuditTrail for InMemoryRequestStore {
    async fn append(&self, entry: AuditEntry) -> Result<(), StoreError> {
        self.state.write().await.audit.append(entry);
        Ok(())
    }

    async fn entries_for(
        &self,
        request_id: &ApprovalRequestId,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        Ok(self.state.read().await.audit.entries_for(request_id))
    }
}

#[async_trait]
impl ListQuery for InMemoryRequestStore {
    async fn find_page(
        &self,
        tenant_id: &TenantId,
        filter: &ListFilter,
        window: PageRequest,
    ) -> Result<Page<ApprovalRequest>, StoreError> {
        let state = self.state.read().await;
        let mut matching: Vec<ApprovalRequest> = state
            .requests
            .values()
            .filter(|request| &request.tenant_id == tenant_id && filter.matches(request))
            .cloned()
            .collect();
        drop(state);

        matching.sort_by(listing_order);
        Ok(Page::from_ordered(matching, window))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{InMemoryRequestStore, RequestStore, StoreError};
    use crate::audit::{AuditDecision, AuditEntry, AuditTrail};
    use crate::domain::actor::{ActorContext, TenantId};
    use crate::domain::approval::{
        ApprovalRequest, ApprovalRequestId, NewApprovalRequest, ProjectId, ReferenceId,
        ReferenceType, RequestState,
    };
    use crate::flows::states::Checkpoint;
    use crate::listing::{ListFilter, ListQuery, PageRequest};

    fn draft(id: &str, tenant: &str, minutes: i64) -> ApprovalRequest {
        let created = Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).single().expect("valid timestamp")
            + Duration::minutes(minutes);
        ApprovalRequest::new_draft(
            ApprovalRequestId(id.to_owned()),
            &ActorContext::new("u-author", tenant),
            ProjectId("P-1".to_owned()),
            NewApprovalRequest {
                name: format!("Request {id}"),
                amount: Decimal::new(1_000, 0),
                purpose: None,
                reference_type: ReferenceType::Quote,
                reference_id: ReferenceId(1),
                supplier_id: None,
            },
            created,
        )
        .expect("valid draft")
    }

    fn submitted_entry(request: &ApprovalRequest) -> AuditEntry {
        AuditEntry {
            request_id: request.id.clone(),
            level: Checkpoint::Submit,
            actor_id: request.requested_by.clone(),
            decision: AuditDecision::Submitted,
            note: None,
            timestamp: request.updated_at,
        }
    }

    #[tokio::test]
    async fn find_is_tenant_scoped() {
        let store = InMemoryRequestStore::new();
        let request = draft("REQ-1", "t-1", 0);
        store.insert(request.clone()).await.expect("insert");

        let own = store.find(&TenantId("t-1".to_owned()), &request.id).await.expect("find");
        let foreign = store.find(&TenantId("t-2".to_owned()), &request.id).await.expect("find");

        assert_eq!(own, Some(request));
        assert_eq!(foreign, None);
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict_and_writes_nothing() {
        let store = InMemoryRequestStore::new();
        let original = draft("REQ-1", "t-1", 0);
        store.insert(original.clone()).await.expect("insert");

        let mut first = original.clone();
        first.state = RequestState::Pending;
        first.version = 2;
        store
            .compare_and_swap(first.clone(), 1, Some(submitted_entry(&first)))
            .await
            .expect("first swap wins");

        let mut second = original.clone();
        second.name = "lost update".to_owned();
        second.version = 2;
        let error = store
            .compare_and_swap(second.clone(), 1, Some(submitted_entry(&second)))
            .await
            .expect_err("stale version");

        assert_eq!(error, StoreError::Conflict { id: original.id.clone(), expected_version: 1 });
        let stored = store.find(&original.tenant_id, &original.id).await.expect("find");
        assert_eq!(stored, Some(first));
        assert_eq!(store.entries_for(&original.id).await.expect("entries").len(), 1);
    }

    #[tokio::test]
    async fn delete_requires_matching_draft_version() {
        let store = InMemoryRequestStore::new();
        let request = draft("REQ-1", "t-1", 0);
        store.insert(request.clone()).await.expect("insert");

        let stale = store.delete_draft(&request.tenant_id, &request.id, 7).await;
        assert!(matches!(stale, Err(StoreError::Conflict { .. })));

        let foreign = store.delete_draft(&TenantId("t-9".to_owned()), &request.id, 1).await;
        assert!(matches!(foreign, Err(StoreError::NotFound(_))));

        store.delete_draft(&request.tenant_id, &request.id, 1).await.expect("delete");
        assert_eq!(store.find(&request.tenant_id, &request.id).await.expect("find"), None);
    }

    #[tokio::test]
    async fn listing_orders_newest_first_and_counts_before_paging() {
        let store = InMemoryRequestStore::new();
        for (id, minutes) in [("REQ-A", 0), ("REQ-B", 10), ("REQ-C", 10), ("REQ-D", 5)] {
            store.insert(draft(id, "t-1", minutes)).await.expect("insert");
        }
        store.insert(draft("REQ-X", "t-2", 99)).await.expect("insert");

        let page = store
            .find_page(
                &TenantId("t-1".to_owned()),
                &ListFilter::default(),
                PageRequest { page: 1, page_size: 3 },
            )
            .await
            .expect("list");

        let ids: Vec<_> = page.items.iter().map(|request| request.id.0.as_str()).collect();
        assert_eq!(ids, vec!["REQ-B", "REQ-C", "REQ-D"]);
        assert_eq!(page.total_count, 4);
    }
}
