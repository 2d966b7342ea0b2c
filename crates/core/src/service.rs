use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::audit::{AuditEntry, AuditTrail};
use crate::capabilities::{CapabilityResolver, CapabilitySet};
use crate::domain::actor::ActorContext;
use crate::domain::approval::{
    ApprovalRequest, ApprovalRequestId, ApprovalRequestPatch, CheckpointDecision, Decision,
    NewApprovalRequest, ProjectId,
};
use crate::errors::{ApprovalError, Operation};
use crate::flows::{ApprovalAction, Checkpoint, TransitionContext, TransitionEngine};
use crate::listing::{ListFilter, ListQuery, ListingLimits, Page, PageRequest};
use crate::store::RequestStore;

/// A request as seen by one actor: the record plus what that actor may do next.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    pub request: ApprovalRequest,
    pub capabilities: CapabilitySet,
    pub available_actions: Vec<Checkpoint>,
}

/// Runs the lattice against durable state. Every write is a version compare-and-swap.
pub struct ApprovalService<S, R> {
    store: Arc<S>,
    resolver: Arc<R>,
    engine: TransitionEngine,
    limits: ListingLimits,
}

impl<S, R> Clone for ApprovalService<S, R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            resolver: Arc::clone(&self.resolver),
            engine: self.engine,
            limits: self.limits,
        }
    }
}

impl<S, R> ApprovalService<S, R>
where
    S: RequestStore + AuditTrail + ListQuery,
    R: CapabilityResolver,
{
    pub fn new(store: Arc<S>, resolver: Arc<R>) -> Self {
        Self { store, resolver, engine: TransitionEngine, limits: ListingLimits::default() }
    }

    pub fn with_limits(mut self, limits: ListingLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn create(
        &self,
        actor: &ActorContext,
        project_id: ProjectId,
        draft: NewApprovalRequest,
    ) -> Result<ApprovalRequest, ApprovalError> {
        actor.authorize()?;
        if project_id.0.trim().is_empty() {
            return Err(ApprovalError::Unauthorized("project scope is required".to_string()));
        }

        let request = ApprovalRequest::new_draft(
            ApprovalRequestId(Uuid::new_v4().to_string()),
            actor,
            project_id,
            draft,
            Utc::now(),
        )?;
        self.store.insert(request.clone()).await?;
        Ok(request)
    }

    pub async fn get(
        &self,
        actor: &ActorContext,
        id: &ApprovalRequestId,
    ) -> Result<RequestView, ApprovalError> {
        actor.authorize()?;
        let request = self.load(actor, id).await?;
        let capabilities = self.resolver.resolve(actor, &request).await?;
        let available_actions = self.engine.available_actions(&request.state, &capabilities);
        Ok(RequestView { request, capabilities, available_actions })
    }

    pub async fn update(
        &self,
        actor: &ActorContext,
        id: &ApprovalRequestId,
        patch: ApprovalRequestPatch,
    ) -> Result<ApprovalRequest, ApprovalError> {
        actor.authorize()?;
        let current = self.load_editable(actor, id, Operation::Update).await?;

        let mut updated = current.clone();
        updated.apply_patch(patch, Utc::now())?;
        updated.version = current.version + 1;
        self.store.compare_and_swap(updated.clone(), current.version, None).await?;
        Ok(updated)
    }

    pub async fn delete(
        &self,
        actor: &ActorContext,
        id: &ApprovalRequestId,
    ) -> Result<(), ApprovalError> {
        actor.authorize()?;
        let current = self.load_editable(actor, id, Operation::Delete).await?;
        self.store.delete_draft(&actor.tenant_id, id, current.version).await?;
        Ok(())
    }

    pub async fn submit(
        &self,
        actor: &ActorContext,
        id: &ApprovalRequestId,
    ) -> Result<ApprovalRequest, ApprovalError> {
        self.transition(actor, id, ApprovalAction::Submit, None).await
    }

    pub async fn approve_lv1(
        &self,
        actor: &ActorContext,
        id: &ApprovalRequestId,
        decision: Decision,
        note: &str,
    ) -> Result<ApprovalRequest, ApprovalError> {
        self.transition(actor, id, ApprovalAction::ApproveLv1(decision), Some(note)).await
    }

    pub async fn approve_lv2(
        &self,
        actor: &ActorContext,
        id: &ApprovalRequestId,
        decision: Decision,
        note: &str,
    ) -> Result<ApprovalRequest, ApprovalError> {
        self.transition(actor, id, ApprovalAction::ApproveLv2(decision), Some(note)).await
    }

    pub async fn list(
        &self,
        actor: &ActorContext,
        filter: &ListFilter,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Page<ApprovalRequest>, ApprovalError> {
        actor.authorize()?;
        let window = PageRequest::resolve(page, page_size, self.limits)?;
        Ok(self.store.find_page(&actor.tenant_id, filter, window).await?)
    }

    pub async fn audit_trail(
        &self,
        actor: &ActorContext,
        id: &ApprovalRequestId,
    ) -> Result<Vec<AuditEntry>, ApprovalError> {
        actor.authorize()?;
        let request = self.load(actor, id).await?;
        Ok(self.store.entries_for(&request.id).await?)
    }

    async fn load(
        &self,
        actor: &ActorContext,
        id: &ApprovalRequestId,
    ) -> Result<ApprovalRequest, ApprovalError> {
        self.store
            .find(&actor.tenant_id, id)
            .await?
            .ok_or_else(|| ApprovalError::NotFound(id.clone()))
    }

    async fn load_editable(
        &self,
        actor: &ActorContext,
        id: &ApprovalRequestId,
        operation: Operation,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let current = self.load(actor, id).await?;
        if !current.is_editable() {
            return Err(ApprovalError::IllegalState { state: current.state, operation });
        }
        let capabilities = self.resolver.resolve(actor, &current).await?;
        if !capabilities.can_submit {
            return Err(ApprovalError::Forbidden { operation });
        }
        Ok(current)
    }

    async fn transition(
        &self,
        actor: &ActorContext,
        id: &ApprovalRequestId,
        action: ApprovalAction,
        note: Option<&str>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        actor.authorize()?;
        let current = self.load(actor, id).await?;
        let capabilities = self.resolver.resolve(actor, &current).await?;

        let now = Utc::now();
        let outcome = self.engine.decide(
            &current.state,
            &action,
            &capabilities,
            note,
            TransitionContext {
                request_id: current.id.clone(),
                actor_id: actor.actor_id.clone(),
                at: now,
            },
        )?;

        let mut updated = current.clone();
        updated.state = outcome.to;
        updated.version = current.version + 1;
        updated.updated_at = now;
        if let Some(decision) = action.decision() {
            let record = CheckpointDecision {
                approver_id: actor.actor_id.clone(),
                decision,
                note: outcome.entry.note.clone().unwrap_or_default(),
                decided_at: now,
            };
            match action.checkpoint() {
                Checkpoint::Level1 => updated.level1_decision = Some(record),
                Checkpoint::Level2 => updated.level2_decision = Some(record),
                Checkpoint::Submit => {}
            }
        }

        self.store.compare_and_swap(updated.clone(), current.version, Some(outcome.entry)).await?;
        Ok(updated)
    }
}
