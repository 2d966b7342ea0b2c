//! Capability resolution: which lattice edges an actor may exercise on a request.
//!
//! Capabilities are derived from role grants and authorship only. Whether an edge is
//! legal from the request's current state is decided by the transition engine.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::actor::ActorContext;
use crate::domain::approval::ApprovalRequest;
use crate::errors::ApprovalError;
use crate::flows::states::Checkpoint;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySet {
    pub can_submit: bool,
    pub can_approve_lv1: bool,
    pub can_approve_lv2: bool,
}

impl CapabilitySet {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self { can_submit: true, can_approve_lv1: true, can_approve_lv2: true }
    }

    pub fn allows(&self, checkpoint: Checkpoint) -> bool {
        match checkpoint {
            Checkpoint::Submit => self.can_submit,
            Checkpoint::Level1 => self.can_approve_lv1,
            Checkpoint::Level2 => self.can_approve_lv2,
        }
    }
}

#[async_trait]
pub trait CapabilityResolver: Send + Sync {
    async fn resolve(
        &self,
        actor: &ActorContext,
        request: &ApprovalRequest,
    ) -> Result<CapabilitySet, ApprovalError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproverRole {
    Requester,
    Level1Approver,
    Level2Approver,
}

impl ApproverRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requester => "requester",
            Self::Level1Approver => "level1_approver",
            Self::Level2Approver => "level2_approver",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match normalize_key(value).as_str() {
            "requester" => Some(Self::Requester),
            "level1_approver" | "lv1_approver" => Some(Self::Level1Approver),
            "level2_approver" | "lv2_approver" => Some(Self::Level2Approver),
            _ => None,
        }
    }
}

/// A role assignment as written in configuration. `project_id = None` grants tenant-wide.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityGrant {
    pub actor_id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    pub roles: Vec<String>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown role `{role}` in grant for actor `{actor_id}`")]
pub struct UnknownRoleError {
    pub actor_id: String,
    pub role: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ResolvedGrant {
    actor_id: String,
    tenant_id: String,
    project_id: Option<String>,
    roles: BTreeSet<ApproverRole>,
}

impl ResolvedGrant {
    fn applies_to(&self, actor: &ActorContext, request: &ApprovalRequest) -> bool {
        self.actor_id == actor.actor_id.0
            && self.tenant_id == request.tenant_id.0
            && self
                .project_id
                .as_deref()
                .map(|project| project == request.project_id.0)
                .unwrap_or(true)
    }
}

/// Role-table resolver. The author of a request may always submit it.
#[derive(Clone, Debug, Default)]
pub struct RoleCapabilityResolver {
    grants: Vec<ResolvedGrant>,
}

impl RoleCapabilityResolver {
    pub fn new(grants: Vec<CapabilityGrant>) -> Result<Self, UnknownRoleError> {
        let grants = grants
            .into_iter()
            .map(|grant| {
                let roles = grant
                    .roles
                    .iter()
                    .map(|role| {
                        ApproverRole::parse(role).ok_or_else(|| UnknownRoleError {
                            actor_id: grant.actor_id.clone(),
                            role: role.clone(),
                        })
                    })
                    .collect::<Result<BTreeSet<_>, _>>()?;
                Ok(ResolvedGrant {
                    actor_id: grant.actor_id,
                    tenant_id: grant.tenant_id,
                    project_id: grant.project_id.filter(|project| !project.trim().is_empty()),
                    roles,
                })
            })
            .collect::<Result<Vec<_>, UnknownRoleError>>()?;

        Ok(Self { grants })
    }

    pub fn capabilities_for(
        &self,
        actor: &ActorContext,
        request: &ApprovalRequest,
    ) -> CapabilitySet {
        let roles: BTreeSet<ApproverRole> = self
            .grants
            .iter()
            .filter(|grant| grant.applies_to(actor, request))
            .flat_map(|grant| grant.roles.iter().copied())
            .collect();

        let is_author =
            request.requested_by == actor.actor_id && request.tenant_id == actor.tenant_id;

        CapabilitySet {
            can_submit: is_author || roles.contains(&ApproverRole::Requester),
            can_approve_lv1: roles.contains(&ApproverRole::Level1Approver),
            can_approve_lv2: roles.contains(&ApproverRole::Level2Approver),
        }
    }
}

#[async_trait]
impl CapabilityResolver for RoleCapabilityResolver {
    async fn resolve(
        &self,
        actor: &ActorContext,
        request: &ApprovalRequest,
    ) -> Result<CapabilitySet, ApprovalError> {
        Ok(self.capabilities_for(actor, request))
    }
}

/// Grants the same capabilities to everyone.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticCapabilityResolver(pub CapabilitySet);

#[async_trait]
impl CapabilityResolver for StaticCapabilityResolver {
    async fn resolve(
        &self,
        _actor: &ActorContext,
        _request: &ApprovalRequest,
    ) -> Result<CapabilitySet, ApprovalError> {
        Ok(self.0)
    }
}

fn normalize_key(value: &str) -> String {
    value.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{
        ApproverRole, CapabilityGrant, CapabilitySet, RoleCapabilityResolver, UnknownRoleError,
    };
    use crate::domain::actor::ActorContext;
    use crate::domain::approval::{
        ApprovalRequest, ApprovalRequestId, NewApprovalRequest, ProjectId, ReferenceId,
        ReferenceType,
    };
    use crate::flows::states::Checkpoint;

    fn request(project: &str) -> ApprovalRequest {
        ApprovalRequest::new_draft(
            ApprovalRequestId("REQ-1".to_string()),
            &ActorContext::new("u-author", "t-1"),
            ProjectId(project.to_string()),
            NewApprovalRequest {
                name: "Stage lighting".to_string(),
                amount: Decimal::new(5_000_000, 0),
                purpose: None,
                reference_type: ReferenceType::Quote,
                reference_id: ReferenceId(42),
                supplier_id: None,
            },
            Utc::now(),
        )
        .expect("valid draft")
    }

    fn grant(actor: &str, project: Option<&str>, roles: &[&str]) -> CapabilityGrant {
        CapabilityGrant {
            actor_id: actor.to_string(),
            tenant_id: "t-1".to_string(),
            project_id: project.map(str::to_string),
            roles: roles.iter().map(|role| role.to_string()).collect(),
        }
    }

    #[test]
    fn author_can_submit_without_any_grant() {
        let resolver = RoleCapabilityResolver::default();
        let caps =
            resolver.capabilities_for(&ActorContext::new("u-author", "t-1"), &request("P-1"));

        assert_eq!(caps, CapabilitySet { can_submit: true, ..CapabilitySet::none() });
    }

    #[test]
    fn project_grants_only_apply_to_their_project() {
        let resolver = RoleCapabilityResolver::new(vec![
            grant("u-pm", Some("P-1"), &["Level1-Approver"]),
            grant("u-cfo", None, &["level2_approver", "lv1 approver"]),
        ])
        .expect("valid grants");

        let pm = ActorContext::new("u-pm", "t-1");
        let cfo = ActorContext::new("u-cfo", "t-1");

        assert!(resolver.capabilities_for(&pm, &request("P-1")).allows(Checkpoint::Level1));
        assert!(!resolver.capabilities_for(&pm, &request("P-2")).allows(Checkpoint::Level1));

        let cfo_caps = resolver.capabilities_for(&cfo, &request("P-2"));
        assert!(cfo_caps.can_approve_lv1 && cfo_caps.can_approve_lv2);
        assert!(!cfo_caps.can_submit);
    }

    #[test]
    fn grants_from_another_tenant_do_not_apply() {
        let mut foreign = grant("u-pm", None, &["level1_approver"]);
        foreign.tenant_id = "t-2".to_string();
        let resolver = RoleCapabilityResolver::new(vec![foreign]).expect("valid grants");

        let caps = resolver.capabilities_for(&ActorContext::new("u-pm", "t-1"), &request("P-1"));
        assert_eq!(caps, CapabilitySet::none());
    }

    #[test]
    fn unknown_roles_are_rejected() {
        let error = RoleCapabilityResolver::new(vec![grant("u-x", None, &["superuser"])])
            .expect_err("unknown role");
        assert_eq!(
            error,
            UnknownRoleError { actor_id: "u-x".to_string(), role: "superuser".to_string() }
        );
    }

    #[test]
    fn role_keys_round_trip() {
        for role in
            [ApproverRole::Requester, ApproverRole::Level1Approver, ApproverRole::Level2Approver]
        {
            assert_eq!(ApproverRole::parse(role.as_str()), Some(role));
        }
    }
}
