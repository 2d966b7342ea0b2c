use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ApprovalError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the caller, passed explicitly into every service operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor_id: ActorId,
    pub tenant_id: TenantId,
}

impl ActorContext {
    pub fn new(actor_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self { actor_id: ActorId(actor_id.into()), tenant_id: TenantId(tenant_id.into()) }
    }

    /// Rejects contexts that lack an actor or tenant before any storage access happens.
    pub fn authorize(&self) -> Result<(), ApprovalError> {
        if self.actor_id.0.trim().is_empty() {
            return Err(ApprovalError::Unauthorized("actor identity is required".to_string()));
        }
        if self.tenant_id.0.trim().is_empty() {
            return Err(ApprovalError::Unauthorized("tenant scope is required".to_string()));
        }
        Ok(())
    }
}
