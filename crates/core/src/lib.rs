pub mod audit;
pub mod capabilities;
pub mod config;
pub mod domain;
pub mod envelope;
pub mod errors;
pub mod flows;
pub mod listing;
pub mod service;
pub mod store;

pub use audit::{AuditDecision, AuditEntry, AuditLog, AuditTrail};
pub use capabilities::{
    ApproverRole, CapabilityGrant, CapabilityResolver, CapabilitySet, RoleCapabilityResolver,
    StaticCapabilityResolver,
};
pub use domain::actor::{ActorContext, ActorId, TenantId};
pub use domain::approval::{
    ApprovalRequest, ApprovalRequestId, ApprovalRequestPatch, CheckpointDecision, Decision,
    NewApprovalRequest, ProjectId, ReferenceId, ReferenceType, RequestState, SupplierId,
};
pub use envelope::ListEnvelope;
pub use errors::{ApprovalError, InterfaceError, Operation};
pub use flows::{ApprovalAction, Checkpoint, TransitionEngine, TransitionError};
pub use listing::{ListFilter, ListQuery, ListingLimits, Page, PageRequest};
pub use service::{ApprovalService, RequestView};
pub use store::{InMemoryRequestStore, RequestStore, StoreError};
