//! JSON API over the approval service.
//!
//! - `POST   /api/v1/projects/{project_id}/requests`  create a draft
//! - `GET    /api/v1/requests`                        list (filters and paging in the query)
//! - `GET    /api/v1/requests/{id}`                   request with the caller's capabilities
//! - `PATCH  /api/v1/requests/{id}`                   edit a draft
//! - `DELETE /api/v1/requests/{id}`                   delete a draft
//! - `POST   /api/v1/requests/{id}/submit`            draft to pending
//! - `POST   /api/v1/requests/{id}/approve-lv1`       level-one decision
//! - `POST   /api/v1/requests/{id}/approve-lv2`       level-two decision
//! - `GET    /api/v1/requests/{id}/audit`             audit trail, oldest first
//!
//! The caller is identified by `x-actor-id` and `x-tenant-id`. `x-correlation-id` is
//! carried into logs and error bodies and generated when absent.

use std::convert::Infallible;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use payflow_core::audit::AuditEntry;
use payflow_core::domain::actor::ActorContext;
use payflow_core::domain::approval::{
    ApprovalRequest, ApprovalRequestId, ApprovalRequestPatch, Decision, NewApprovalRequest,
    ProjectId, ReferenceType, RequestState, SupplierId,
};
use payflow_core::errors::{ApprovalError, InterfaceError};
use payflow_core::listing::{ListFilter, Page};
use payflow_core::service::RequestView;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::bootstrap::AppService;

pub const ACTOR_HEADER: &str = "x-actor-id";
pub const TENANT_HEADER: &str = "x-tenant-id";
pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ApiState {
    service: AppService,
}

pub fn router(service: AppService) -> Router {
    Router::new()
        .route("/api/v1/projects/{project_id}/requests", post(create_request))
        .route("/api/v1/requests", get(list_requests))
        .route(
            "/api/v1/requests/{id}",
            get(get_request).patch(update_request).delete(delete_request),
        )
        .route("/api/v1/requests/{id}/submit", post(submit_request))
        .route("/api/v1/requests/{id}/approve-lv1", post(approve_lv1))
        .route("/api/v1/requests/{id}/approve-lv2", post(approve_lv2))
        .route("/api/v1/requests/{id}/audit", get(audit_trail))
        .with_state(ApiState { service })
}

/// Who is calling. Missing identity headers become blank fields that fail
/// `identified` before any body or query is looked at.
#[derive(Clone, Debug)]
pub struct Caller {
    pub actor: ActorContext,
    pub correlation_id: String,
}

impl Caller {
    fn from_headers(headers: &HeaderMap) -> Self {
        let actor = ActorContext::new(
            header(headers, ACTOR_HEADER).unwrap_or_default(),
            header(headers, TENANT_HEADER).unwrap_or_default(),
        );
        let correlation_id =
            header(headers, CORRELATION_HEADER).unwrap_or_else(|| Uuid::new_v4().to_string());
        Self { actor, correlation_id }
    }

    fn identified(&self) -> ApiResult<()> {
        self.actor.authorize().map_err(|failure| reject(self, "-", failure))
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: self.0.code.to_string(),
            message: self.0.message,
            field: self.0.field.map(str::to_owned),
            correlation_id: self.0.correlation_id,
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn reject(caller: &Caller, request_id: &str, failure: ApprovalError) -> ApiError {
    match &failure {
        ApprovalError::Storage(detail) => error!(
            event_name = "api.request.storage_failed",
            correlation_id = %caller.correlation_id,
            request_id,
            error = %detail,
            "storage failure while handling request"
        ),
        other => warn!(
            event_name = "api.request.rejected",
            correlation_id = %caller.correlation_id,
            request_id,
            actor_id = %caller.actor.actor_id.0,
            code = other.code(),
            error = %other,
            "request rejected"
        ),
    }
    ApiError(failure.into_interface(caller.correlation_id.clone()))
}

fn payload<T>(caller: &Caller, body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    caller.identified()?;
    body.map(|Json(value)| value).map_err(|rejection| {
        reject(
            caller,
            "-",
            ApprovalError::Validation { field: "body", message: rejection.body_text() },
        )
    })
}

#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    pub decision: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl DecisionBody {
    fn decision(&self) -> Result<Decision, ApprovalError> {
        Decision::parse(&self.decision).ok_or_else(|| ApprovalError::Validation {
            field: "decision",
            message: format!("unknown decision `{}` (expected approve|reject)", self.decision),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub project_id: Option<String>,
    pub state: Option<String>,
    pub reference_type: Option<String>,
    pub keyword: Option<String>,
    pub supplier_id: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl ListParams {
    fn into_query(self) -> Result<(ListFilter, Option<u32>, Option<u32>), ApprovalError> {
        let states = comma_list(self.state.as_deref(), "state", RequestState::parse)?;
        let supplier_ids = comma_list(self.supplier_id.as_deref(), "supplierId", |raw| {
            raw.parse::<i64>().ok().map(SupplierId)
        })?;
        let reference_type = match non_blank(self.reference_type.as_deref()) {
            Some(raw) => Some(ReferenceType::parse(raw).ok_or_else(|| {
                ApprovalError::Validation {
                    field: "referenceType",
                    message: format!("unknown reference type `{raw}`"),
                }
            })?),
            None => None,
        };

        let filter = ListFilter {
            project_id: non_blank(self.project_id.as_deref()).map(|id| ProjectId(id.to_owned())),
            states,
            reference_type,
            keyword: self.keyword,
            supplier_ids,
        };
        let page = number(self.page.as_deref(), "page")?;
        let page_size = number(self.page_size.as_deref(), "pageSize")?;
        Ok((filter, page, page_size))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn comma_list<T>(
    raw: Option<&str>,
    field: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<T>, ApprovalError> {
    let Some(raw) = non_blank(raw) else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            parse(item).ok_or_else(|| ApprovalError::Validation {
                field,
                message: format!("invalid {field} value `{item}`"),
            })
        })
        .collect()
}

fn number(raw: Option<&str>, field: &'static str) -> Result<Option<u32>, ApprovalError> {
    match non_blank(raw) {
        Some(value) => value.parse::<u32>().map(Some).map_err(|_| ApprovalError::Validation {
            field,
            message: format!("{field} must be a positive integer"),
        }),
        None => Ok(None),
    }
}

async fn create_request(
    State(state): State<ApiState>,
    caller: Caller,
    Path(project_id): Path<String>,
    body: Result<Json<NewApprovalRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApprovalRequest>)> {
    let draft = payload(&caller, body)?;
    let created = state
        .service
        .create(&caller.actor, ProjectId(project_id), draft)
        .await
        .map_err(|failure| reject(&caller, "-", failure))?;

    info!(
        event_name = "api.request.created",
        correlation_id = %caller.correlation_id,
        request_id = %created.id,
        actor_id = %caller.actor.actor_id.0,
        "approval request drafted"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_requests(
    State(state): State<ApiState>,
    caller: Caller,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Page<ApprovalRequest>>> {
    caller.identified()?;
    let Query(params) = params.map_err(|rejection| {
        reject(
            &caller,
            "-",
            ApprovalError::Validation { field: "query", message: rejection.body_text() },
        )
    })?;
    let (filter, page, page_size) =
        params.into_query().map_err(|failure| reject(&caller, "-", failure))?;

    let listed = state
        .service
        .list(&caller.actor, &filter, page, page_size)
        .await
        .map_err(|failure| reject(&caller, "-", failure))?;
    Ok(Json(listed))
}

async fn get_request(
    State(state): State<ApiState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<RequestView>> {
    let view = state
        .service
        .get(&caller.actor, &ApprovalRequestId(id.clone()))
        .await
        .map_err(|failure| reject(&caller, &id, failure))?;
    Ok(Json(view))
}

async fn update_request(
    State(state): State<ApiState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Result<Json<ApprovalRequestPatch>, JsonRejection>,
) -> ApiResult<Json<ApprovalRequest>> {
    let patch = payload(&caller, body)?;
    let updated = state
        .service
        .update(&caller.actor, &ApprovalRequestId(id.clone()), patch)
        .await
        .map_err(|failure| reject(&caller, &id, failure))?;

    info!(
        event_name = "api.request.updated",
        correlation_id = %caller.correlation_id,
        request_id = %id,
        version = updated.version,
        "draft updated"
    );
    Ok(Json(updated))
}

async fn delete_request(
    State(state): State<ApiState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .service
        .delete(&caller.actor, &ApprovalRequestId(id.clone()))
        .await
        .map_err(|failure| reject(&caller, &id, failure))?;

    info!(
        event_name = "api.request.deleted",
        correlation_id = %caller.correlation_id,
        request_id = %id,
        "draft deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn submit_request(
    State(state): State<ApiState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<ApprovalRequest>> {
    let submitted = state
        .service
        .submit(&caller.actor, &ApprovalRequestId(id.clone()))
        .await
        .map_err(|failure| reject(&caller, &id, failure))?;
    Ok(Json(transitioned(&caller, submitted)))
}

async fn approve_lv1(
    State(state): State<ApiState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Result<Json<DecisionBody>, JsonRejection>,
) -> ApiResult<Json<ApprovalRequest>> {
    let body = payload(&caller, body)?;
    let decision = body.decision().map_err(|failure| reject(&caller, &id, failure))?;
    let decided = state
        .service
        .approve_lv1(
            &caller.actor,
            &ApprovalRequestId(id.clone()),
            decision,
            body.note.as_deref().unwrap_or_default(),
        )
        .await
        .map_err(|failure| reject(&caller, &id, failure))?;
    Ok(Json(transitioned(&caller, decided)))
}

async fn approve_lv2(
    State(state): State<ApiState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Result<Json<DecisionBody>, JsonRejection>,
) -> ApiResult<Json<ApprovalRequest>> {
    let body = payload(&caller, body)?;
    let decision = body.decision().map_err(|failure| reject(&caller, &id, failure))?;
    let decided = state
        .service
        .approve_lv2(
            &caller.actor,
            &ApprovalRequestId(id.clone()),
            decision,
            body.note.as_deref().unwrap_or_default(),
        )
        .await
        .map_err(|failure| reject(&caller, &id, failure))?;
    Ok(Json(transitioned(&caller, decided)))
}

async fn audit_trail(
    State(state): State<ApiState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    let entries = state
        .service
        .audit_trail(&caller.actor, &ApprovalRequestId(id.clone()))
        .await
        .map_err(|failure| reject(&caller, &id, failure))?;
    Ok(Json(entries))
}

fn transitioned(caller: &Caller, request: ApprovalRequest) -> ApprovalRequest {
    info!(
        event_name = "api.request.transitioned",
        correlation_id = %caller.correlation_id,
        request_id = %request.id,
        actor_id = %caller.actor.actor_id.0,
        state = request.state.as_str(),
        version = request.version,
        "approval request transitioned"
    );
    request
}
