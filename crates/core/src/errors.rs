use std::fmt;

use thiserror::Error;

use crate::domain::approval::{ApprovalRequestId, RequestState};
use crate::flows::states::Checkpoint;
use crate::flows::TransitionError;
use crate::store::StoreError;

/// The service operation that was attempted, used to word errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Submit,
    ApproveLv1,
    ApproveLv2,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Submit => "submit",
            Self::ApproveLv1 => "approve_lv1",
            Self::ApproveLv2 => "approve_lv2",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Checkpoint> for Operation {
    fn from(value: Checkpoint) -> Self {
        match value {
            Checkpoint::Submit => Self::Submit,
            Checkpoint::Level1 => Self::ApproveLv1,
            Checkpoint::Level2 => Self::ApproveLv2,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error("cannot {operation} a request in state {}", .state.as_str())]
    IllegalState { state: RequestState, operation: Operation },
    #[error("actor is not allowed to {operation} this request")]
    Forbidden { operation: Operation },
    #[error("a non-empty note is required to {operation}")]
    MissingNote { operation: Operation },
    #[error("request {id} was modified concurrently (expected version {expected_version})")]
    Conflict { id: ApprovalRequestId, expected_version: u32 },
    #[error("approval request {0} not found")]
    NotFound(ApprovalRequestId),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<TransitionError> for ApprovalError {
    fn from(value: TransitionError) -> Self {
        match value {
            TransitionError::IllegalState { state, checkpoint } => {
                Self::IllegalState { state, operation: checkpoint.into() }
            }
            TransitionError::Forbidden { checkpoint } => {
                Self::Forbidden { operation: checkpoint.into() }
            }
            TransitionError::MissingNote { checkpoint } => {
                Self::MissingNote { operation: checkpoint.into() }
            }
        }
    }
}

impl From<StoreError> for ApprovalError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict { id, expected_version } => Self::Conflict { id, expected_version },
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Storage(message) => Self::Storage(message),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    Unprocessable,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    ServiceUnavailable,
}

impl ErrorClass {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unprocessable => 422,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::ServiceUnavailable => 503,
        }
    }
}

/// Boundary-facing error: a status class, a stable machine code and a correlation id.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct InterfaceError {
    pub class: ErrorClass,
    pub code: &'static str,
    pub message: String,
    pub field: Option<&'static str>,
    pub correlation_id: String,
}

impl InterfaceError {
    pub fn status_code(&self) -> u16 {
        self.class.status_code()
    }

    pub fn user_message(&self) -> &'static str {
        match self.code {
            "validation" => "The request could not be processed. Check inputs and try again.",
            "missing_note" => "A note is required for this decision.",
            "unauthorized" => "Actor identity and tenant scope are required.",
            "forbidden" => "You are not allowed to perform this action.",
            "not_found" => "The approval request does not exist.",
            "illegal_state" => {
                "The request is no longer in a state that allows this action. Refresh and retry."
            }
            "conflict" => "The request was changed by someone else. Refresh and retry.",
            _ => "The service is temporarily unavailable. Please retry shortly.",
        }
    }
}

impl ApprovalError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::IllegalState { .. } => "illegal_state",
            Self::Forbidden { .. } => "forbidden",
            Self::MissingNote { .. } => "missing_note",
            Self::Conflict { .. } => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Storage(_) => "storage",
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation { .. } | Self::MissingNote { .. } => ErrorClass::Unprocessable,
            Self::Unauthorized(_) => ErrorClass::Unauthorized,
            Self::Forbidden { .. } => ErrorClass::Forbidden,
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::IllegalState { .. } | Self::Conflict { .. } => ErrorClass::Conflict,
            Self::Storage(_) => ErrorClass::ServiceUnavailable,
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let field = match &self {
            Self::Validation { field, .. } => Some(*field),
            Self::MissingNote { .. } => Some("note"),
            _ => None,
        };
        // storage details stay in the logs
        let message = match &self {
            Self::Storage(_) => "storage unavailable".to_owned(),
            other => other.to_string(),
        };

        InterfaceError {
            class: self.class(),
            code: self.code(),
            message,
            field,
            correlation_id: correlation_id.into(),
        }
    }
}
