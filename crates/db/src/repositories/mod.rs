use thiserror::Error;

use payflow_core::store::StoreError;

pub mod approval_request;

pub use approval_request::SqlApprovalRequestRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        StoreError::Storage(value.to_string())
    }
}
