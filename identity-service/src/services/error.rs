use crate::services::store::StoreError;
use service_core::error::AppError;
use thiserror::Error;

/// An admissibility verdict: the request is well formed but not allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub msg: String,
    /// Optional auxiliary payload, e.g. the already signed-in user.
    pub data: Option<String>,
}

impl Rejection {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            data: None,
        }
    }

    pub fn with_data(msg: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            data: Some(data.into()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{}", .0.msg)]
    Rejected(Rejection),

    #[error("{0}")]
    NotFound(String),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Session store error: {0}")]
    Session(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn rejected(msg: impl Into<String>) -> Self {
        ServiceError::Rejected(Rejection::new(msg))
    }
}

impl From<Rejection> for ServiceError {
    fn from(rejection: Rejection) -> Self {
        ServiceError::Rejected(rejection)
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Rejected(r) => AppError::BadRequest(anyhow::anyhow!(r.msg)),
            ServiceError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            ServiceError::Store(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Session(e) => AppError::SessionStoreError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
