//! HTTP handlers for the identity service.

pub mod account;
pub mod avatar;
pub mod cookie;
pub mod health;
pub mod human_check;
pub mod metrics;
pub mod session;
pub mod verification;

use crate::dtos::ApiResponse;
use crate::services::ServiceError;
use service_core::axum::Json;
use service_core::error::AppError;

pub const SIGN_IN_REQUIRED: &str = "Please sign in first";

/// Domain outcomes travel in the envelope; only faults escape as `AppError`.
pub(crate) fn reply<T>(
    result: Result<T, ServiceError>,
    ok: impl FnOnce(T) -> ApiResponse,
) -> Result<Json<ApiResponse>, AppError> {
    match result {
        Ok(value) => Ok(Json(ok(value))),
        Err(ServiceError::Rejected(rejection)) => Ok(Json(match rejection.data {
            Some(data) => ApiResponse::error_with_data(rejection.msg, data),
            None => ApiResponse::error(rejection.msg),
        })),
        Err(ServiceError::NotFound(msg)) => Ok(Json(ApiResponse::error(msg))),
        Err(fault) => Err(fault.into()),
    }
}
