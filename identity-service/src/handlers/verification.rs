use service_core::axum::{extract::State, Json};
use service_core::error::AppError;
use validator::Validate;

use crate::{
    dtos::{ApiResponse, SendCodeRequest},
    handlers::reply,
    utils::ApiForm,
    AppState,
};

/// Send a verification code to an email address or phone number
#[utoipa::path(
    post,
    path = "/api/send-verification-code",
    request_body(content = SendCodeRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Issue outcome", body = ApiResponse),
        (status = 400, description = "Malformed form"),
        (status = 422, description = "Field too long"),
        (status = 429, description = "Rate limited")
    ),
    tag = "Account"
)]
pub async fn send_verification_code(
    State(state): State<AppState>,
    ApiForm(req): ApiForm<SendCodeRequest>,
) -> Result<Json<ApiResponse>, AppError> {
    req.validate()?;

    let result = state.codes.send(&req).await;
    reply(result, |_| ApiResponse::ok(serde_json::Value::Null))
}
