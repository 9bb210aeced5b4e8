use axum_extra::extract::cookie::CookieJar;
use service_core::axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{
    dtos::{ApiResponse, UploadAvatarForm},
    handlers::{cookie, reply, SIGN_IN_REQUIRED},
    utils::ApiForm,
    AppState,
};

/// Replace the signed-in user's avatar with a PNG data URI
#[utoipa::path(
    post,
    path = "/api/upload-avatar",
    request_body(content = UploadAvatarForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Upload outcome", body = ApiResponse),
        (status = 400, description = "Malformed form")
    ),
    tag = "Account"
)]
pub async fn upload_avatar(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiForm(form): ApiForm<UploadAvatarForm>,
) -> Result<Json<ApiResponse>, AppError> {
    let token = cookie::session_token(&jar, &state.config.session);
    let key = match token {
        Some(token) => state.sessions.current_user(&token).await?,
        None => None,
    };
    let Some(key) = key else {
        return Ok(Json(ApiResponse::error(SIGN_IN_REQUIRED)));
    };

    let result = state.avatars.upload(&key, &form.avatarfile).await;
    reply(result, |_| ApiResponse::ok(serde_json::Value::Null))
}
