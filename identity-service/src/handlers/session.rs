use axum_extra::extract::cookie::CookieJar;
use service_core::axum::{extract::State, Json};
use service_core::error::AppError;
use validator::Validate;

use crate::{
    dtos::{ApiResponse, LoginRequest},
    handlers::{cookie, reply},
    utils::ApiJson,
    AppState,
};

/// Sign in with a password
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Sign-in outcome; `data` is the user id", body = ApiResponse),
        (status = 400, description = "Malformed body"),
        (status = 429, description = "Rate limited")
    ),
    tag = "Session"
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse>), AppError> {
    req.validate()?;

    // A successful sign-in always gets a fresh token.
    if let Some(previous) = cookie::session_token(&jar, &state.config.session) {
        state.sessions.clear_session(&previous).await?;
    }
    let (jar, token) = cookie::issue_token(jar, &state.config.session);

    let result = state.sessions.sign_in(&token, &req).await;
    let body = reply(result, |key| ApiResponse::ok(key.to_string()))?;
    Ok((jar, body))
}

/// End the current session
#[utoipa::path(
    post,
    path = "/api/logout",
    responses(
        (status = 200, description = "`data` is the previous user id, empty when already signed out", body = ApiResponse)
    ),
    tag = "Session"
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse>), AppError> {
    let Some(token) = cookie::session_token(&jar, &state.config.session) else {
        return Ok((jar, Json(ApiResponse::ok(""))));
    };

    let result = state.sessions.logout(&token).await;
    let body = reply(result, |previous| {
        ApiResponse::ok(previous.map(|key| key.to_string()).unwrap_or_default())
    })?;
    Ok((cookie::drop_token(jar, &state.config.session), body))
}
