use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use service_core::axum::{extract::State, Json};
use service_core::error::AppError;
use validator::Validate;

use crate::{
    dtos::{ApiResponse, SignupRequest},
    handlers::{cookie, reply, SIGN_IN_REQUIRED},
    services::{ServiceError, APPLICATION_OWNER},
    utils::ApiJson,
    AppState,
};

/// Register a new user through an application
#[utoipa::path(
    post,
    path = "/api/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Signup outcome; `data` is the new user id", body = ApiResponse),
        (status = 400, description = "Malformed body"),
        (status = 422, description = "Field too long"),
        (status = 429, description = "Rate limited")
    ),
    tag = "Account"
)]
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<(CookieJar, Json<ApiResponse>), AppError> {
    req.validate()?;

    let (jar, token) = cookie::ensure_token(jar, &state.config.session);
    let result = state.signup.signup(&token, &req).await;
    let body = reply(result, |key| ApiResponse::ok(key.to_string()))?;
    Ok((jar, body))
}

/// Current user and their organization
#[utoipa::path(
    get,
    path = "/api/get-account",
    responses(
        (status = 200, description = "`data` is the user, `data2` the organization", body = ApiResponse)
    ),
    tag = "Account"
)]
pub async fn get_account(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<ApiResponse>, AppError> {
    let Some(token) = cookie::session_token(&jar, &state.config.session) else {
        return Ok(Json(ApiResponse::error(SIGN_IN_REQUIRED)));
    };

    let result = async {
        let key = state
            .sessions
            .current_user(&token)
            .await?
            .ok_or_else(|| ServiceError::rejected(SIGN_IN_REQUIRED))?;
        let user = state
            .store
            .get_user(&key)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("The user: {} doesn't exist", key)))?;
        let organization = state
            .store
            .get_organization(APPLICATION_OWNER, &user.owner)
            .await?;
        Ok::<_, ServiceError>((user, organization))
    }
    .await;

    reply(result, |(user, organization)| {
        ApiResponse::ok_with(json!(user.masked()), json!(organization))
    })
}
