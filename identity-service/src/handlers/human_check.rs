use service_core::axum::{extract::State, Json};

use crate::{dtos::HumanCheck, AppState};

/// Which human check the client should present
#[utoipa::path(
    get,
    path = "/api/get-human-check",
    responses(
        (status = 200, description = "Provider type, or a local captcha challenge", body = HumanCheck)
    ),
    tag = "Account"
)]
pub async fn get_human_check(State(state): State<AppState>) -> Json<HumanCheck> {
    Json(state.human_check.get_human_check())
}
