use serde_json::json;
use service_core::axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::AppState;

/// Liveness of the record store and the session store
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "All dependencies reachable"),
        (status = 503, description = "A dependency is down")
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (store, sessions) = futures::join!(
        state.store.health_check(),
        state.session_store.health_check()
    );

    let store = match store {
        Ok(()) => "up",
        Err(e) => {
            tracing::error!(error = %e, "Record store health check failed");
            "down"
        }
    };
    let sessions = match sessions {
        Ok(()) => "up",
        Err(e) => {
            tracing::error!(error = %e, "Session store health check failed");
            "down"
        }
    };

    let healthy = store == "up" && sessions == "up";
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "healthy" } else { "unhealthy" },
            "service": state.config.service_name,
            "version": state.config.service_version,
            "checks": {
                "store": store,
                "sessions": sessions,
            }
        })),
    )
}
