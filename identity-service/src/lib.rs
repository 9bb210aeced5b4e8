pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

use metrics_exporter_prometheus::PrometheusHandle;
use service_core::axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    tracing::request_id_middleware,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use utoipa::OpenApi;

use crate::config::IdentityConfig;
use crate::services::{
    AvatarService, AvatarStorage, CaptchaGenerator, CodeDelivery, CodeSender, HumanCheckProvider,
    HumanCheckService, IdAllocator, IdGenerator, RecordStore, SessionAuthenticator, SessionStore,
    SignupService, UserMirror, VerificationGate,
};
use crate::utils::Clock;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::account::signup,
        handlers::account::get_account,
        handlers::session::login,
        handlers::session::logout,
        handlers::avatar::upload_avatar,
        handlers::human_check::get_human_check,
        handlers::verification::send_verification_code,
    ),
    components(
        schemas(
            dtos::ApiResponse,
            dtos::SignupRequest,
            dtos::LoginRequest,
            dtos::UploadAvatarForm,
            dtos::SendCodeRequest,
            dtos::HumanCheck,
            models::User,
            models::Organization,
            models::PasswordType,
            models::Application,
            models::ProviderItem,
            models::SignupItem,
            models::SignupField,
            models::SignupRule,
        )
    ),
    tags(
        (name = "Account", description = "Signup and account data"),
        (name = "Session", description = "Cookie session sign-in and sign-out"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

/// Pluggable backends the services are wired from.
pub struct Collaborators {
    pub store: Arc<dyn RecordStore>,
    pub session_store: Arc<dyn SessionStore>,
    pub gate: Arc<dyn VerificationGate>,
    pub delivery: Arc<dyn CodeDelivery>,
    pub ids: Arc<dyn IdGenerator>,
    pub mirror: Arc<dyn UserMirror>,
    pub avatar_storage: Arc<dyn AvatarStorage>,
    pub captcha: Arc<dyn CaptchaGenerator>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<IdentityConfig>,
    pub store: Arc<dyn RecordStore>,
    pub session_store: Arc<dyn SessionStore>,
    pub sessions: SessionAuthenticator,
    pub signup: SignupService,
    pub avatars: AvatarService,
    pub human_check: HumanCheckService,
    pub codes: CodeSender,
    pub metrics: Option<PrometheusHandle>,
    pub login_rate_limiter: IpRateLimiter,
    pub signup_rate_limiter: IpRateLimiter,
    pub send_code_rate_limiter: IpRateLimiter,
}

impl AppState {
    pub fn new(
        config: IdentityConfig,
        deps: Collaborators,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let sessions = SessionAuthenticator::new(
            deps.store.clone(),
            deps.session_store.clone(),
            deps.clock.clone(),
        );
        let signup = SignupService::new(
            deps.store.clone(),
            deps.gate.clone(),
            IdAllocator::new(deps.store.clone(), deps.ids),
            sessions.clone(),
            deps.mirror,
            deps.clock.clone(),
        );
        let avatars = AvatarService::new(deps.store.clone(), deps.avatar_storage, deps.clock);

        let provider = config
            .human_check
            .provider_type
            .clone()
            .map(|provider_type| HumanCheckProvider {
                provider_type,
                app_key: config.human_check.app_key.clone(),
                scene: config.human_check.scene.clone(),
            });
        let human_check = HumanCheckService::new(provider, deps.captcha);
        let codes = CodeSender::new(deps.gate, human_check.clone(), deps.delivery);

        let login_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
        );
        let signup_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.signup_attempts,
            config.rate_limit.signup_window_seconds,
        );
        let send_code_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.send_code_attempts,
            config.rate_limit.send_code_window_seconds,
        );

        Self {
            config: Arc::new(config),
            store: deps.store,
            session_store: deps.session_store,
            sessions,
            signup,
            avatars,
            human_check,
            codes,
            metrics,
            login_rate_limiter,
            signup_rate_limiter,
            send_code_rate_limiter,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let login_route = Router::new()
        .route("/api/login", post(handlers::session::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let signup_route = Router::new()
        .route("/api/signup", post(handlers::account::signup))
        .layer(from_fn_with_state(
            state.signup_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let send_code_route = Router::new()
        .route(
            "/api/send-verification-code",
            post(handlers::verification::send_verification_code),
        )
        .layer(from_fn_with_state(
            state.send_code_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let origins = state
        .config
        .security
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect::<Vec<HeaderValue>>();

    let mut app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(login_route)
        .merge(signup_route)
        .merge(send_code_route)
        .route("/api/logout", post(handlers::session::logout))
        .route("/api/get-account", get(handlers::account::get_account))
        .route("/api/upload-avatar", post(handlers::avatar::upload_avatar))
        .route(
            "/api/get-human-check",
            get(handlers::human_check::get_human_check),
        );

    // Serve locally stored avatars when they live under a path of this service.
    let mount = state.config.avatar.base_url.trim_end_matches('/').to_string();
    if mount.starts_with('/') && mount.len() > 1 {
        app = app.nest_service(&mount, ServeDir::new(&state.config.avatar.storage_dir));
    }

    app.with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE])
                .max_age(Duration::from_secs(3600)),
        )
}
