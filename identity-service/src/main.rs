use chrono::Duration as ChronoDuration;
use identity_service::{
    build_router,
    config::{IdentityConfig, SessionBackend, StoreBackend},
    services::{
        self, Bootstrap, CodeRegistry, HttpUserMirror, LocalAvatarStorage, MemorySessionStore,
        MemoryStore, MongoStore, NoopDelivery, NoopMirror, RecordStore, RedisSessionStore,
        SessionStore, SvgCaptcha, UserMirror, UuidGenerator,
    },
    utils::{Clock, SystemClock},
    AppState, Collaborators,
};
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = IdentityConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    let metrics = services::metrics::install_recorder()?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting identity service"
    );

    let store: Arc<dyn RecordStore> = match config.store.backend {
        StoreBackend::Mongodb => Arc::new(
            MongoStore::connect(&config.store.mongodb_uri, &config.store.mongodb_database).await?,
        ),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory record store");
            Arc::new(MemoryStore::new())
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ids = Arc::new(UuidGenerator);

    let session_store: Arc<dyn SessionStore> = match config.session.backend {
        SessionBackend::Redis => Arc::new(
            RedisSessionStore::connect(&config.session.redis_url, config.session.ttl_hours * 3600)
                .await?,
        ),
        SessionBackend::Memory => {
            let ttl = i64::try_from(config.session.ttl_hours)
                .ok()
                .and_then(ChronoDuration::try_hours)
                .ok_or_else(|| anyhow::anyhow!("SESSION_TTL_HOURS is out of range"))?;
            Arc::new(MemorySessionStore::with_ttl(ttl, clock.clone()))
        }
    };

    if config.bootstrap.enabled {
        Bootstrap {
            store: store.as_ref(),
            clock: clock.as_ref(),
            ids: ids.as_ref(),
            admin_password: &config.bootstrap.admin_password,
        }
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create built-in records: {}", e))?;
        tracing::info!("Built-in records ensured");
    }

    let mirror: Arc<dyn UserMirror> = match &config.mirror.url {
        Some(url) => Arc::new(HttpUserMirror::new(
            url,
            Duration::from_secs(config.mirror.timeout_seconds),
        )?),
        None => Arc::new(NoopMirror),
    };

    let deps = Collaborators {
        store,
        session_store,
        gate: Arc::new(CodeRegistry::new(
            ChronoDuration::minutes(config.verification.code_ttl_minutes),
            clock.clone(),
        )),
        delivery: Arc::new(NoopDelivery),
        ids,
        mirror,
        avatar_storage: Arc::new(LocalAvatarStorage::new(
            &config.avatar.storage_dir,
            &config.avatar.base_url,
        )),
        captcha: Arc::new(SvgCaptcha::new(
            ChronoDuration::minutes(config.verification.captcha_ttl_minutes),
            clock.clone(),
        )),
        clock,
    };

    let addr = config.common.socket_addr();
    let state = AppState::new(config.clone(), deps, Some(metrics));
    let app = build_router(state);

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
