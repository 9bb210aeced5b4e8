//! Shared setup for identity-service integration tests: an in-memory
//! deployment driven through the axum router with `oneshot`.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use identity_service::{
    build_router,
    config::{
        AvatarConfig, BootstrapConfig, Environment, HumanCheckConfig, IdentityConfig,
        MirrorConfig, RateLimitConfig, SecurityConfig, SessionBackend, SessionConfig,
        StoreBackend, StoreConfig, VerificationConfig,
    },
    models::Application,
    services::{
        Bootstrap, CodeChannel, CodeDelivery, CodeRegistry, LocalAvatarStorage,
        MemorySessionStore, MemoryStore, NoopMirror, RecordStore, SvgCaptcha, UuidGenerator,
    },
    utils::{Clock, ManualClock},
    AppState, Collaborators,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

pub const COOKIE_NAME: &str = "identity_session";

/// Keeps every delivered code so tests can read it back.
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<(CodeChannel, String, String)>>,
}

impl Outbox {
    pub fn sent(&self) -> Vec<(CodeChannel, String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Latest code delivered to `target`.
    pub fn code_for(&self, target: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|(_, to, _)| to == target)
            .map(|(_, _, code)| code)
    }
}

#[async_trait::async_trait]
impl CodeDelivery for Outbox {
    async fn deliver(
        &self,
        channel: CodeChannel,
        target: &str,
        code: &str,
    ) -> Result<(), anyhow::Error> {
        self.sent
            .lock()
            .unwrap()
            .push((channel, target.to_string(), code.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub sessions: Arc<MemorySessionStore>,
    pub gate: Arc<CodeRegistry>,
    pub clock: Arc<ManualClock>,
    pub outbox: Arc<Outbox>,
    pub avatar_dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    /// `name=value` part of the session cookie, if one was set.
    pub cookie: Option<String>,
    pub body: Value,
}

impl TestResponse {
    pub fn msg(&self) -> &str {
        self.body["msg"].as_str().unwrap_or_default()
    }
}

pub fn create_test_config(avatar_dir: &str) -> IdentityConfig {
    IdentityConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "identity-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        store: StoreConfig {
            backend: StoreBackend::Memory,
            mongodb_uri: String::new(),
            mongodb_database: String::new(),
        },
        session: SessionConfig {
            backend: SessionBackend::Memory,
            redis_url: String::new(),
            cookie_name: COOKIE_NAME.to_string(),
            cookie_secure: false,
            ttl_hours: 168,
        },
        verification: VerificationConfig {
            code_ttl_minutes: 10,
            captcha_ttl_minutes: 5,
        },
        avatar: AvatarConfig {
            storage_dir: avatar_dir.to_string(),
            base_url: "http://cdn.test/avatars/".to_string(),
        },
        human_check: HumanCheckConfig {
            provider_type: None,
            app_key: None,
            scene: None,
        },
        mirror: MirrorConfig {
            url: None,
            timeout_seconds: 1,
        },
        bootstrap: BootstrapConfig {
            enabled: true,
            admin_password: "123".to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        rate_limit: RateLimitConfig {
            login_attempts: 1000,
            login_window_seconds: 60,
            signup_attempts: 1000,
            signup_window_seconds: 60,
            send_code_attempts: 1000,
            send_code_window_seconds: 60,
        },
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(customize: impl FnOnce(&mut IdentityConfig)) -> Self {
        let avatar_dir = TempDir::new().expect("Failed to create avatar dir");
        let mut config = create_test_config(avatar_dir.path().to_str().unwrap());
        customize(&mut config);

        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let gate = Arc::new(CodeRegistry::new(
            chrono::Duration::minutes(10),
            dyn_clock.clone(),
        ));

        Bootstrap {
            store: store.as_ref(),
            clock: clock.as_ref(),
            ids: &UuidGenerator,
            admin_password: "123",
        }
        .run()
        .await
        .expect("Failed to bootstrap built-in records");

        let outbox = Arc::new(Outbox::default());

        let deps = Collaborators {
            store: store.clone(),
            session_store: sessions.clone(),
            gate: gate.clone(),
            ids: Arc::new(UuidGenerator),
            mirror: Arc::new(NoopMirror),
            delivery: outbox.clone(),
            avatar_storage: Arc::new(LocalAvatarStorage::new(
                avatar_dir.path(),
                &config.avatar.base_url,
            )),
            captcha: Arc::new(SvgCaptcha::new(
                chrono::Duration::minutes(5),
                dyn_clock.clone(),
            )),
            clock: dyn_clock,
        };

        let state = AppState::new(config, deps, None);
        let router = build_router(state.clone());

        Self {
            router,
            state,
            store,
            sessions,
            gate,
            clock,
            outbox,
            avatar_dir,
        }
    }

    pub async fn add_application(&self, application: Application) {
        assert!(self
            .store
            .add_application(&application)
            .await
            .expect("Failed to add application"));
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let cookie = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .find(|v| v.starts_with(&format!("{}=", COOKIE_NAME)))
            .map(|v| v.to_string());

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            cookie,
            body,
        }
    }

    pub async fn post_json(&self, path: &str, body: Value, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
        cookie: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = serde_urlencoded::to_string(form).unwrap();
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Sign in and return the session cookie.
    pub async fn login(&self, application: &str, organization: &str, username: &str, password: &str) -> String {
        let res = self
            .post_json(
                "/api/login",
                serde_json::json!({
                    "application": application,
                    "organization": organization,
                    "username": username,
                    "password": password,
                }),
                None,
            )
            .await;
        assert_eq!(res.body["status"], "ok", "login failed: {}", res.body);
        res.cookie.expect("login did not set a session cookie")
    }
}
