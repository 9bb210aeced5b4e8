use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreConfig,
    pub session: SessionConfig,
    pub verification: VerificationConfig,
    pub avatar: AvatarConfig,
    pub human_check: HumanCheckConfig,
    pub mirror: MirrorConfig,
    pub bootstrap: BootstrapConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Mongodb,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub mongodb_uri: String,
    pub mongodb_database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub backend: SessionBackend,
    pub redis_url: String,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub ttl_hours: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    pub code_ttl_minutes: i64,
    pub captcha_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvatarConfig {
    pub storage_dir: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HumanCheckConfig {
    pub provider_type: Option<String>,
    pub app_key: Option<String>,
    pub scene: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    pub url: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    pub enabled: bool,
    pub admin_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub signup_attempts: u32,
    pub signup_window_seconds: u64,
    pub send_code_attempts: u32,
    pub send_code_window_seconds: u64,
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let environment: Environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "dev".to_string())
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        let is_prod = environment == Environment::Prod;

        let store_backend: StoreBackend = parse_env("STORE_BACKEND", "memory")?;
        let session_backend: SessionBackend = parse_env("SESSION_BACKEND", "memory")?;
        let needs_mongo = store_backend == StoreBackend::Mongodb;
        let needs_redis = session_backend == SessionBackend::Redis;

        let config = IdentityConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("identity-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: optional_env("OTLP_ENDPOINT"),
            store: StoreConfig {
                backend: store_backend,
                mongodb_uri: get_env(
                    "MONGODB_URI",
                    Some("mongodb://localhost:27017"),
                    is_prod && needs_mongo,
                )?,
                mongodb_database: get_env(
                    "MONGODB_DATABASE",
                    Some("identity"),
                    is_prod && needs_mongo,
                )?,
            },
            session: SessionConfig {
                backend: session_backend,
                redis_url: get_env(
                    "REDIS_URL",
                    Some("redis://127.0.0.1:6379"),
                    is_prod && needs_redis,
                )?,
                cookie_name: parse_env("SESSION_COOKIE_NAME", "identity_session")?,
                cookie_secure: parse_env("SESSION_COOKIE_SECURE", if is_prod { "true" } else { "false" })?,
                ttl_hours: parse_env("SESSION_TTL_HOURS", "168")?,
            },
            verification: VerificationConfig {
                code_ttl_minutes: parse_env("VERIFICATION_CODE_TTL_MINUTES", "10")?,
                captcha_ttl_minutes: parse_env("CAPTCHA_TTL_MINUTES", "5")?,
            },
            avatar: AvatarConfig {
                storage_dir: get_env("AVATAR_STORAGE_DIR", Some("./data/avatars"), is_prod)?,
                base_url: get_env("AVATAR_BASE_URL", Some("/avatars/"), is_prod)?,
            },
            human_check: HumanCheckConfig {
                provider_type: optional_env("HUMAN_CHECK_PROVIDER_TYPE"),
                app_key: optional_env("HUMAN_CHECK_PROVIDER_APP_KEY"),
                scene: optional_env("HUMAN_CHECK_PROVIDER_SCENE"),
            },
            mirror: MirrorConfig {
                url: optional_env("MIRROR_URL"),
                timeout_seconds: parse_env("MIRROR_TIMEOUT_SECONDS", "5")?,
            },
            bootstrap: BootstrapConfig {
                enabled: parse_env("BOOTSTRAP_ENABLED", "true")?,
                admin_password: get_env("BOOTSTRAP_ADMIN_PASSWORD", Some("123"), is_prod)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            rate_limit: RateLimitConfig {
                login_attempts: parse_env("RATE_LIMIT_LOGIN_ATTEMPTS", "5")?,
                login_window_seconds: parse_env("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "900")?,
                signup_attempts: parse_env("RATE_LIMIT_SIGNUP_ATTEMPTS", "3")?,
                signup_window_seconds: parse_env("RATE_LIMIT_SIGNUP_WINDOW_SECONDS", "3600")?,
                send_code_attempts: parse_env("RATE_LIMIT_SEND_CODE_ATTEMPTS", "5")?,
                send_code_window_seconds: parse_env("RATE_LIMIT_SEND_CODE_WINDOW_SECONDS", "3600")?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.session.ttl_hours == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_TTL_HOURS must be positive"
            )));
        }

        if self.verification.code_ttl_minutes <= 0 || self.verification.captcha_ttl_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "VERIFICATION_CODE_TTL_MINUTES and CAPTCHA_TTL_MINUTES must be positive"
            )));
        }

        if self.rate_limit.login_window_seconds == 0
            || self.rate_limit.signup_window_seconds == 0
            || self.rate_limit.send_code_window_seconds == 0
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Rate limit windows must be positive"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if !self.session.cookie_secure {
                tracing::warn!("Session cookie is not marked Secure in production");
            }

            if self.store.backend == StoreBackend::Memory {
                tracing::warn!("In-memory record store in production loses all data on restart");
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Tuning knob with a default in every environment.
fn parse_env<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, e))
    })
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "mongodb" | "mongo" => Ok(StoreBackend::Mongodb),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

impl FromStr for SessionBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(SessionBackend::Memory),
            "redis" => Ok(SessionBackend::Redis),
            _ => Err(format!("Invalid session backend: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backends_parse_case_insensitively() {
        assert_eq!("MongoDB".parse::<StoreBackend>(), Ok(StoreBackend::Mongodb));
        assert_eq!("redis".parse::<SessionBackend>(), Ok(SessionBackend::Redis));
        assert!("sqlite".parse::<StoreBackend>().is_err());
        assert_eq!("PROD".parse::<Environment>(), Ok(Environment::Prod));
    }

    #[test]
    fn parse_env_reports_the_key() {
        let err = parse_env::<u32>("IDENTITY_TEST_UNSET_KNOB", "many").unwrap_err();
        assert!(err.to_string().contains("IDENTITY_TEST_UNSET_KNOB"));

        let value: u32 = parse_env("IDENTITY_TEST_UNSET_KNOB", "42").unwrap();
        assert_eq!(value, 42);
    }
}
