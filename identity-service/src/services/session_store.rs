use crate::utils::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use redis::{aio::ConnectionManager, Client};
use std::fmt;
use std::sync::Arc;

/// Opaque token carried by the client, usually in the session cookie.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// 256 random bits, hex encoded.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// Transport session state: token to `owner/name` string.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, token: &SessionToken) -> Result<Option<String>, anyhow::Error>;
    async fn set(&self, token: &SessionToken, user_id: &str) -> Result<(), anyhow::Error>;
    async fn remove(&self, token: &SessionToken) -> Result<(), anyhow::Error>;
    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

struct Binding {
    user_id: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Binding {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-process sessions. Without a TTL bindings live until removed; with one
/// they lapse like Redis keys set with `EX`.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, Binding>,
    ttl: Option<(Duration, Arc<dyn Clock>)>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Some((ttl, clock)),
        }
    }

    /// Bindings held, including lapsed ones not yet swept.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn now(&self) -> Option<DateTime<Utc>> {
        self.ttl.as_ref().map(|(_, clock)| clock.now())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, token: &SessionToken) -> Result<Option<String>, anyhow::Error> {
        if let Some(now) = self.now() {
            self.sessions
                .remove_if(token.as_str(), |_, binding| binding.is_expired(now));
        }
        Ok(self
            .sessions
            .get(token.as_str())
            .map(|binding| binding.user_id.clone()))
    }

    async fn set(&self, token: &SessionToken, user_id: &str) -> Result<(), anyhow::Error> {
        let expires_at = match &self.ttl {
            Some((ttl, clock)) => {
                let now = clock.now();
                // Sweep on write so abandoned sessions do not accumulate.
                self.sessions.retain(|_, binding| !binding.is_expired(now));
                Some(now + *ttl)
            }
            None => None,
        };
        self.sessions.insert(
            token.as_str().to_string(),
            Binding {
                user_id: user_id.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn remove(&self, token: &SessionToken) -> Result<(), anyhow::Error> {
        self.sessions.remove(token.as_str());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct RedisSessionStore {
    _client: Client,
    manager: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisSessionStore {
    pub async fn connect(url: &str, ttl_seconds: u64) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis session store");
        let client = Client::open(url)?;

        // ConnectionManager reconnects on its own
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
            ttl_seconds,
        })
    }

    fn key(token: &SessionToken) -> String {
        format!("session:{}", token.as_str())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, token: &SessionToken) -> Result<Option<String>, anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("GET")
            .arg(Self::key(token))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read session: {}", e))
    }

    async fn set(&self, token: &SessionToken, user_id: &str) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(Self::key(token))
            .arg(user_id)
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to write session: {}", e))
    }

    async fn remove(&self, token: &SessionToken) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(Self::key(token))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to remove session: {}", e))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}
