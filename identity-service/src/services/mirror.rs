//! Best-effort copy of new users into a legacy store.

use crate::models::User;
use async_trait::async_trait;
use std::time::Duration;
use tracing::instrument;

#[async_trait]
pub trait UserMirror: Send + Sync {
    async fn mirror_user(&self, user: &User) -> Result<(), anyhow::Error>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMirror;

#[async_trait]
impl UserMirror for NoopMirror {
    async fn mirror_user(&self, _user: &User) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

/// POSTs each new user as JSON to a legacy endpoint.
#[derive(Clone)]
pub struct HttpUserMirror {
    client: reqwest::Client,
    url: String,
}

impl HttpUserMirror {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build mirror HTTP client: {}", e))?;

        tracing::info!(url = %url, "User mirror configured");
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl UserMirror for HttpUserMirror {
    #[instrument(skip(self, user), fields(user_id = %user.key()))]
    async fn mirror_user(&self, user: &User) -> Result<(), anyhow::Error> {
        self.client
            .post(&self.url)
            .json(user)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Mirror request failed: {}", e))?
            .error_for_status()
            .map_err(|e| anyhow::anyhow!("Mirror rejected user: {}", e))?;
        Ok(())
    }
}
