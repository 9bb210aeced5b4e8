//! Session lifecycle: `Anonymous -> Active(user) -> Anonymous`, with expiry
//! applied lazily whenever the session is read.

use crate::dtos::LoginRequest;
use crate::models::UserKey;
use crate::services::session_store::{SessionStore, SessionToken};
use crate::services::store::RecordStore;
use crate::services::{metrics, ServiceError};
use crate::utils::{format_timestamp, is_expired, verify_password, Clock, Password};
use chrono::Duration;
use std::sync::Arc;

/// Organization that owns every application record.
pub const APPLICATION_OWNER: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Active(UserKey),
    /// The session was live until this read found its deadline passed.
    Expired(UserKey),
}

#[derive(Clone)]
pub struct SessionAuthenticator {
    store: Arc<dyn RecordStore>,
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl SessionAuthenticator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            sessions,
            clock,
        }
    }

    pub async fn current_user(&self, token: &SessionToken) -> Result<Option<UserKey>, ServiceError> {
        Ok(match self.current_state(token).await? {
            SessionState::Active(key) => Some(key),
            SessionState::Anonymous | SessionState::Expired(_) => None,
        })
    }

    /// Resolve the session behind `token`. A stale or dangling session is not
    /// an error, it reads as anonymous.
    pub async fn current_state(&self, token: &SessionToken) -> Result<SessionState, ServiceError> {
        let Some(user_id) = self.sessions.get(token).await.map_err(ServiceError::Session)? else {
            return Ok(SessionState::Anonymous);
        };

        let Ok(key) = user_id.parse::<UserKey>() else {
            tracing::debug!(user_id = %user_id, "Session value is not an owner/name pair");
            return Ok(SessionState::Anonymous);
        };

        let Some(mut user) = self.store.get_user(&key).await? else {
            tracing::debug!(user_id = %key, "Session refers to a missing user");
            return Ok(SessionState::Anonymous);
        };

        if user.signin_expire_time.is_empty() {
            return Ok(SessionState::Active(key));
        }

        // An unreadable deadline counts as passed.
        let expired = is_expired(&user.signin_expire_time, self.clock.now()).unwrap_or(true);
        if !expired {
            return Ok(SessionState::Active(key));
        }

        user.signin_expire_time.clear();
        if !self.store.update_user(&key, &user).await? {
            tracing::warn!(user_id = %key, "User vanished while clearing its sign-in expiry");
        }
        self.clear_session(token).await?;
        metrics::record_session_expired();
        tracing::info!(user_id = %key, "Session expired");
        Ok(SessionState::Expired(key))
    }

    pub async fn set_session(&self, token: &SessionToken, key: &UserKey) -> Result<(), ServiceError> {
        self.sessions
            .set(token, &key.to_string())
            .await
            .map_err(ServiceError::Session)
    }

    pub async fn clear_session(&self, token: &SessionToken) -> Result<(), ServiceError> {
        self.sessions.remove(token).await.map_err(ServiceError::Session)
    }

    /// Password sign-in through an application. Records the sign-in deadline
    /// on the user and binds `token` to it.
    pub async fn sign_in(
        &self,
        token: &SessionToken,
        req: &LoginRequest,
    ) -> Result<UserKey, ServiceError> {
        let application = self
            .store
            .get_application(APPLICATION_OWNER, &req.application)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "The application: {}/{} does not exist",
                    APPLICATION_OWNER, req.application
                ))
            })?;

        let organization = self
            .store
            .get_organization(APPLICATION_OWNER, &req.organization)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "The organization: {} does not exist",
                    req.organization
                ))
            })?;

        let key = UserKey::new(req.organization.clone(), req.username.clone());
        let mut user = self
            .store
            .get_user(&key)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("The user: {} doesn't exist", key)))?;

        if user.is_forbidden {
            tracing::warn!(user_id = %key, "Forbidden user attempted to sign in");
            return Err(ServiceError::rejected(
                "The user is forbidden to sign in, please contact the administrator",
            ));
        }

        let password = Password::new(req.password.clone());
        if !verify_password(&password, &user.password, organization.password_type) {
            metrics::record_signin("rejected");
            tracing::warn!(user_id = %key, "Sign-in with wrong password");
            return Err(ServiceError::rejected("Password is wrong"));
        }

        user.signin_expire_time = if application.expire_in_hours == 0 {
            String::new()
        } else {
            let hours = Duration::hours(i64::from(application.expire_in_hours));
            format_timestamp(self.clock.now() + hours)
        };
        self.store.update_user(&key, &user).await?;
        self.set_session(token, &key).await?;

        metrics::record_signin("ok");
        tracing::info!(user_id = %key, application = %application.name, "User signed in");
        Ok(key)
    }

    /// End the session and report who held it. Only a live session names
    /// its user; expired or dangling ones are dropped and yield `None`.
    pub async fn logout(&self, token: &SessionToken) -> Result<Option<UserKey>, ServiceError> {
        match self.current_state(token).await? {
            SessionState::Active(key) => {
                self.clear_session(token).await?;
                tracing::info!(user_id = %key, "User signed out");
                Ok(Some(key))
            }
            // Expiry already cleared the binding and the deadline.
            SessionState::Expired(_) => Ok(None),
            SessionState::Anonymous => {
                self.clear_session(token).await?;
                Ok(None)
            }
        }
    }
}
