//! Signup admission: a request either passes every check and yields exactly
//! one new user, or is rejected with nothing written.

use crate::dtos::SignupRequest;
use crate::models::{
    Application, Organization, SignupField, SignupRule, User, UserField, UserKey,
    NORMAL_USER_TYPE,
};
use crate::services::id_allocator::{IdAllocator, IdStrategy};
use crate::services::mirror::UserMirror;
use crate::services::session::{SessionAuthenticator, APPLICATION_OWNER};
use crate::services::session_store::SessionToken;
use crate::services::store::RecordStore;
use crate::services::verification::VerificationGate;
use crate::services::{metrics, Rejection, ServiceError};
use crate::utils::{
    format_timestamp, is_valid_email, is_valid_personal_name, is_valid_phone, seal_password,
    Clock, Password,
};
use std::sync::Arc;
use tracing::instrument;

#[derive(Clone)]
pub struct SignupService {
    store: Arc<dyn RecordStore>,
    gate: Arc<dyn VerificationGate>,
    allocator: IdAllocator,
    sessions: SessionAuthenticator,
    mirror: Arc<dyn UserMirror>,
    clock: Arc<dyn Clock>,
}

/// Full key the phone code is bound to.
pub fn phone_target(prefix: &str, phone: &str) -> String {
    format!("+{}{}", prefix, phone)
}

impl SignupService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gate: Arc<dyn VerificationGate>,
        allocator: IdAllocator,
        sessions: SessionAuthenticator,
        mirror: Arc<dyn UserMirror>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            gate,
            allocator,
            sessions,
            mirror,
            clock,
        }
    }

    #[instrument(skip(self, token, req), fields(application = %req.application, organization = %req.organization))]
    pub async fn signup(
        &self,
        token: &SessionToken,
        req: &SignupRequest,
    ) -> Result<UserKey, ServiceError> {
        let result = self.admit(token, req).await;
        match &result {
            Ok(key) => {
                metrics::record_signup("ok");
                tracing::info!(user_id = %key, "User signed up");
            }
            Err(ServiceError::Rejected(_)) | Err(ServiceError::NotFound(_)) => {
                metrics::record_signup("rejected");
            }
            Err(e) => {
                metrics::record_signup("failed");
                tracing::error!(error = %e, "Signup failed");
            }
        }
        result
    }

    async fn admit(&self, token: &SessionToken, req: &SignupRequest) -> Result<UserKey, ServiceError> {
        if let Some(current) = self.sessions.current_user(token).await? {
            return Err(Rejection::with_data(
                "Please sign out first before signing up",
                current.to_string(),
            )
            .into());
        }

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

        if !application.enable_sign_up {
            return Err(ServiceError::rejected(
                "The application does not allow to sign up new account",
            ));
        }

        if application.signup_item(SignupField::Email).enabled {
            if let Err(rejection) = self.gate.check(&req.email, &req.email_code).await {
                return Err(ServiceError::rejected(format!("Email{}", rejection)));
            }
        }

        let phone_target = phone_target(&req.phone_prefix, &req.phone);
        if application.signup_item(SignupField::Phone).enabled {
            if let Err(rejection) = self.gate.check(&phone_target, &req.phone_code).await {
                return Err(ServiceError::rejected(format!("Phone{}", rejection)));
            }
        }

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

        self.check_user_signup(&application, &organization, req)
            .await?;

        let id = self
            .allocator
            .next_id(IdStrategy::for_application(&application), &organization.name)
            .await?;
        let username = if application.signup_item(SignupField::Username).visible {
            req.username.clone()
        } else {
            id.clone()
        };

        let password = Password::new(req.password.clone());
        let user = User {
            owner: organization.name.clone(),
            name: username,
            id,
            created_time: format_timestamp(self.clock.now()),
            user_type: NORMAL_USER_TYPE.to_string(),
            password: seal_password(&password, organization.password_type)?,
            display_name: req.display_name.clone(),
            avatar: organization.default_avatar.clone(),
            email: req.email.clone(),
            phone: req.phone.clone(),
            affiliation: req.affiliation.clone(),
            is_admin: false,
            is_global_admin: false,
            is_forbidden: false,
            signup_application: application.name.clone(),
            signin_expire_time: String::new(),
            properties: Default::default(),
        };
        let key = user.key();

        // The insert is the authority on uniqueness when signups race.
        if !self.store.add_user(&user).await? {
            return Err(ServiceError::rejected(format!(
                "The user: {} already exists",
                key
            )));
        }

        self.spawn_mirror(user);

        if application.has_prompt_page() {
            self.sessions.set_session(token, &key).await?;
        }

        // Codes are spent whether or not their item was enabled.
        if !req.email.is_empty() {
            self.gate.disable(&req.email).await;
        }
        if !req.phone.is_empty() {
            self.gate.disable(&phone_target).await;
        }

        Ok(key)
    }

    fn spawn_mirror(&self, user: User) {
        let mirror = self.mirror.clone();
        tokio::spawn(async move {
            if let Err(e) = mirror.mirror_user(&user).await {
                tracing::warn!(user_id = %user.key(), error = %e, "Mirror write failed");
            }
        });
    }

    /// Field-level and uniqueness rules; the first violation wins.
    async fn check_user_signup(
        &self,
        application: &Application,
        organization: &Organization,
        req: &SignupRequest,
    ) -> Result<(), ServiceError> {
        let owner = organization.name.as_str();

        if application.signup_item(SignupField::Username).visible {
            if req.username.chars().count() < 2 {
                return Err(ServiceError::rejected(
                    "Username must have at least 2 characters",
                ));
            }
            if req.username.contains('/') {
                return Err(ServiceError::rejected("Username cannot contain \"/\""));
            }
            let existing = self
                .store
                .get_user(&UserKey::new(owner, req.username.clone()))
                .await?;
            if existing.is_some() {
                return Err(ServiceError::rejected("Username already exists"));
            }
        }

        if req.password.chars().count() < 6 {
            return Err(ServiceError::rejected(
                "Password must have at least 6 characters",
            ));
        }

        let email = application.signup_item(SignupField::Email);
        if email.visible {
            if email.required && req.email.is_empty() {
                return Err(ServiceError::rejected("Email cannot be empty"));
            }
            if !req.email.is_empty() {
                if !is_valid_email(&req.email) {
                    return Err(ServiceError::rejected("Email is invalid"));
                }
                if self.is_taken(owner, UserField::Email, &req.email).await? {
                    return Err(ServiceError::rejected("Email already exists"));
                }
            }
        }

        let phone = application.signup_item(SignupField::Phone);
        if phone.visible {
            if phone.required && req.phone.is_empty() {
                return Err(ServiceError::rejected("Phone cannot be empty"));
            }
            if !req.phone.is_empty() {
                if !is_valid_phone(&req.phone) {
                    return Err(ServiceError::rejected("Phone number is invalid"));
                }
                if self.is_taken(owner, UserField::Phone, &req.phone).await? {
                    return Err(ServiceError::rejected("Phone already exists"));
                }
            }
        }

        let display_name = application.signup_item(SignupField::DisplayName);
        if display_name.visible {
            if display_name.required && req.display_name.is_empty() {
                return Err(ServiceError::rejected("Display name cannot be empty"));
            }
            if display_name.rule == SignupRule::Personal
                && !req.display_name.is_empty()
                && !is_valid_personal_name(&req.display_name)
            {
                return Err(ServiceError::rejected("Display name is invalid"));
            }
        }

        let affiliation = application.signup_item(SignupField::Affiliation);
        if affiliation.visible && affiliation.required && req.affiliation.is_empty() {
            return Err(ServiceError::rejected("Affiliation cannot be blank"));
        }

        Ok(())
    }

    async fn is_taken(&self, owner: &str, field: UserField, value: &str) -> Result<bool, ServiceError> {
        Ok(self
            .store
            .find_user_by_field(owner, field, value)
            .await?
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignupItem;
    use crate::services::id_allocator::UuidGenerator;
    use crate::services::mirror::NoopMirror;
    use crate::services::session_store::{MemorySessionStore, SessionStore};
    use crate::services::store::MemoryStore;
    use crate::services::verification::CodeRegistry;
    use crate::utils::SystemClock;
    use chrono::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        sessions: Arc<MemorySessionStore>,
        gate: Arc<CodeRegistry>,
        service: SignupService,
    }

    async fn fixture(items: Vec<SignupItem>) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let gate = Arc::new(CodeRegistry::new(Duration::minutes(10), clock.clone()));

        store
            .add_organization(&Organization {
                owner: "admin".to_string(),
                name: "acme".to_string(),
                default_avatar: "https://cdn/default.png".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .add_application(&Application {
                owner: "admin".to_string(),
                name: "portal".to_string(),
                organization: "acme".to_string(),
                enable_sign_up: true,
                signup_items: items,
                ..Default::default()
            })
            .await
            .unwrap();

        let authenticator = SessionAuthenticator::new(store.clone(), sessions.clone(), clock.clone());
        let allocator = IdAllocator::new(store.clone(), Arc::new(UuidGenerator));
        let service = SignupService::new(
            store.clone(),
            gate.clone(),
            allocator,
            authenticator,
            Arc::new(NoopMirror),
            clock,
        );
        Fixture {
            store,
            sessions,
            gate,
            service,
        }
    }

    fn request(username: &str) -> SignupRequest {
        SignupRequest {
            application: "portal".to_string(),
            organization: "acme".to_string(),
            username: username.to_string(),
            password: "123456".to_string(),
            ..Default::default()
        }
    }

    fn rejection_msg(err: ServiceError) -> String {
        match err {
            ServiceError::Rejected(r) => r.msg,
            ServiceError::NotFound(msg) => msg,
            other => panic!("unexpected fault: {other}"),
        }
    }

    #[tokio::test]
    async fn creates_normal_user_with_organization_defaults() {
        let fx = fixture(vec![SignupItem::new(SignupField::Username)]).await;
        let key = fx
            .service
            .signup(&SessionToken::new("t"), &request("alice"))
            .await
            .unwrap();
        assert_eq!(key.to_string(), "acme/alice");

        let user = fx.store.get_user(&key).await.unwrap().unwrap();
        assert_eq!(user.user_type, "normal-user");
        assert_eq!(user.avatar, "https://cdn/default.png");
        assert_eq!(user.signup_application, "portal");
        assert!(!user.is_admin && !user.is_global_admin && !user.is_forbidden);
        assert!(!user.id.is_empty());
    }

    #[tokio::test]
    async fn signed_in_caller_is_told_who_they_are() {
        let fx = fixture(vec![SignupItem::new(SignupField::Username)]).await;
        let token = SessionToken::new("t");
        fx.service.signup(&token, &request("alice")).await.unwrap();
        fx.sessions.set(&token, "acme/alice").await.unwrap();

        let err = fx.service.signup(&token, &request("bob")).await.unwrap_err();
        match err {
            ServiceError::Rejected(r) => {
                assert_eq!(r.msg, "Please sign out first before signing up");
                assert_eq!(r.data.as_deref(), Some("acme/alice"));
            }
            other => panic!("unexpected: {other}"),
        }
        assert_eq!(fx.store.user_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_application_and_organization() {
        let fx = fixture(vec![]).await;
        let token = SessionToken::new("t");

        let mut req = request("alice");
        req.application = "nope".to_string();
        let err = fx.service.signup(&token, &req).await.unwrap_err();
        assert_eq!(rejection_msg(err), "The application: admin/nope does not exist");

        let mut req = request("alice");
        req.organization = "nope".to_string();
        let err = fx.service.signup(&token, &req).await.unwrap_err();
        assert_eq!(rejection_msg(err), "The organization: nope does not exist");
    }

    #[tokio::test]
    async fn hidden_username_takes_allocated_id() {
        let fx = fixture(vec![
            SignupItem::new(SignupField::Username).hidden(),
            SignupItem::new(SignupField::Id).with_rule(SignupRule::Incremental),
        ])
        .await;

        let key = fx
            .service
            .signup(&SessionToken::new("t"), &request("ignored"))
            .await
            .unwrap();
        assert_eq!(key.to_string(), "acme/1");

        let key = fx
            .service
            .signup(&SessionToken::new("u"), &request("ignored"))
            .await
            .unwrap();
        assert_eq!(key.to_string(), "acme/2");
    }

    #[tokio::test]
    async fn field_rules_reject_in_order() {
        let fx = fixture(vec![
            SignupItem::new(SignupField::Username),
            SignupItem::new(SignupField::DisplayName).with_rule(SignupRule::Personal),
            SignupItem::new(SignupField::Affiliation).required(),
        ])
        .await;
        let token = SessionToken::new("t");

        let mut short_name = request("a");
        short_name.password = "1".to_string();
        let mut slash = request("a/b");
        slash.password = "1".to_string();
        let mut weak = request("alice");
        weak.password = "12345".to_string();
        let mut droid = request("alice");
        droid.display_name = "R2-D2".to_string();
        let no_affiliation = request("alice");

        let cases = [
            (short_name, "Username must have at least 2 characters"),
            (slash, "Username cannot contain \"/\""),
            (weak, "Password must have at least 6 characters"),
            (droid, "Display name is invalid"),
            (no_affiliation, "Affiliation cannot be blank"),
        ];
        for (req, expected) in cases {
            let err = fx.service.signup(&token, &req).await.unwrap_err();
            assert_eq!(rejection_msg(err), expected);
        }
        assert_eq!(fx.store.user_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicates_are_rejections() {
        let fx = fixture(vec![SignupItem::new(SignupField::Username)]).await;

        fx.service
            .signup(&SessionToken::new("t"), &request("alice"))
            .await
            .unwrap();
        let err = fx
            .service
            .signup(&SessionToken::new("u"), &request("alice"))
            .await
            .unwrap_err();
        assert_eq!(rejection_msg(err), "Username already exists");
    }

    #[tokio::test]
    async fn email_gate_decides_admission() {
        let fx = fixture(vec![
            SignupItem::new(SignupField::Username),
            SignupItem::new(SignupField::Email).required(),
        ])
        .await;
        let code = fx.gate.issue("alice@example.com").unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        let mut req = request("alice");
        req.email = "alice@example.com".to_string();
        req.email_code = wrong.to_string();
        let err = fx
            .service
            .signup(&SessionToken::new("t"), &req)
            .await
            .unwrap_err();
        assert_eq!(rejection_msg(err), "Email code is wrong");
        assert_eq!(fx.store.user_count().unwrap(), 0);

        req.email_code = code.clone();
        fx.service.signup(&SessionToken::new("t"), &req).await.unwrap();

        // Spent after use.
        assert!(fx.gate.check("alice@example.com", &code).await.is_err());
    }

    #[tokio::test]
    async fn phone_gate_uses_prefixed_target() {
        let fx = fixture(vec![
            SignupItem::new(SignupField::Username),
            SignupItem::new(SignupField::Phone),
        ])
        .await;
        let code = fx.gate.issue("+8613800138000").unwrap();

        let mut req = request("alice");
        req.phone = "13800138000".to_string();
        req.phone_prefix = "86".to_string();
        req.phone_code = code;
        let key = fx
            .service
            .signup(&SessionToken::new("t"), &req)
            .await
            .unwrap();

        let user = fx.store.get_user(&key).await.unwrap().unwrap();
        assert_eq!(user.phone, "13800138000");
    }

    #[tokio::test]
    async fn prompt_page_establishes_session() {
        let fx = fixture(vec![
            SignupItem::new(SignupField::Username),
            SignupItem::new(SignupField::Affiliation).prompted(),
        ])
        .await;
        let token = SessionToken::new("t");

        fx.service.signup(&token, &request("alice")).await.unwrap();
        assert_eq!(
            fx.sessions.get(&token).await.unwrap().as_deref(),
            Some("acme/alice")
        );
    }

    #[tokio::test]
    async fn codes_for_submitted_targets_are_spent_even_when_ungated() {
        let fx = fixture(vec![SignupItem::new(SignupField::Username)]).await;
        let code = fx.gate.issue("alice@example.com").unwrap();

        let mut req = request("alice");
        req.email = "alice@example.com".to_string();
        fx.service.signup(&SessionToken::new("t"), &req).await.unwrap();

        assert!(fx.gate.check("alice@example.com", &code).await.is_err());
        assert!(fx.sessions.is_empty());
    }
}
