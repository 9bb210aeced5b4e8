//! Built-in records every deployment starts with. Safe to run on every boot.

use crate::models::{
    Application, Ldap, Organization, PasswordType, SignupField, SignupItem, User, UserKey,
    NORMAL_USER_TYPE,
};
use crate::services::id_allocator::IdGenerator;
use crate::services::session::APPLICATION_OWNER;
use crate::services::store::{RecordStore, StoreResult};
use crate::utils::{format_timestamp, Clock};

pub const BUILT_IN_ORGANIZATION: &str = "built-in";
pub const BUILT_IN_ADMIN: &str = "admin";
pub const BUILT_IN_APPLICATION: &str = "app-built-in";
pub const BUILT_IN_LDAP: &str = "ldap-built-in";
pub const BUILT_IN_AVATAR: &str = "https://casbin.org/img/casbin.svg";

pub struct Bootstrap<'a> {
    pub store: &'a dyn RecordStore,
    pub clock: &'a dyn Clock,
    pub ids: &'a dyn IdGenerator,
    pub admin_password: &'a str,
}

impl Bootstrap<'_> {
    pub async fn run(&self) -> StoreResult<()> {
        let now = format_timestamp(self.clock.now());
        self.organization(&now).await?;
        self.admin_user(&now).await?;
        self.application(&now).await?;
        self.ldap().await?;
        Ok(())
    }

    async fn organization(&self, now: &str) -> StoreResult<()> {
        if self
            .store
            .get_organization(APPLICATION_OWNER, BUILT_IN_ORGANIZATION)
            .await?
            .is_some()
        {
            return Ok(());
        }

        self.store
            .add_organization(&Organization {
                owner: APPLICATION_OWNER.to_string(),
                name: BUILT_IN_ORGANIZATION.to_string(),
                created_time: now.to_string(),
                display_name: "Built-in Organization".to_string(),
                website_url: "https://example.com".to_string(),
                default_avatar: BUILT_IN_AVATAR.to_string(),
                password_type: PasswordType::Plain,
            })
            .await?;
        tracing::info!(organization = BUILT_IN_ORGANIZATION, "Created built-in organization");
        Ok(())
    }

    async fn admin_user(&self, now: &str) -> StoreResult<()> {
        let key = UserKey::new(BUILT_IN_ORGANIZATION, BUILT_IN_ADMIN);
        if self.store.get_user(&key).await?.is_some() {
            return Ok(());
        }

        self.store
            .add_user(&User {
                owner: key.owner.clone(),
                name: key.name.clone(),
                id: self.ids.generate_id(),
                created_time: now.to_string(),
                user_type: NORMAL_USER_TYPE.to_string(),
                // The built-in organization stores plain passwords.
                password: self.admin_password.to_string(),
                display_name: "Admin".to_string(),
                avatar: BUILT_IN_AVATAR.to_string(),
                email: "admin@example.com".to_string(),
                phone: "12345678910".to_string(),
                affiliation: "Example Inc.".to_string(),
                is_admin: true,
                is_global_admin: true,
                ..Default::default()
            })
            .await?;
        tracing::info!(user_id = %key, "Created built-in admin user");
        Ok(())
    }

    async fn application(&self, now: &str) -> StoreResult<()> {
        if self
            .store
            .get_application(APPLICATION_OWNER, BUILT_IN_APPLICATION)
            .await?
            .is_some()
        {
            return Ok(());
        }

        self.store
            .add_application(&Application {
                owner: APPLICATION_OWNER.to_string(),
                name: BUILT_IN_APPLICATION.to_string(),
                created_time: now.to_string(),
                display_name: "Identity".to_string(),
                logo: String::new(),
                homepage_url: "https://example.com".to_string(),
                organization: BUILT_IN_ORGANIZATION.to_string(),
                enable_password: true,
                enable_sign_up: true,
                providers: Vec::new(),
                signup_items: vec![
                    SignupItem::new(SignupField::Id).hidden(),
                    SignupItem::new(SignupField::Username).required(),
                    SignupItem::new(SignupField::DisplayName),
                    SignupItem::new(SignupField::Password).required(),
                ],
                redirect_uris: Vec::new(),
                expire_in_hours: 168,
            })
            .await?;
        tracing::info!(application = BUILT_IN_APPLICATION, "Created built-in application");
        Ok(())
    }

    async fn ldap(&self) -> StoreResult<()> {
        if self.store.get_ldap(BUILT_IN_LDAP).await?.is_some() {
            return Ok(());
        }

        self.store
            .add_ldap(&Ldap {
                id: BUILT_IN_LDAP.to_string(),
                owner: BUILT_IN_ORGANIZATION.to_string(),
                server_name: "Built-in LDAP Server".to_string(),
                host: "example.com".to_string(),
                port: 389,
                admin: "cn=buildin,dc=example,dc=com".to_string(),
                passwd: "123".to_string(),
                base_dn: "ou=BuildIn,dc=example,dc=com".to_string(),
                auto_sync: 0,
                last_sync: String::new(),
            })
            .await?;
        tracing::info!(ldap = BUILT_IN_LDAP, "Created built-in LDAP server");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::id_allocator::UuidGenerator;
    use crate::services::store::MemoryStore;
    use crate::utils::SystemClock;

    #[tokio::test]
    async fn creates_once_and_keeps_existing() {
        let store = MemoryStore::new();
        let bootstrap = Bootstrap {
            store: &store,
            clock: &SystemClock,
            ids: &UuidGenerator,
            admin_password: "123",
        };

        bootstrap.run().await.unwrap();
        let admin_key = UserKey::new(BUILT_IN_ORGANIZATION, BUILT_IN_ADMIN);
        let admin = store.get_user(&admin_key).await.unwrap().unwrap();
        assert!(admin.is_admin && admin.is_global_admin);

        bootstrap.run().await.unwrap();
        assert_eq!(store.user_count().unwrap(), 1);
        assert_eq!(store.get_user(&admin_key).await.unwrap().unwrap().id, admin.id);

        let app = store
            .get_application(APPLICATION_OWNER, BUILT_IN_APPLICATION)
            .await
            .unwrap()
            .unwrap();
        assert!(app.enable_sign_up);
        assert_eq!(app.expire_in_hours, 168);
        assert!(store.get_ldap(BUILT_IN_LDAP).await.unwrap().is_some());
    }
}
