//! Key-addressed repository for users, organizations, applications and
//! LDAP servers.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use crate::models::{Application, Ldap, Organization, User, UserField, UserKey};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Record store lock poisoned")]
    Poisoned,

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Each call is atomic on its own. Inserts answer `false` on a duplicate key
/// instead of failing, so callers can treat the store as the authority on
/// uniqueness races.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_user(&self, key: &UserKey) -> StoreResult<Option<User>>;
    async fn get_user_by_id(&self, id: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_field(
        &self,
        owner: &str,
        field: UserField,
        value: &str,
    ) -> StoreResult<Option<User>>;
    /// Newest user of `owner` by `createdTime`, later insertion wins ties.
    async fn get_last_user(&self, owner: &str) -> StoreResult<Option<User>>;
    async fn add_user(&self, user: &User) -> StoreResult<bool>;
    async fn update_user(&self, key: &UserKey, user: &User) -> StoreResult<bool>;

    async fn get_organization(&self, owner: &str, name: &str) -> StoreResult<Option<Organization>>;
    async fn add_organization(&self, organization: &Organization) -> StoreResult<bool>;

    async fn get_application(&self, owner: &str, name: &str) -> StoreResult<Option<Application>>;
    async fn add_application(&self, application: &Application) -> StoreResult<bool>;

    async fn get_ldap(&self, id: &str) -> StoreResult<Option<Ldap>>;
    async fn add_ldap(&self, ldap: &Ldap) -> StoreResult<bool>;

    async fn health_check(&self) -> StoreResult<()>;
}
