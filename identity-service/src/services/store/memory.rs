use super::{RecordStore, StoreError, StoreResult};
use crate::models::{Application, Ldap, Organization, User, UserField, UserKey};
use crate::utils::parse_timestamp;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Tables {
    /// Insertion order is kept so ties on `createdTime` resolve to the later user.
    users: Vec<User>,
    organizations: HashMap<(String, String), Organization>,
    applications: HashMap<(String, String), Application>,
    ldaps: HashMap<String, Ldap>,
}

/// In-process record store for tests and single-node deployments.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }

    pub fn user_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.users.len())
    }
}

fn key_of(owner: &str, name: &str) -> (String, String) {
    (owner.to_string(), name.to_string())
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_user(&self, key: &UserKey) -> StoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .iter()
            .find(|u| u.owner == key.owner && u.name == key.name)
            .cloned())
    }

    async fn get_user_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_field(
        &self,
        owner: &str,
        field: UserField,
        value: &str,
    ) -> StoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .iter()
            .find(|u| u.owner == owner && field.value_of(u) == value)
            .cloned())
    }

    async fn get_last_user(&self, owner: &str) -> StoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .iter()
            .filter(|u| u.owner == owner)
            .max_by_key(|u| parse_timestamp(&u.created_time).ok())
            .cloned())
    }

    async fn add_user(&self, user: &User) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let taken = tables.users.iter().any(|u| {
            (u.owner == user.owner && u.name == user.name) || (!user.id.is_empty() && u.id == user.id)
        });
        if taken {
            return Ok(false);
        }
        tables.users.push(user.clone());
        Ok(true)
    }

    async fn update_user(&self, key: &UserKey, user: &User) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let Some(existing) = tables
            .users
            .iter_mut()
            .find(|u| u.owner == key.owner && u.name == key.name)
        else {
            return Ok(false);
        };

        let id = std::mem::take(&mut existing.id);
        *existing = User {
            id,
            ..user.clone()
        };
        Ok(true)
    }

    async fn get_organization(&self, owner: &str, name: &str) -> StoreResult<Option<Organization>> {
        Ok(self.read()?.organizations.get(&key_of(owner, name)).cloned())
    }

    async fn add_organization(&self, organization: &Organization) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let key = key_of(&organization.owner, &organization.name);
        if tables.organizations.contains_key(&key) {
            return Ok(false);
        }
        tables.organizations.insert(key, organization.clone());
        Ok(true)
    }

    async fn get_application(&self, owner: &str, name: &str) -> StoreResult<Option<Application>> {
        Ok(self.read()?.applications.get(&key_of(owner, name)).cloned())
    }

    async fn add_application(&self, application: &Application) -> StoreResult<bool> {
        application
            .validate()
            .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;

        let mut tables = self.write()?;
        let key = key_of(&application.owner, &application.name);
        if tables.applications.contains_key(&key) {
            return Ok(false);
        }
        tables.applications.insert(key, application.clone());
        Ok(true)
    }

    async fn get_ldap(&self, id: &str) -> StoreResult<Option<Ldap>> {
        Ok(self.read()?.ldaps.get(id).cloned())
    }

    async fn add_ldap(&self, ldap: &Ldap) -> StoreResult<bool> {
        let mut tables = self.write()?;
        if tables.ldaps.contains_key(&ldap.id) {
            return Ok(false);
        }
        tables.ldaps.insert(ldap.id.clone(), ldap.clone());
        Ok(true)
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }
}
