use super::{RecordStore, StoreError, StoreResult};
use crate::models::{Application, Ldap, Organization, User, UserField, UserKey};
use async_trait::async_trait;
use mongodb::{
    bson::{self, doc, Document},
    error::{ErrorKind, WriteFailure},
    options::{FindOneOptions, IndexOptions},
    Client, Collection, Database, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, anyhow::Error> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = Client::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to create MongoDB client: {}", e);
            anyhow::anyhow!("Failed to connect to MongoDB: {}", e)
        })?;

        let store = Self {
            db: client.database(database),
        };
        store.ensure_indexes().await?;
        tracing::info!("Successfully connected to MongoDB");
        Ok(store)
    }

    async fn ensure_indexes(&self) -> StoreResult<()> {
        let owner_name = doc! { "owner": 1, "name": 1 };
        unique_index(&self.users(), owner_name.clone()).await?;
        unique_index(&self.users(), doc! { "id": 1 }).await?;
        unique_index(&self.organizations(), owner_name.clone()).await?;
        unique_index(&self.applications(), owner_name).await?;
        unique_index(&self.ldaps(), doc! { "id": 1 }).await?;
        Ok(())
    }

    fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    fn organizations(&self) -> Collection<Organization> {
        self.db.collection("organizations")
    }

    fn applications(&self) -> Collection<Application> {
        self.db.collection("applications")
    }

    fn ldaps(&self) -> Collection<Ldap> {
        self.db.collection("ldaps")
    }
}

async fn unique_index<T>(collection: &Collection<T>, keys: Document) -> StoreResult<()>
where
    T: Send + Sync,
{
    let options = IndexOptions::builder().unique(true).build();
    let model = IndexModel::builder().keys(keys).options(options).build();
    collection.create_index(model, None).await?;
    Ok(())
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

async fn insert<T>(collection: &Collection<T>, record: &T) -> StoreResult<bool>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    match collection.insert_one(record, None).await {
        Ok(_) => Ok(true),
        Err(e) if is_duplicate_key(&e) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn owner_name(owner: &str, name: &str) -> Document {
    doc! { "owner": owner, "name": name }
}

#[async_trait]
impl RecordStore for MongoStore {
    async fn get_user(&self, key: &UserKey) -> StoreResult<Option<User>> {
        Ok(self
            .users()
            .find_one(owner_name(&key.owner, &key.name), None)
            .await?)
    }

    async fn get_user_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.users().find_one(doc! { "id": id }, None).await?)
    }

    async fn find_user_by_field(
        &self,
        owner: &str,
        field: UserField,
        value: &str,
    ) -> StoreResult<Option<User>> {
        let filter = doc! { "owner": owner, field.as_str(): value };
        Ok(self.users().find_one(filter, None).await?)
    }

    async fn get_last_user(&self, owner: &str) -> StoreResult<Option<User>> {
        // ObjectIds grow with insertion, so they break createdTime ties.
        let options = FindOneOptions::builder()
            .sort(doc! { "createdTime": -1, "_id": -1 })
            .build();
        Ok(self.users().find_one(doc! { "owner": owner }, options).await?)
    }

    async fn add_user(&self, user: &User) -> StoreResult<bool> {
        insert(&self.users(), user).await
    }

    async fn update_user(&self, key: &UserKey, user: &User) -> StoreResult<bool> {
        let mut fields =
            bson::to_document(user).map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
        fields.remove("id");

        let result = self
            .users()
            .update_one(owner_name(&key.owner, &key.name), doc! { "$set": fields }, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn get_organization(&self, owner: &str, name: &str) -> StoreResult<Option<Organization>> {
        Ok(self
            .organizations()
            .find_one(owner_name(owner, name), None)
            .await?)
    }

    async fn add_organization(&self, organization: &Organization) -> StoreResult<bool> {
        insert(&self.organizations(), organization).await
    }

    async fn get_application(&self, owner: &str, name: &str) -> StoreResult<Option<Application>> {
        Ok(self
            .applications()
            .find_one(owner_name(owner, name), None)
            .await?)
    }

    async fn add_application(&self, application: &Application) -> StoreResult<bool> {
        application
            .validate()
            .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
        insert(&self.applications(), application).await
    }

    async fn get_ldap(&self, id: &str) -> StoreResult<Option<Ldap>> {
        Ok(self.ldaps().find_one(doc! { "id": id }, None).await?)
    }

    async fn add_ldap(&self, ldap: &Ldap) -> StoreResult<bool> {
        insert(&self.ldaps(), ldap).await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.db.run_command(doc! { "ping": 1 }, None).await.map_err(|e| {
            tracing::error!("Database health check failed: {}", e);
            StoreError::Mongo(e)
        })?;
        Ok(())
    }
}
