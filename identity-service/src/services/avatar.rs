//! Avatar ingestion from `data:image/png;base64,...` payloads.

use crate::models::UserKey;
use crate::services::store::RecordStore;
use crate::services::ServiceError;
use crate::utils::{unix_nanos, Clock};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::path::PathBuf;
use std::sync::Arc;

pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64";
pub const FILE_ENCODING_ERROR: &str = "File encoding error";

#[async_trait]
pub trait AvatarStorage: Send + Sync {
    async fn store_avatar(&self, user: &UserKey, bytes: &[u8]) -> Result<(), anyhow::Error>;
    /// Public URL prefix, ending in `/`, that stored avatars are served under.
    fn avatar_base_path(&self) -> String;
}

/// Writes `{dir}/{owner}/{name}.png`.
pub struct LocalAvatarStorage {
    dir: PathBuf,
    base_url: String,
}

impl LocalAvatarStorage {
    pub fn new(dir: impl Into<PathBuf>, base_url: &str) -> Self {
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            dir: dir.into(),
            base_url,
        }
    }

    pub fn path_for(&self, user: &UserKey) -> PathBuf {
        self.dir.join(&user.owner).join(format!("{}.png", user.name))
    }
}

#[async_trait]
impl AvatarStorage for LocalAvatarStorage {
    async fn store_avatar(&self, user: &UserKey, bytes: &[u8]) -> Result<(), anyhow::Error> {
        let path = self.path_for(user);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to write avatar {}: {}", path.display(), e))
    }

    fn avatar_base_path(&self) -> String {
        self.base_url.clone()
    }
}

/// Split a PNG data URI into its decoded bytes.
pub fn decode_png_data_uri(data_uri: &str) -> Option<Vec<u8>> {
    let (prefix, payload) = data_uri.split_once(',')?;
    if prefix != PNG_DATA_URI_PREFIX {
        return None;
    }
    STANDARD.decode(payload.trim()).ok()
}

#[derive(Clone)]
pub struct AvatarService {
    store: Arc<dyn RecordStore>,
    storage: Arc<dyn AvatarStorage>,
    clock: Arc<dyn Clock>,
}

impl AvatarService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        storage: Arc<dyn AvatarStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            storage,
            clock,
        }
    }

    /// Store the avatar and point the user at it. Returns the new URL.
    pub async fn upload(&self, key: &UserKey, data_uri: &str) -> Result<String, ServiceError> {
        let bytes = decode_png_data_uri(data_uri)
            .ok_or_else(|| ServiceError::rejected(FILE_ENCODING_ERROR))?;

        let mut user = self
            .store
            .get_user(key)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("The user: {} doesn't exist", key)))?;

        self.storage.store_avatar(key, &bytes).await?;

        user.avatar = format!(
            "{}{}.png?time={}",
            self.storage.avatar_base_path(),
            key,
            unix_nanos(self.clock.now())
        );
        if !self.store.update_user(key, &user).await? {
            return Err(ServiceError::NotFound(format!(
                "The user: {} doesn't exist",
                key
            )));
        }

        tracing::info!(user_id = %key, size = bytes.len(), "Avatar updated");
        Ok(user.avatar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_png_data_uris_decode() {
        assert_eq!(
            decode_png_data_uri("data:image/png;base64,aGVsbG8="),
            Some(b"hello".to_vec())
        );
        assert_eq!(decode_png_data_uri("data:image/jpeg;base64,aGVsbG8="), None);
        assert_eq!(decode_png_data_uri("data:image/png;base64"), None);
        assert_eq!(decode_png_data_uri("data:image/png;base64,@@@"), None);
    }

    #[test]
    fn local_paths_nest_owner_then_name() {
        let storage = LocalAvatarStorage::new("/var/avatars", "http://cdn.local/avatars");
        assert_eq!(
            storage.path_for(&UserKey::new("acme", "alice")),
            PathBuf::from("/var/avatars/acme/alice.png")
        );
        assert_eq!(storage.avatar_base_path(), "http://cdn.local/avatars/");
    }
}
