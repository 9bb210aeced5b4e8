use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Directory server an organization synchronizes users from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Ldap {
    pub id: String,
    pub owner: String,
    pub server_name: String,
    pub host: String,
    pub port: u16,
    pub admin: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub passwd: String,
    pub base_dn: String,
    /// Sync interval in minutes, 0 disables automatic sync.
    pub auto_sync: u32,
    pub last_sync: String,
}
