use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How user passwords are stored for an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PasswordType {
    #[default]
    Plain,
    Argon2,
}

/// Tenant configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Organization {
    #[schema(example = "admin")]
    pub owner: String,
    #[schema(example = "built-in")]
    pub name: String,
    pub created_time: String,
    #[schema(example = "Built-in Organization")]
    pub display_name: String,
    pub website_url: String,
    /// Avatar URL given to users created by signup.
    pub default_avatar: String,
    pub password_type: PasswordType,
}
