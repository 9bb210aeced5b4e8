//! User records and the `owner/name` key that addresses them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

pub const NORMAL_USER_TYPE: &str = "normal-user";

/// `owner/name` composite that identifies a user across the system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserKey {
    pub owner: String,
    pub name: String,
}

impl UserKey {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("user id must have the form owner/name")]
pub struct InvalidUserKey;

impl FromStr for UserKey {
    type Err = InvalidUserKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => {
                Ok(UserKey::new(owner, name))
            }
            _ => Err(InvalidUserKey),
        }
    }
}

/// Identity record, persisted and served in camelCase.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    #[schema(example = "built-in")]
    pub owner: String,
    #[schema(example = "alice")]
    pub name: String,
    /// Immutable, unique across all organizations.
    #[schema(example = "0b1c2d3e-4f50-6172-8394-a5b6c7d8e9f0")]
    pub id: String,
    #[schema(example = "2024-05-01T12:30:00Z")]
    pub created_time: String,
    #[serde(rename = "type")]
    #[schema(example = "normal-user")]
    pub user_type: String,
    pub password: String,
    pub display_name: String,
    pub avatar: String,
    pub email: String,
    pub phone: String,
    pub affiliation: String,
    pub is_admin: bool,
    pub is_global_admin: bool,
    pub is_forbidden: bool,
    pub signup_application: String,
    /// Empty when no expiry is recorded, otherwise an RFC3339 deadline.
    pub signin_expire_time: String,
    pub properties: HashMap<String, String>,
}

impl User {
    pub fn key(&self) -> UserKey {
        UserKey::new(self.owner.clone(), self.name.clone())
    }

    /// Copy safe to hand to clients.
    pub fn masked(&self) -> User {
        let mut user = self.clone();
        if !user.password.is_empty() {
            user.password = "***".to_string();
        }
        user
    }
}

/// User attributes that must be unique inside an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Name,
    Email,
    Phone,
}

impl UserField {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserField::Name => "name",
            UserField::Email => "email",
            UserField::Phone => "phone",
        }
    }

    pub fn value_of<'a>(&self, user: &'a User) -> &'a str {
        match self {
            UserField::Name => &user.name,
            UserField::Email => &user.email,
            UserField::Phone => &user.phone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_key_round_trips_through_display() {
        let key: UserKey = "built-in/alice".parse().unwrap();
        assert_eq!(key, UserKey::new("built-in", "alice"));
        assert_eq!(key.to_string(), "built-in/alice");
    }

    #[test]
    fn user_key_requires_separator_and_both_halves() {
        assert!("alice".parse::<UserKey>().is_err());
        assert!("/alice".parse::<UserKey>().is_err());
        assert!("built-in/".parse::<UserKey>().is_err());
    }

    #[test]
    fn serializes_in_camel_case() {
        let user = User {
            owner: "built-in".to_string(),
            name: "alice".to_string(),
            user_type: NORMAL_USER_TYPE.to_string(),
            signin_expire_time: "2024-05-01T12:30:00Z".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["type"], "normal-user");
        assert_eq!(json["signinExpireTime"], "2024-05-01T12:30:00Z");
        assert_eq!(json["isGlobalAdmin"], false);
    }

    #[test]
    fn masked_hides_password_only() {
        let user = User {
            name: "alice".to_string(),
            password: "secret".to_string(),
            ..Default::default()
        };
        let masked = user.masked();
        assert_eq!(masked.password, "***");
        assert_eq!(masked.name, "alice");
    }
}
