//! Signup and signin policy bound to one organization.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;

/// Fields an application can configure on its signup form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum SignupField {
    #[serde(rename = "ID")]
    Id,
    #[serde(rename = "Username")]
    Username,
    #[serde(rename = "Display name")]
    DisplayName,
    #[serde(rename = "Password")]
    Password,
    #[serde(rename = "Email")]
    Email,
    #[serde(rename = "Phone")]
    Phone,
    #[serde(rename = "Affiliation")]
    Affiliation,
}

impl SignupField {
    pub fn label(&self) -> &'static str {
        match self {
            SignupField::Id => "ID",
            SignupField::Username => "Username",
            SignupField::DisplayName => "Display name",
            SignupField::Password => "Password",
            SignupField::Email => "Email",
            SignupField::Phone => "Phone",
            SignupField::Affiliation => "Affiliation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum SignupRule {
    #[default]
    None,
    Random,
    Incremental,
    Personal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupItem {
    pub name: SignupField,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub prompted: bool,
    #[serde(default)]
    pub rule: SignupRule,
}

impl SignupItem {
    pub fn new(name: SignupField) -> Self {
        Self {
            name,
            visible: true,
            required: false,
            prompted: false,
            rule: SignupRule::None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn prompted(mut self) -> Self {
        self.prompted = true;
        self
    }

    pub fn with_rule(mut self, rule: SignupRule) -> Self {
        self.rule = rule;
        self
    }
}

/// Resolved policy for one field. Unconfigured fields resolve to the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignupItemPolicy {
    pub enabled: bool,
    pub visible: bool,
    pub required: bool,
    pub prompted: bool,
    pub rule: SignupRule,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderItem {
    pub name: String,
    pub can_sign_up: bool,
    pub can_sign_in: bool,
    pub prompted: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Application {
    #[schema(example = "admin")]
    pub owner: String,
    #[schema(example = "app-built-in")]
    pub name: String,
    pub created_time: String,
    pub display_name: String,
    pub logo: String,
    pub homepage_url: String,
    #[schema(example = "built-in")]
    pub organization: String,
    pub enable_password: bool,
    pub enable_sign_up: bool,
    pub providers: Vec<ProviderItem>,
    pub signup_items: Vec<SignupItem>,
    pub redirect_uris: Vec<String>,
    /// Signin lifetime; 0 leaves sessions without a recorded expiry.
    pub expire_in_hours: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("signup item {0} is configured more than once")]
pub struct DuplicateSignupItem(pub &'static str);

impl Application {
    pub fn signup_item(&self, field: SignupField) -> SignupItemPolicy {
        self.signup_items
            .iter()
            .find(|item| item.name == field)
            .map(|item| SignupItemPolicy {
                enabled: true,
                visible: item.visible,
                required: item.required,
                prompted: item.prompted,
                rule: item.rule,
            })
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), DuplicateSignupItem> {
        let mut seen = HashSet::new();
        for item in &self.signup_items {
            if !seen.insert(item.name) {
                return Err(DuplicateSignupItem(item.name.label()));
            }
        }
        Ok(())
    }

    /// Whether signup is followed by an interstitial page that needs a session.
    pub fn has_prompt_page(&self) -> bool {
        self.providers.iter().any(|p| p.prompted) || self.signup_items.iter().any(|i| i.prompted)
    }
}
