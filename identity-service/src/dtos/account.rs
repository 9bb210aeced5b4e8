use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

/// Signup form. Every field is optional on the wire; which ones matter is
/// decided by the application's signup items.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SignupRequest {
    #[serde(rename = "type")]
    #[schema(example = "signup")]
    pub request_type: String,

    #[validate(length(max = 100, message = "Application name is too long"))]
    #[schema(example = "app-built-in")]
    pub application: String,

    #[validate(length(max = 100, message = "Organization name is too long"))]
    #[schema(example = "built-in")]
    pub organization: String,

    #[validate(length(max = 100, message = "Username is too long"))]
    #[schema(example = "alice")]
    pub username: String,

    #[validate(length(max = 128, message = "Password is too long"))]
    #[schema(example = "s3cret-pass")]
    pub password: String,

    #[serde(rename = "name")]
    #[validate(length(max = 100, message = "Display name is too long"))]
    #[schema(example = "Alice Liddell")]
    pub display_name: String,

    #[validate(length(max = 254, message = "Email is too long"))]
    #[schema(example = "alice@example.com")]
    pub email: String,

    #[validate(length(max = 20, message = "Phone is too long"))]
    #[schema(example = "13800138000")]
    pub phone: String,

    #[validate(length(max = 5, message = "Phone prefix is too long"))]
    #[schema(example = "86")]
    pub phone_prefix: String,

    #[validate(length(max = 100, message = "Affiliation is too long"))]
    pub affiliation: String,

    #[validate(length(max = 16, message = "Email code is too long"))]
    pub email_code: String,

    #[validate(length(max = 16, message = "Phone code is too long"))]
    pub phone_code: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Application is required"))]
    #[schema(example = "app-built-in")]
    pub application: String,

    #[validate(length(min = 1, message = "Organization is required"))]
    #[schema(example = "built-in")]
    pub organization: String,

    #[validate(length(min = 1, message = "Username is required"))]
    #[schema(example = "admin")]
    pub username: String,

    #[validate(length(min = 1, max = 128, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UploadAvatarForm {
    /// `data:image/png;base64,...`
    pub avatarfile: String,
}

/// Request for a verification code, answered only after the human check.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SendCodeRequest {
    /// Email address, or phone number without its country code.
    #[validate(length(max = 254, message = "Destination is too long"))]
    #[schema(example = "alice@example.com")]
    pub dest: String,

    /// `email` or `phone`.
    #[serde(rename = "type")]
    #[schema(example = "email")]
    pub dest_type: String,

    #[validate(length(max = 5, message = "Country code is too long"))]
    #[schema(example = "86")]
    pub country_code: String,

    #[schema(example = "captcha")]
    pub check_type: String,

    #[validate(length(max = 64, message = "Check id is too long"))]
    pub check_id: String,

    #[validate(length(max = 2048, message = "Check key is too long"))]
    pub check_key: String,
}
