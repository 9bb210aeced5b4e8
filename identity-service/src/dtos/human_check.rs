use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const LOCAL_CAPTCHA_TYPE: &str = "captcha";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HumanCheck {
    #[serde(rename = "type")]
    #[schema(example = "captcha")]
    pub check_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha_id: Option<String>,
    /// Base64 SVG data URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha_image: Option<String>,
}
