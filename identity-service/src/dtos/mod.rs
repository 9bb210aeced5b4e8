pub mod account;
pub mod human_check;

pub use account::{LoginRequest, SendCodeRequest, SignupRequest, UploadAvatarForm};
pub use human_check::HumanCheck;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Envelope shared by every account endpoint.
///
/// Domain rejections travel inside it with `status: "error"` and HTTP 200.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse {
    #[schema(example = "ok")]
    pub status: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Value,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data2: Value,
}

impl ApiResponse {
    pub fn ok(data: impl Into<Value>) -> Self {
        Self {
            status: "ok".to_string(),
            msg: String::new(),
            data: data.into(),
            data2: Value::Null,
        }
    }

    pub fn ok_with(data: impl Into<Value>, data2: impl Into<Value>) -> Self {
        Self {
            data2: data2.into(),
            ..Self::ok(data)
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            msg: msg.into(),
            data: Value::Null,
            data2: Value::Null,
        }
    }

    pub fn error_with_data(msg: impl Into<String>, data: impl Into<Value>) -> Self {
        Self {
            data: data.into(),
            ..Self::error(msg)
        }
    }
}
