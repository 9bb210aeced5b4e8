pub mod password;
pub mod time;
pub mod validation;

pub use password::{hash_password, seal_password, verify_password, Password};
pub use time::{
    format_timestamp, is_expired, parse_timestamp, unix_nanos, Clock, ManualClock, SystemClock,
};
pub use validation::{is_valid_email, is_valid_personal_name, is_valid_phone, ApiForm, ApiJson};
