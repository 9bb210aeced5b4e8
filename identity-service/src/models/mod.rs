pub mod application;
pub mod ldap;
pub mod organization;
pub mod user;

pub use application::{
    Application, DuplicateSignupItem, ProviderItem, SignupField, SignupItem, SignupItemPolicy,
    SignupRule,
};
pub use ldap::Ldap;
pub use organization::{Organization, PasswordType};
pub use user::{InvalidUserKey, User, UserField, UserKey, NORMAL_USER_TYPE};
