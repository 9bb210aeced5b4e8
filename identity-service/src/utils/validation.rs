use axum::{
    extract::{FromRequest, Request},
    Form, Json,
};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use validator::Validate;

/// JSON body extractor whose rejections render through [`AppError`].
///
/// Undecodable bodies fail the request with 400 before any handler logic
/// runs, so nothing is mutated.
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// Urlencoded form extractor with the same rejection behaviour as [`ApiJson`].
pub struct ApiForm<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiForm<T>
where
    T: DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(value) = Form::<T>::from_request(req, state).await?;
        Ok(ApiForm(value))
    }
}

#[derive(Validate)]
struct EmailCandidate {
    #[validate(email)]
    email: String,
}

pub fn is_valid_email(email: &str) -> bool {
    EmailCandidate {
        email: email.to_string(),
    }
    .validate()
    .is_ok()
}

/// National number without prefix: digits only, 5 to 15 of them.
pub fn is_valid_phone(phone: &str) -> bool {
    (5..=15).contains(&phone.len()) && phone.chars().all(|c| c.is_ascii_digit())
}

/// A name a person would carry: letters separated by spaces, hyphens or
/// apostrophes, at least two letters long.
pub fn is_valid_personal_name(name: &str) -> bool {
    let name = name.trim();
    let letters = name.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 2
        && name
            .chars()
            .all(|c| c.is_alphabetic() || c == ' ' || c == '-' || c == '\'')
        && name.chars().next().is_some_and(char::is_alphabetic)
}
