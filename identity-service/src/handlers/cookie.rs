use crate::config::SessionConfig;
use crate::services::SessionToken;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

pub fn session_token(jar: &CookieJar, config: &SessionConfig) -> Option<SessionToken> {
    jar.get(&config.cookie_name)
        .map(|c| c.value())
        .filter(|v| !v.is_empty())
        .map(SessionToken::new)
}

/// Bind a fresh token to the jar.
pub fn issue_token(jar: CookieJar, config: &SessionConfig) -> (CookieJar, SessionToken) {
    let token = SessionToken::generate();
    let cookie = Cookie::build((config.cookie_name.clone(), token.as_str().to_string()))
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax);
    (jar.add(cookie), token)
}

/// Reuse the caller's token, or issue one if they have none.
pub fn ensure_token(jar: CookieJar, config: &SessionConfig) -> (CookieJar, SessionToken) {
    match session_token(&jar, config) {
        Some(token) => (jar, token),
        None => issue_token(jar, config),
    }
}

pub fn drop_token(jar: CookieJar, config: &SessionConfig) -> CookieJar {
    jar.remove(Cookie::build((config.cookie_name.clone(), "")).path("/"))
}
