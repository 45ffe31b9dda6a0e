//! Token transport: `HttpOnly` cookies and the `Authorization: Bearer` header.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{AUTHORIZATION, COOKIE, SET_COOKIE},
};
use tracing::error;

use super::{state::AuthConfig, token::TokenPair};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Access token from the request, cookie taking precedence over the bearer
/// header.
pub(crate) fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, ACCESS_COOKIE).or_else(|| extract_bearer_token(headers))
}

pub(super) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn cookie(name: &str, value: &str, max_age: i64) -> Option<HeaderValue> {
    let cookie =
        format!("{name}={value}; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age={max_age}");
    HeaderValue::from_str(&cookie)
        .map_err(|err| error!("Failed to build {name} cookie: {err}"))
        .ok()
}

/// `Set-Cookie` headers carrying both tokens, each living as long as its token.
pub(super) fn token_cookies(config: &AuthConfig, pair: &TokenPair) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let cookies = [
        cookie(
            ACCESS_COOKIE,
            &pair.access_token,
            config.access_token_ttl_seconds(),
        ),
        cookie(
            REFRESH_COOKIE,
            &pair.refresh_token,
            config.refresh_token_ttl_seconds(),
        ),
    ];
    for value in cookies.into_iter().flatten() {
        headers.append(SET_COOKIE, value);
    }
    headers
}

/// `Set-Cookie` headers expiring both token cookies.
pub(super) fn cleared_cookies() -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
        if let Some(value) = cookie(name, "", 0) {
            headers.append(SET_COOKIE, value);
        }
    }
    headers
}
