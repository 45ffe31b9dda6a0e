//! Refresh-token rotation.
//!
//! A refresh token is accepted once: it must verify, name a live account, and
//! equal the account's stored token. Success replaces the stored token with a
//! new one through a compare-and-swap, so of two concurrent presentations of
//! the same token only one rotates. Every rejection past "no token" is the same
//! 403 "Invalid refresh token".

use axum::{Json, extract::Extension, http::HeaderMap, response::IntoResponse};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{
    carrier::{REFRESH_COOKIE, cookie_value, token_cookies},
    state::AuthState,
    token::TokenPair,
    types::RefreshRequest,
    utils::non_blank,
};
use crate::{
    api::{error::ApiError, response::ApiResponse},
    store::{AccountStore, Store},
};

#[utoipa::path(
    post,
    path = "/api/v1/users/refresh-token",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair; also set as cookies", body = TokenPair),
        (status = 400, description = "No refresh token presented"),
        (status = 403, description = "Invalid, expired, revoked or reused refresh token")
    ),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn refresh_access_token(
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(auth): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    payload: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let presented = cookie_value(&headers, REFRESH_COOKIE).or_else(|| {
        payload.and_then(|Json(request)| non_blank(request.refresh_token.as_deref()))
    });
    let Some(presented) = presented else {
        return Err(ApiError::validation("Refresh token is required"));
    };

    let claims = auth
        .tokens()
        .verify_refresh_token(&presented)
        .map_err(|err| {
            debug!("Refresh token rejected: {err}");
            ApiError::invalid_refresh_token()
        })?;

    let Some(account) = store.find_account_by_id(claims.sub).await? else {
        debug!(account_id = %claims.sub, "Refresh token names a missing account");
        return Err(ApiError::invalid_refresh_token());
    };

    if account.refresh_token.as_deref() != Some(presented.as_str()) {
        warn!(account_id = %account.id, "Refresh token is not the current session token");
        return Err(ApiError::invalid_refresh_token());
    }

    let pair = auth.tokens().issue_pair(&account)?;
    if !store
        .swap_refresh_token(account.id, &presented, &pair.refresh_token)
        .await?
    {
        warn!(account_id = %account.id, "Refresh token rotated concurrently");
        return Err(ApiError::invalid_refresh_token());
    }
    info!(account_id = %account.id, "Refresh token rotated");

    let cookies = token_cookies(auth.config(), &pair);
    Ok((cookies, ApiResponse::ok(pair, "Access token refreshed")))
}
