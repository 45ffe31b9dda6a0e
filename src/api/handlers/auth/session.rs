//! Login and logout.

use axum::{Json, extract::Extension, response::IntoResponse};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    carrier::{cleared_cookies, token_cookies},
    password::verify_password_blocking,
    principal::Principal,
    state::AuthState,
    token::generate_access_and_refresh_tokens,
    types::{Empty, LoginRequest, LoginResponse},
    utils::{non_blank, normalize_identifier},
};
use crate::{
    api::{error::ApiError, response::ApiResponse},
    store::{AccountStore, Store},
};

#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; tokens also set as cookies", body = LoginResponse),
        (status = 400, description = "Missing username/email or password"),
        (status = 401, description = "Wrong password"),
        (status = 404, description = "No such user")
    ),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn login(
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(auth): Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    let username = non_blank(request.username.as_deref()).map(|value| normalize_identifier(&value));
    let email = non_blank(request.email.as_deref()).map(|value| normalize_identifier(&value));
    if username.is_none() && email.is_none() {
        return Err(ApiError::validation("username or email is required"));
    }
    let Some(password) = request.password.filter(|password| !password.is_empty()) else {
        return Err(ApiError::validation("password is required"));
    };

    let account = store
        .find_account_by_username_or_email(username.as_deref(), email.as_deref())
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    if !verify_password_blocking(password, account.password_hash.clone()).await? {
        warn!(account_id = %account.id, "Login rejected: wrong password");
        return Err(ApiError::Unauthenticated(
            "Invalid user credentials".to_string(),
        ));
    }

    let (account, pair) =
        generate_access_and_refresh_tokens(store.as_ref(), auth.tokens(), account.id).await?;
    info!(account_id = %account.id, "User logged in");

    let cookies = token_cookies(auth.config(), &pair);
    let body = LoginResponse {
        user: Principal::from(&account),
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    };
    Ok((cookies, ApiResponse::ok(body, "User logged in successfully")))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/logout",
    responses(
        (status = 200, description = "Refresh token revoked and cookies cleared", body = Empty),
        (status = 401, description = "Not authenticated")
    ),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn logout(
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    // Clearing the stored value revokes every outstanding refresh token.
    store.replace_refresh_token(principal.id, None).await?;
    info!(account_id = %principal.id, "User logged out");

    Ok((
        cleared_cookies(),
        ApiResponse::ok(Empty::default(), "User logged out"),
    ))
}
