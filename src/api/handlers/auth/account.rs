//! Registration, password change and the current-user view.

use axum::{Json, extract::Extension, response::IntoResponse};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    password::{hash_password_blocking, verify_password_blocking},
    principal::Principal,
    types::{ChangePasswordRequest, Empty, RegisterRequest},
    utils::{non_blank, normalize_identifier, valid_email},
};
use crate::{
    api::{error::ApiError, response::ApiResponse},
    store::{AccountStore, CreateAccountOutcome, NewAccount, Store},
};

#[utoipa::path(
    post,
    path = "/api/v1/users/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = Principal),
        (status = 400, description = "Missing or invalid fields"),
        (status = 409, description = "Username or email already taken")
    ),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn register(
    Extension(store): Extension<Arc<dyn Store>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    let (Some(username), Some(email), Some(full_name), Some(password)) = (
        non_blank(request.username.as_deref()),
        non_blank(request.email.as_deref()),
        non_blank(request.full_name.as_deref()),
        request.password.filter(|password| !password.trim().is_empty()),
    ) else {
        return Err(ApiError::validation("All fields are required"));
    };

    let username = normalize_identifier(&username);
    let email = normalize_identifier(&email);
    if !valid_email(&email) {
        return Err(ApiError::validation("Invalid email"));
    }

    let password_hash = hash_password_blocking(password).await?;
    let outcome = store
        .create_account(NewAccount {
            username,
            email,
            full_name,
            password_hash,
            avatar: non_blank(request.avatar.as_deref()),
            cover_image: non_blank(request.cover_image.as_deref()),
        })
        .await?;

    match outcome {
        CreateAccountOutcome::Created(account) => {
            info!(account_id = %account.id, "User registered");
            Ok(ApiResponse::created(
                Principal::from(&account),
                "User registered successfully",
            ))
        }
        CreateAccountOutcome::Conflict => Err(ApiError::Conflict(
            "User with email or username already exists".to_string(),
        )),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/users/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = Empty),
        (status = 400, description = "Missing fields or wrong old password"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn change_password(
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(principal): Extension<Principal>,
    payload: Option<Json<ChangePasswordRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let (Some(old_password), Some(new_password)) = (
        request.old_password.filter(|password| !password.is_empty()),
        request
            .new_password
            .filter(|password| !password.trim().is_empty()),
    ) else {
        return Err(ApiError::validation("Old and new password are required"));
    };

    let Some(account) = store.find_account_by_id(principal.id).await? else {
        return Err(ApiError::unauthorized());
    };

    if !verify_password_blocking(old_password, account.password_hash).await? {
        warn!(account_id = %principal.id, "Password change rejected: wrong old password");
        return Err(ApiError::validation("Invalid old password"));
    }

    let password_hash = hash_password_blocking(new_password).await?;
    if !store.update_password_hash(principal.id, &password_hash).await? {
        return Err(ApiError::unauthorized());
    }
    info!(account_id = %principal.id, "Password changed");

    Ok(ApiResponse::ok(Empty::default(), "Password changed successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/current-user",
    responses(
        (status = 200, description = "The authenticated user", body = Principal),
        (status = 401, description = "Not authenticated")
    ),
    tag = "users"
)]
pub async fn current_user(Extension(principal): Extension<Principal>) -> impl IntoResponse {
    ApiResponse::ok(principal, "Current user fetched successfully")
}
