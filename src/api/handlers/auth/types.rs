//! Request/response types for user endpoints.
//!
//! Request fields are all optional so that a missing field is reported by the
//! handler as a validation error rather than rejected by the JSON extractor.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::principal::Principal;

#[derive(ToSchema, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password: Option<String>,
    /// Already-uploaded avatar URL.
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
}

#[derive(ToSchema, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(ToSchema, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(ToSchema, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(ToSchema, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: Principal,
    pub access_token: String,
    pub refresh_token: String,
}

/// Empty `data` object for operations with nothing to return.
#[derive(ToSchema, Serialize, Default)]
pub struct Empty {}
