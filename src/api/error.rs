//! API error taxonomy and its JSON rendering.
//!
//! Every handler failure ends up as one of these kinds. `Internal` keeps the
//! source error for the log only; clients get a fixed message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// Message for every access-token rejection (missing, forged, expired, or the
/// account is gone).
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized request";
/// Message for every refresh-token rejection past the "missing" check.
pub const INVALID_REFRESH_TOKEN_MESSAGE: &str = "Invalid refresh token";
const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Generic access-token rejection.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::Unauthenticated(UNAUTHORIZED_MESSAGE.to_string())
    }

    /// Generic refresh-token rejection.
    #[must_use]
    pub fn invalid_refresh_token() -> Self {
        Self::Forbidden(INVALID_REFRESH_TOKEN_MESSAGE.to_string())
    }

    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status_code: u16,
    data: Option<()>,
    message: String,
    success: bool,
    errors: Vec<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            error!("internal error: {err:#}");
        }

        let status = self.status_code();
        let body = ErrorBody {
            status_code: status.as_u16(),
            data: None,
            message: self.public_message(),
            success: false,
            errors: Vec::new(),
        };
        (status, Json(body)).into_response()
    }
}
