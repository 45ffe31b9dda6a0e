//! Authentication gate: resolve the access token to a live account.
//!
//! Flow: take the token from the `accessToken` cookie (or the bearer header),
//! verify signature and expiry, then load the account it names. Every failure
//! is the same 401 "Unauthorized request"; the reason only goes to the log.
//! The gate never writes to the store.

use axum::{
    extract::{Extension, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{carrier::extract_access_token, state::AuthState};
use crate::{
    api::error::ApiError,
    store::{Account, AccountStore, Store},
};

/// Account view attached to authenticated requests; credential fields are
/// never part of it.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for Principal {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            full_name: account.full_name.clone(),
            avatar: account.avatar.clone(),
            cover_image: account.cover_image.clone(),
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Resolve request headers into a principal.
///
/// # Errors
/// `Unauthenticated` when the token is missing, invalid, expired, or names an
/// account that no longer exists; `Internal` when the store fails.
pub async fn authenticate(
    headers: &HeaderMap,
    store: &dyn Store,
    auth: &AuthState,
) -> Result<Principal, ApiError> {
    let Some(token) = extract_access_token(headers) else {
        debug!("No access token presented");
        return Err(ApiError::unauthorized());
    };

    let claims = auth.tokens().verify_access_token(&token).map_err(|err| {
        debug!("Access token rejected: {err}");
        ApiError::unauthorized()
    })?;

    match store.find_account_by_id(claims.sub).await? {
        Some(account) => Ok(Principal::from(&account)),
        None => {
            debug!(account_id = %claims.sub, "Access token names a missing account");
            Err(ApiError::unauthorized())
        }
    }
}

/// Middleware guarding protected routes; inserts [`Principal`] into the
/// request extensions for the handler.
///
/// # Errors
/// See [`authenticate`].
pub async fn require_auth(
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(auth): Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = authenticate(request.headers(), store.as_ref(), &auth).await?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::handlers::auth::state::AuthConfig,
        store::{CreateAccountOutcome, NewAccount, memory::MemoryStore},
    };
    use anyhow::{Result, bail};
    use axum::http::{
        HeaderValue, StatusCode,
        header::{AUTHORIZATION, COOKIE},
    };
    use secrecy::SecretString;

    fn auth_state() -> Result<AuthState> {
        AuthState::new(AuthConfig::new(
            SecretString::from("access-secret"),
            SecretString::from("refresh-secret"),
        ))
    }

    async fn seed(store: &MemoryStore) -> Result<Account> {
        match store
            .create_account(NewAccount {
                username: "alice".to_string(),
                email: "alice@x.com".to_string(),
                full_name: "Alice".to_string(),
                password_hash: "hash".to_string(),
                avatar: None,
                cover_image: None,
            })
            .await?
        {
            CreateAccountOutcome::Created(account) => Ok(account),
            CreateAccountOutcome::Conflict => bail!("unexpected conflict"),
        }
    }

    fn bearer(token: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
        Ok(headers)
    }

    #[tokio::test]
    async fn resolves_valid_bearer_token() -> Result<()> {
        let store = MemoryStore::new();
        let auth = auth_state()?;
        let account = seed(&store).await?;
        let token = auth.tokens().issue_access_token(&account)?;

        let principal = authenticate(&bearer(&token)?, &store, &auth)
            .await
            .map_err(|err| anyhow::anyhow!("{err}"))?;
        assert_eq!(principal.id, account.id);
        assert_eq!(principal.username, "alice");
        Ok(())
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() -> Result<()> {
        let store = MemoryStore::new();
        let auth = auth_state()?;
        let result = authenticate(&HeaderMap::new(), &store, &auth).await;
        assert!(matches!(result, Err(ApiError::Unauthenticated(_))));
        Ok(())
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() -> Result<()> {
        let store = MemoryStore::new();
        let auth = auth_state()?;
        let account = seed(&store).await?;
        let token = auth.tokens().issue_refresh_token(&account)?;
        let result = authenticate(&bearer(&token)?, &store, &auth).await;
        assert!(matches!(result, Err(ApiError::Unauthenticated(_))));
        Ok(())
    }

    #[tokio::test]
    async fn deleted_account_is_unauthorized() -> Result<()> {
        let store = MemoryStore::new();
        let auth = auth_state()?;
        let account = seed(&store).await?;
        let token = auth.tokens().issue_access_token(&account)?;

        let other_store = MemoryStore::new();
        let result = authenticate(&bearer(&token)?, &other_store, &auth).await;
        let Err(err) = result else {
            bail!("expected rejection");
        };
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn invalid_cookie_is_not_rescued_by_bearer() -> Result<()> {
        let store = MemoryStore::new();
        let auth = auth_state()?;
        let account = seed(&store).await?;
        let token = auth.tokens().issue_access_token(&account)?;

        let mut headers = bearer(&token)?;
        headers.insert(COOKIE, HeaderValue::from_static("accessToken=garbage"));
        let result = authenticate(&headers, &store, &auth).await;
        assert!(matches!(result, Err(ApiError::Unauthenticated(_))));
        Ok(())
    }
}
