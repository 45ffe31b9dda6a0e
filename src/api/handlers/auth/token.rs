//! Access and refresh token issuance and verification (HS256 JWT).
//!
//! The two token kinds use distinct secrets and lifetimes, so a refresh token
//! never verifies as an access token and vice versa. Each token carries a
//! random `jti`, which keeps two tokens minted in the same second distinct.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::{Error as JwtError, ErrorKind},
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use ulid::Ulid;
use utoipa::ToSchema;
use uuid::Uuid;

use super::state::AuthConfig;
use crate::store::{Account, AccountStore, Store};

/// Access token payload; profile fields are denormalized from the account at
/// issue time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub username: String,
    pub email: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Refresh token payload; only the account binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Why a token was rejected. Only ever logged; clients see a generic message.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token signature mismatch")]
    InvalidSignature,
    #[error("malformed token: {0}")]
    Malformed(String),
}

impl From<JwtError> for TokenError {
    fn from(err: JwtError) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::Malformed(err.to_string()),
        }
    }
}

#[derive(Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    access_ttl_seconds: i64,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    refresh_ttl_seconds: i64,
    validation: Validation,
}

impl TokenIssuer {
    /// Build keys from a config. Call [`AuthConfig::validate`] first.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let access_secret = config.access_token_secret().expose_secret().as_bytes();
        let refresh_secret = config.refresh_token_secret().expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            access_ttl_seconds: config.access_token_ttl_seconds(),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            refresh_ttl_seconds: config.refresh_token_ttl_seconds(),
            validation,
        }
    }

    /// # Errors
    /// Returns an error if the expiry overflows or signing fails.
    pub fn issue_access_token(&self, account: &Account) -> Result<String> {
        let (iat, exp) = issued_window(self.access_ttl_seconds)?;
        let claims = AccessClaims {
            sub: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            full_name: account.full_name.clone(),
            iat,
            exp,
            jti: Ulid::new().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding)
            .context("failed to sign access token")
    }

    /// # Errors
    /// Returns an error if the expiry overflows or signing fails.
    pub fn issue_refresh_token(&self, account: &Account) -> Result<String> {
        let (iat, exp) = issued_window(self.refresh_ttl_seconds)?;
        let claims = RefreshClaims {
            sub: account.id,
            iat,
            exp,
            jti: Ulid::new().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding)
            .context("failed to sign refresh token")
    }

    /// Both tokens, or an error; never half a pair.
    ///
    /// # Errors
    /// Returns an error if either token fails to sign.
    pub fn issue_pair(&self, account: &Account) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue_access_token(account)?,
            refresh_token: self.issue_refresh_token(account)?,
        })
    }

    /// Check signature and expiry of an access token.
    ///
    /// # Errors
    /// Returns the rejection reason.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        Ok(decode::<AccessClaims>(token, &self.access_decoding, &self.validation)?.claims)
    }

    /// Check signature and expiry of a refresh token. Whether it is still the
    /// account's current session is a separate, store-backed check.
    ///
    /// # Errors
    /// Returns the rejection reason.
    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        Ok(decode::<RefreshClaims>(token, &self.refresh_decoding, &self.validation)?.claims)
    }
}

/// `(iat, exp)` for a token issued now.
fn issued_window(ttl_seconds: i64) -> Result<(i64, i64)> {
    let iat = Utc::now().timestamp();
    let exp = iat
        .checked_add(ttl_seconds)
        .with_context(|| format!("token lifetime of {ttl_seconds}s overflows the expiry"))?;
    Ok((iat, exp))
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .finish_non_exhaustive()
    }
}

/// Load the account, mint a pair, and make the new refresh token the account's
/// only valid one (overwriting any previous value).
///
/// # Errors
/// Returns an error if the account is missing, signing fails, or the store
/// write fails. No tokens are returned in that case.
pub async fn generate_access_and_refresh_tokens(
    store: &dyn Store,
    tokens: &TokenIssuer,
    account_id: Uuid,
) -> Result<(Account, TokenPair)> {
    let mut account = store
        .find_account_by_id(account_id)
        .await?
        .with_context(|| format!("account {account_id} not found while issuing tokens"))?;

    let pair = tokens.issue_pair(&account)?;

    if !store
        .replace_refresh_token(account.id, Some(&pair.refresh_token))
        .await?
    {
        bail!("account {account_id} vanished while storing refresh token");
    }
    debug!(account_id = %account.id, "issued token pair");

    account.refresh_token = Some(pair.refresh_token.clone());
    Ok((account, pair))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CreateAccountOutcome, NewAccount, memory::MemoryStore};
    use secrecy::SecretString;

    fn config() -> AuthConfig {
        AuthConfig::new(
            SecretString::from("access-secret"),
            SecretString::from("refresh-secret"),
        )
    }

    fn account() -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::now_v7(),
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            full_name: "Alice Liddell".to_string(),
            avatar: None,
            cover_image: None,
            password_hash: "hash".to_string(),
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn access_token_carries_profile_claims() -> Result<()> {
        let issuer = TokenIssuer::new(&config());
        let account = account();
        let token = issuer.issue_access_token(&account)?;
        let claims = issuer.verify_access_token(&token)?;
        assert_eq!(claims.sub, account.id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.email, "alice@x.com");
        assert_eq!(claims.full_name, "Alice Liddell");
        assert_eq!(claims.exp - claims.iat, 900);
        Ok(())
    }

    #[test]
    fn refresh_token_uses_its_own_lifetime() -> Result<()> {
        let issuer = TokenIssuer::new(&config().with_refresh_token_ttl_seconds(3600));
        let token = issuer.issue_refresh_token(&account())?;
        let claims = issuer.verify_refresh_token(&token)?;
        assert_eq!(claims.exp - claims.iat, 3600);
        Ok(())
    }

    #[test]
    fn token_kinds_are_not_interchangeable() -> Result<()> {
        let issuer = TokenIssuer::new(&config());
        let pair = issuer.issue_pair(&account())?;
        assert!(matches!(
            issuer.verify_access_token(&pair.refresh_token),
            Err(TokenError::InvalidSignature)
        ));
        assert!(matches!(
            issuer.verify_refresh_token(&pair.access_token),
            Err(TokenError::InvalidSignature)
        ));
        Ok(())
    }

    #[test]
    fn overflowing_lifetime_is_an_error() {
        let issuer = TokenIssuer::new(&config().with_refresh_token_ttl_seconds(i64::MAX));
        assert!(issuer.issue_refresh_token(&account()).is_err());
        assert!(issuer.issue_pair(&account()).is_err());
        assert!(issued_window(i64::MAX).is_err());
    }

    #[test]
    fn tokens_minted_back_to_back_differ() -> Result<()> {
        let issuer = TokenIssuer::new(&config());
        let account = account();
        let first = issuer.issue_refresh_token(&account)?;
        let second = issuer.issue_refresh_token(&account)?;
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn expired_token_is_rejected() -> Result<()> {
        let issuer = TokenIssuer::new(&config());
        let now = Utc::now().timestamp();
        let claims = RefreshClaims {
            sub: Uuid::now_v7(),
            iat: now - 120,
            exp: now - 60,
            jti: Ulid::new().to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"refresh-secret"),
        )?;
        assert!(matches!(
            issuer.verify_refresh_token(&token),
            Err(TokenError::Expired)
        ));
        Ok(())
    }

    #[test]
    fn tampered_or_garbage_tokens_are_rejected() -> Result<()> {
        let issuer = TokenIssuer::new(&config());
        let token = issuer.issue_access_token(&account())?;
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(issuer.verify_access_token(&tampered).is_err());
        assert!(matches!(
            issuer.verify_access_token("not-a-jwt"),
            Err(TokenError::Malformed(_))
        ));
        Ok(())
    }

    #[test]
    fn other_secret_is_rejected() -> Result<()> {
        let issuer = TokenIssuer::new(&config());
        let other = TokenIssuer::new(&AuthConfig::new(
            SecretString::from("other-access"),
            SecretString::from("other-refresh"),
        ));
        let token = other.issue_access_token(&account())?;
        assert!(matches!(
            issuer.verify_access_token(&token),
            Err(TokenError::InvalidSignature)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn generate_persists_refresh_token() -> Result<()> {
        let store = MemoryStore::new();
        let issuer = TokenIssuer::new(&config());
        let created = match store
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
            CreateAccountOutcome::Created(account) => account,
            CreateAccountOutcome::Conflict => bail!("unexpected conflict"),
        };

        let (account, first) =
            generate_access_and_refresh_tokens(&store, &issuer, created.id).await?;
        assert_eq!(
            account.refresh_token.as_deref(),
            Some(first.refresh_token.as_str())
        );

        let (_, second) =
            generate_access_and_refresh_tokens(&store, &issuer, created.id).await?;
        let stored = store
            .find_account_by_id(created.id)
            .await?
            .context("missing account")?;
        assert_eq!(
            stored.refresh_token.as_deref(),
            Some(second.refresh_token.as_str())
        );
        assert_ne!(first.refresh_token, second.refresh_token);
        Ok(())
    }

    #[tokio::test]
    async fn generate_fails_for_unknown_account() {
        let store = MemoryStore::new();
        let issuer = TokenIssuer::new(&config());
        assert!(
            generate_access_and_refresh_tokens(&store, &issuer, Uuid::now_v7())
                .await
                .is_err()
        );
    }
}
