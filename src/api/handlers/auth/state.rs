//! Auth configuration and the shared state handed to handlers.

use anyhow::{Result, bail};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::token::TokenIssuer;

const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 10 * 24 * 60 * 60;
pub const MAX_TOKEN_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

/// Signing secrets and lifetimes for both token kinds.
///
/// Built once at startup and injected into [`TokenIssuer`]; nothing reads these
/// values from the environment per request.
#[derive(Clone)]
pub struct AuthConfig {
    access_token_secret: SecretString,
    access_token_ttl_seconds: i64,
    refresh_token_secret: SecretString,
    refresh_token_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(access_token_secret: SecretString, refresh_token_secret: SecretString) -> Self {
        Self {
            access_token_secret,
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_secret,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    #[must_use]
    pub fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
    }

    pub(super) fn access_token_secret(&self) -> &SecretString {
        &self.access_token_secret
    }

    pub(super) fn refresh_token_secret(&self) -> &SecretString {
        &self.refresh_token_secret
    }

    /// Reject configurations that would weaken the token model.
    ///
    /// # Errors
    /// Returns an error if a secret is empty, both secrets are equal, a lifetime
    /// is not positive or exceeds a year, or access tokens would outlive
    /// refresh tokens.
    pub fn validate(&self) -> Result<()> {
        let access = self.access_token_secret.expose_secret();
        let refresh = self.refresh_token_secret.expose_secret();
        if access.is_empty() {
            bail!("access token secret must not be empty");
        }
        if refresh.is_empty() {
            bail!("refresh token secret must not be empty");
        }
        if access == refresh {
            bail!("access and refresh token secrets must be distinct");
        }
        if self.access_token_ttl_seconds <= 0 {
            bail!("access token TTL must be positive");
        }
        if self.refresh_token_ttl_seconds <= 0 {
            bail!("refresh token TTL must be positive");
        }
        if self.refresh_token_ttl_seconds > MAX_TOKEN_TTL_SECONDS {
            bail!("refresh token TTL must not exceed {MAX_TOKEN_TTL_SECONDS} seconds");
        }
        if self.access_token_ttl_seconds >= self.refresh_token_ttl_seconds {
            bail!("access token TTL must be shorter than refresh token TTL");
        }
        Ok(())
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token_secret", &"***")
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field("refresh_token_secret", &"***")
            .field("refresh_token_ttl_seconds", &self.refresh_token_ttl_seconds)
            .finish()
    }
}

/// Shared auth state: validated config plus the token issuer built from it.
#[derive(Debug)]
pub struct AuthState {
    config: AuthConfig,
    tokens: TokenIssuer,
}

impl AuthState {
    /// # Errors
    /// Returns an error if `config` fails [`AuthConfig::validate`].
    pub fn new(config: AuthConfig) -> Result<Self> {
        config.validate()?;
        let tokens = TokenIssuer::new(&config);
        Ok(Self { config, tokens })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(access: &str, refresh: &str) -> AuthConfig {
        AuthConfig::new(SecretString::from(access), SecretString::from(refresh))
    }

    #[test]
    fn defaults_are_valid() {
        let config = config("access-secret", "refresh-secret");
        assert_eq!(config.access_token_ttl_seconds(), 900);
        assert_eq!(config.refresh_token_ttl_seconds(), 864_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_shared_secret() {
        let result = config("same", "same").validate();
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.to_string().contains("distinct"));
        }
    }

    #[test]
    fn rejects_empty_secret() {
        assert!(config("", "refresh").validate().is_err());
        assert!(config("access", "").validate().is_err());
    }

    #[test]
    fn rejects_bad_lifetimes() {
        assert!(
            config("a", "b")
                .with_access_token_ttl_seconds(0)
                .validate()
                .is_err()
        );
        assert!(
            config("a", "b")
                .with_access_token_ttl_seconds(600)
                .with_refresh_token_ttl_seconds(600)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn rejects_lifetimes_beyond_a_year() {
        let huge = config("a", "b").with_refresh_token_ttl_seconds(i64::MAX);
        assert!(huge.validate().is_err());
        assert!(AuthState::new(huge).is_err());

        let year = config("a", "b").with_refresh_token_ttl_seconds(MAX_TOKEN_TTL_SECONDS);
        assert!(year.validate().is_ok());
        assert!(
            config("a", "b")
                .with_access_token_ttl_seconds(MAX_TOKEN_TTL_SECONDS + 1)
                .with_refresh_token_ttl_seconds(MAX_TOKEN_TTL_SECONDS + 2)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn debug_redacts_secrets() {
        let debug = format!("{:?}", config("access-secret", "refresh-secret"));
        assert!(!debug.contains("access-secret"));
        assert!(!debug.contains("refresh-secret"));
    }

    #[test]
    fn auth_state_requires_valid_config() {
        assert!(AuthState::new(config("same", "same")).is_err());
        assert!(AuthState::new(config("access", "refresh")).is_ok());
    }
}
