//! Password hashing with Argon2id.
//!
//! `Argon2::default()` is Argon2id with m=19 MiB, t=2, p=1, a per-hash random
//! salt, and a PHC string output that embeds the parameters. Verification
//! recomputes the hash and compares in constant time.

use anyhow::{Context, Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

/// Hash `password` into a PHC string.
///
/// # Errors
/// Returns an error if hashing fails (e.g. allocation of the memory cost).
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("password hashing failed: {err}"))
}

/// Check `password` against a stored PHC string.
///
/// A wrong password is `Ok(false)`; a malformed stored hash or a failing
/// primitive is an error, never a pass.
///
/// # Errors
/// Returns an error if `hash` cannot be parsed or verification fails for a
/// reason other than a mismatch.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|err| anyhow!("invalid password hash: {err}"))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(err) => Err(anyhow!("password verification failed: {err}")),
    }
}

/// [`hash_password`] on the blocking pool.
///
/// # Errors
/// Returns an error if hashing fails or the blocking task panics.
pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("password hashing task failed")?
}

/// [`verify_password`] on the blocking pool.
///
/// # Errors
/// Returns an error if verification fails or the blocking task panics.
pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .context("password verification task failed")?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() -> Result<()> {
        let hash = hash_password("secret1")?;
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("secret1", &hash)?);
        Ok(())
    }

    #[test]
    fn other_passwords_do_not_verify() -> Result<()> {
        let hash = hash_password("secret1")?;
        for candidate in ["secret2", "Secret1", "", "secret1 ", "secret"] {
            assert!(!verify_password(candidate, &hash)?, "{candidate:?} verified");
        }
        Ok(())
    }

    #[test]
    fn hashes_are_salted() -> Result<()> {
        let first = hash_password("secret1")?;
        let second = hash_password("secret1")?;
        assert_ne!(first, second);
        assert!(verify_password("secret1", &second)?);
        Ok(())
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("secret1", "not-a-phc-string").is_err());
    }

    #[tokio::test]
    async fn blocking_helpers_round_trip() -> Result<()> {
        let hash = hash_password_blocking("secret1".to_string()).await?;
        assert!(verify_password_blocking("secret1".to_string(), hash.clone()).await?);
        assert!(!verify_password_blocking("nope".to_string(), hash).await?);
        Ok(())
    }
}
